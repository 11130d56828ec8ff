use super::money::{MinorUnits, percentage_of};
use super::payment::{MerchantTier, PaymentMethod};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A percentage plus a fixed amount in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rate {
    pub percentage: Decimal,
    pub fixed: MinorUnits,
}

impl Rate {
    pub const ZERO: Self = Self {
        percentage: Decimal::ZERO,
        fixed: 0,
    };

    pub fn new(percentage: Decimal, fixed: MinorUnits) -> Self {
        Self { percentage, fixed }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionalAdjustment {
    /// Country code, or `EU` for any member of the EU group.
    pub region: String,
    pub rate: Rate,
}

/// Transparent breakdown of a processing fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub currency: String,
    pub base_rate: Rate,
    pub discount: Rate,
    pub regional_adjustment: RegionalAdjustment,
    pub final_rate: Rate,
    pub percentage_fee: MinorUnits,
    pub fixed_fee: MinorUnits,
    pub total_fee: MinorUnits,
    pub gross_amount: MinorUnits,
    pub net_amount: MinorUnits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementFee {
    pub percentage: Decimal,
    pub fee: MinorUnits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionFee {
    pub from_currency: String,
    pub to_currency: String,
    pub amount: MinorUnits,
    pub percentage: Decimal,
    pub fee: MinorUnits,
    pub net_amount: MinorUnits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundFee {
    pub currency: String,
    pub refund_amount: MinorUnits,
    pub fixed_fee: MinorUnits,
    pub net_refund: MinorUnits,
}

/// Rate tables. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeSchedule {
    pub base_rates: HashMap<PaymentMethod, Rate>,
    pub default_rate: Rate,
    pub tier_discounts: HashMap<MerchantTier, Rate>,
    pub regional_adjustments: HashMap<String, Rate>,
    pub eu_countries: HashSet<String>,
    pub settlement_percentages: HashMap<PaymentMethod, Decimal>,
    pub default_settlement_percentage: Decimal,
    pub conversion_percentages: HashMap<MerchantTier, Decimal>,
    pub card_refund_fees: HashMap<MerchantTier, MinorUnits>,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        use PaymentMethod::*;

        let base_rates = [
            (Card, Rate::new(dec!(2.9), 30)),
            (BankTransfer, Rate::new(dec!(0.8), 25)),
            (MobileMoney, Rate::new(dec!(2.5), 15)),
            (Crypto, Rate::new(dec!(1.0), 0)),
            (Upi, Rate::new(dec!(1.8), 10)),
            (Alipay, Rate::new(dec!(2.5), 20)),
            (WeChat, Rate::new(dec!(2.5), 20)),
            (ApplePay, Rate::new(dec!(2.9), 30)),
            (GooglePay, Rate::new(dec!(2.9), 30)),
        ]
        .into_iter()
        .collect();

        let tier_discounts = [
            (MerchantTier::Standard, Rate::ZERO),
            (MerchantTier::Premium, Rate::new(dec!(0.3), 5)),
            (MerchantTier::Enterprise, Rate::new(dec!(0.5), 10)),
        ]
        .into_iter()
        .collect();

        let regional_adjustments = [
            ("US", Rate::ZERO),
            ("CA", Rate::new(dec!(0.1), 0)),
            ("GB", Rate::new(dec!(0.1), 0)),
            ("EU", Rate::new(dec!(0.2), 0)),
            ("IN", Rate::new(dec!(-0.5), -5)),
            ("NG", Rate::new(dec!(-0.3), -5)),
            ("KE", Rate::new(dec!(-0.3), -5)),
            ("BR", Rate::new(dec!(0.3), 5)),
            ("JP", Rate::new(dec!(0.2), 5)),
        ]
        .into_iter()
        .map(|(region, rate)| (region.to_string(), rate))
        .collect();

        let eu_countries = [
            "DE", "FR", "IT", "ES", "NL", "BE", "PT", "IE", "AT", "FI", "SE", "DK", "PL", "CZ",
            "HU", "RO", "BG", "GR", "HR",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let settlement_percentages = [
            (BankTransfer, dec!(0.5)),
            (MobileMoney, dec!(0.8)),
            (Crypto, dec!(0.2)),
        ]
        .into_iter()
        .collect();

        let conversion_percentages = [
            (MerchantTier::Standard, dec!(2.0)),
            (MerchantTier::Premium, dec!(1.5)),
            (MerchantTier::Enterprise, dec!(1.0)),
        ]
        .into_iter()
        .collect();

        let card_refund_fees = [
            (MerchantTier::Standard, 30),
            (MerchantTier::Premium, 20),
            (MerchantTier::Enterprise, 0),
        ]
        .into_iter()
        .collect();

        Self {
            base_rates,
            default_rate: Rate::new(dec!(3.0), 30),
            tier_discounts,
            regional_adjustments,
            eu_countries,
            settlement_percentages,
            default_settlement_percentage: dec!(1.0),
            conversion_percentages,
            card_refund_fees,
        }
    }
}

/// Fee arithmetic over an immutable [`FeeSchedule`].
///
/// Every result is rounded to whole minor units, ties toward positive
/// infinity.
#[derive(Debug, Clone, Default)]
pub struct FeeEngine {
    schedule: Arc<FeeSchedule>,
}

impl FeeEngine {
    pub fn new(schedule: Arc<FeeSchedule>) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &FeeSchedule {
        &self.schedule
    }

    /// Maps a country onto its fee region (EU members collapse to `EU`).
    pub fn region_for(&self, country: &str) -> String {
        if self.schedule.eu_countries.contains(country) {
            "EU".to_string()
        } else {
            country.to_string()
        }
    }

    pub fn calculate_processing_fee(
        &self,
        amount: MinorUnits,
        currency: &str,
        method: PaymentMethod,
        country: &str,
        tier: MerchantTier,
    ) -> FeeBreakdown {
        let base_rate = self
            .schedule
            .base_rates
            .get(&method)
            .copied()
            .unwrap_or(self.schedule.default_rate);
        let discount = self
            .schedule
            .tier_discounts
            .get(&tier)
            .copied()
            .unwrap_or(Rate::ZERO);
        let region = self.region_for(country);
        let regional = self
            .schedule
            .regional_adjustments
            .get(&region)
            .copied()
            .unwrap_or(Rate::ZERO);

        let final_rate = Rate {
            percentage: (base_rate.percentage - discount.percentage + regional.percentage)
                .max(Decimal::ZERO),
            fixed: (base_rate.fixed - discount.fixed + regional.fixed).max(0),
        };

        let percentage_fee = percentage_of(amount, final_rate.percentage);
        let fixed_fee = final_rate.fixed;
        let total_fee = percentage_fee + fixed_fee;

        FeeBreakdown {
            currency: currency.to_string(),
            base_rate,
            discount,
            regional_adjustment: RegionalAdjustment {
                region,
                rate: regional,
            },
            final_rate,
            percentage_fee,
            fixed_fee,
            total_fee,
            gross_amount: amount,
            net_amount: amount - total_fee,
        }
    }

    pub fn calculate_settlement_fee(&self, amount: MinorUnits, method: PaymentMethod) -> SettlementFee {
        let percentage = self
            .schedule
            .settlement_percentages
            .get(&method)
            .copied()
            .unwrap_or(self.schedule.default_settlement_percentage);
        SettlementFee {
            percentage,
            fee: percentage_of(amount, percentage),
        }
    }

    pub fn calculate_conversion_fee(
        &self,
        amount: MinorUnits,
        from_currency: &str,
        to_currency: &str,
        tier: MerchantTier,
    ) -> ConversionFee {
        let percentage = if from_currency == to_currency {
            Decimal::ZERO
        } else {
            self.schedule
                .conversion_percentages
                .get(&tier)
                .copied()
                .unwrap_or(dec!(2.0))
        };
        let fee = percentage_of(amount, percentage);
        ConversionFee {
            from_currency: from_currency.to_string(),
            to_currency: to_currency.to_string(),
            amount,
            percentage,
            fee,
            net_amount: amount - fee,
        }
    }

    /// Refunds carry no percentage fee; only card refunds carry a fixed one.
    pub fn calculate_refund_fee(
        &self,
        amount: MinorUnits,
        currency: &str,
        method: PaymentMethod,
        tier: MerchantTier,
    ) -> RefundFee {
        let fixed_fee = match method {
            PaymentMethod::Card => self.schedule.card_refund_fees.get(&tier).copied().unwrap_or(0),
            _ => 0,
        };
        RefundFee {
            currency: currency.to_string(),
            refund_amount: amount,
            fixed_fee,
            net_refund: amount - fixed_fee,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_standard_us() {
        let engine = FeeEngine::default();
        let fees = engine.calculate_processing_fee(
            10_000,
            "USD",
            PaymentMethod::Card,
            "US",
            MerchantTier::Standard,
        );
        assert_eq!(fees.percentage_fee, 290);
        assert_eq!(fees.fixed_fee, 30);
        assert_eq!(fees.total_fee, 320);
        assert_eq!(fees.gross_amount, 10_000);
        assert_eq!(fees.net_amount, 9_680);
    }

    #[test]
    fn test_eu_country_collapses_to_eu_region() {
        let engine = FeeEngine::default();
        let fees = engine.calculate_processing_fee(
            10_000,
            "EUR",
            PaymentMethod::Card,
            "DE",
            MerchantTier::Standard,
        );
        assert_eq!(fees.regional_adjustment.region, "EU");
        assert_eq!(fees.final_rate.percentage, dec!(3.1));
        assert_eq!(fees.total_fee, 310 + 30);
    }

    #[test]
    fn test_discounts_and_adjustments_floor_at_zero() {
        let engine = FeeEngine::default();
        // crypto 1.0% + 0, enterprise -0.5% - 10, India -0.5% - 5
        let fees = engine.calculate_processing_fee(
            10_000,
            "INR",
            PaymentMethod::Crypto,
            "IN",
            MerchantTier::Enterprise,
        );
        assert_eq!(fees.final_rate, Rate::new(dec!(0.0), 0));
        assert_eq!(fees.total_fee, 0);
        assert_eq!(fees.net_amount, 10_000);
    }

    #[test]
    fn test_premium_tier_in_brazil() {
        let engine = FeeEngine::default();
        // 2.5 - 0.3 + 0.3 = 2.5%, 15 - 5 + 5 = 10
        let fees = engine.calculate_processing_fee(
            1_234,
            "BRL",
            PaymentMethod::MobileMoney,
            "BR",
            MerchantTier::Premium,
        );
        // 1234 * 2.5% = 30.85 -> 31
        assert_eq!(fees.percentage_fee, 31);
        assert_eq!(fees.fixed_fee, 10);
        assert_eq!(fees.total_fee, 41);
    }

    #[test]
    fn test_unknown_country_has_no_adjustment() {
        let engine = FeeEngine::default();
        let fees = engine.calculate_processing_fee(
            10_000,
            "USD",
            PaymentMethod::Upi,
            "ZZ",
            MerchantTier::Standard,
        );
        assert_eq!(fees.regional_adjustment.rate, Rate::ZERO);
        assert_eq!(fees.total_fee, 180 + 10);
    }

    #[test]
    fn test_method_missing_from_table_uses_default_row() {
        let mut schedule = FeeSchedule::default();
        schedule.base_rates.remove(&PaymentMethod::Alipay);
        let engine = FeeEngine::new(Arc::new(schedule));
        let fees = engine.calculate_processing_fee(
            10_000,
            "CNY",
            PaymentMethod::Alipay,
            "CN",
            MerchantTier::Standard,
        );
        assert_eq!(fees.base_rate, Rate::new(dec!(3.0), 30));
    }

    #[test]
    fn test_half_cent_rounds_up() {
        let engine = FeeEngine::default();
        // 50 * 1.0% = 0.5 -> 1
        let fees = engine.calculate_settlement_fee(50, PaymentMethod::Card);
        assert_eq!(fees.fee, 1);
    }

    #[test]
    fn test_settlement_fee_by_method() {
        let engine = FeeEngine::default();
        assert_eq!(engine.calculate_settlement_fee(5_000, PaymentMethod::MobileMoney).fee, 40);
        assert_eq!(engine.calculate_settlement_fee(5_000, PaymentMethod::BankTransfer).fee, 25);
        assert_eq!(engine.calculate_settlement_fee(5_000, PaymentMethod::Crypto).fee, 10);
        assert_eq!(engine.calculate_settlement_fee(5_000, PaymentMethod::Card).fee, 50);
    }

    #[test]
    fn test_conversion_fee() {
        let engine = FeeEngine::default();
        let fee = engine.calculate_conversion_fee(10_000, "USD", "EUR", MerchantTier::Premium);
        assert_eq!(fee.fee, 150);
        assert_eq!(fee.net_amount, 9_850);

        let same = engine.calculate_conversion_fee(10_000, "USD", "USD", MerchantTier::Standard);
        assert_eq!(same.fee, 0);
    }

    #[test]
    fn test_refund_fee_only_for_cards() {
        let engine = FeeEngine::default();
        let card = engine.calculate_refund_fee(5_000, "USD", PaymentMethod::Card, MerchantTier::Standard);
        assert_eq!(card.fixed_fee, 30);
        assert_eq!(card.net_refund, 4_970);

        let enterprise =
            engine.calculate_refund_fee(5_000, "USD", PaymentMethod::Card, MerchantTier::Enterprise);
        assert_eq!(enterprise.fixed_fee, 0);

        let bank =
            engine.calculate_refund_fee(5_000, "USD", PaymentMethod::BankTransfer, MerchantTier::Standard);
        assert_eq!(bank.fixed_fee, 0);
    }

    #[test]
    fn test_processing_fee_is_deterministic() {
        let engine = FeeEngine::default();
        let first = engine.calculate_processing_fee(
            987_654,
            "GBP",
            PaymentMethod::ApplePay,
            "GB",
            MerchantTier::Premium,
        );
        let second = engine.calculate_processing_fee(
            987_654,
            "GBP",
            PaymentMethod::ApplePay,
            "GB",
            MerchantTier::Premium,
        );
        assert_eq!(first, second);
    }
}
