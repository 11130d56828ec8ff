use super::fees::{FeeBreakdown, FeeEngine};
use super::money::MinorUnits;
use super::payment::{PaymentMethod, Transaction, TransactionStatus};
use super::ports::{ClockArc, IdGeneratorArc};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Always,
    /// Monday to Friday, local hour in `[9, 17)`.
    BusinessHours,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub settlement_id: String,
    pub transaction_id: String,
    pub amount: MinorUnits,
    pub currency: String,
    pub fee: MinorUnits,
    pub net_amount: MinorUnits,
    pub status: SettlementStatus,
    /// Nominal network latency for the method. Informational only.
    pub speed_seconds: u64,
    pub estimated_arrival: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementTable {
    pub speeds: HashMap<PaymentMethod, u64>,
    pub default_speed: u64,
    pub availability: HashMap<String, Availability>,
    /// Seconds east of UTC used to find a country's local time.
    pub utc_offsets: HashMap<String, i32>,
}

impl Default for SettlementTable {
    fn default() -> Self {
        use PaymentMethod::*;

        let speeds = [
            (Card, 60),
            (BankTransfer, 30),
            (MobileMoney, 15),
            (Crypto, 5),
            (Upi, 10),
            (Alipay, 30),
            (WeChat, 30),
        ]
        .into_iter()
        .collect();

        let availability = [("JP", Availability::BusinessHours), ("CN", Availability::BusinessHours)]
            .into_iter()
            .map(|(country, availability)| (country.to_string(), availability))
            .collect();

        let utc_offsets = [("JP", 9 * 3600), ("CN", 8 * 3600)]
            .into_iter()
            .map(|(country, offset)| (country.to_string(), offset))
            .collect();

        Self {
            speeds,
            default_speed: 60,
            availability,
            utc_offsets,
        }
    }
}

/// Decides whether settlement can run and produces settlement records.
#[derive(Clone)]
pub struct SettlementScheduler {
    table: Arc<SettlementTable>,
    fees: Arc<FeeEngine>,
    clock: ClockArc,
    ids: IdGeneratorArc,
}

impl SettlementScheduler {
    pub fn new(
        table: Arc<SettlementTable>,
        fees: Arc<FeeEngine>,
        clock: ClockArc,
        ids: IdGeneratorArc,
    ) -> Self {
        Self {
            table,
            fees,
            clock,
            ids,
        }
    }

    pub fn speed_seconds(&self, method: PaymentMethod) -> u64 {
        self.table
            .speeds
            .get(&method)
            .copied()
            .unwrap_or(self.table.default_speed)
    }

    /// `at` converted to the country's local offset (UTC when unknown).
    pub fn local_time(&self, country: &str, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        let offset = self
            .table
            .utc_offsets
            .get(country)
            .and_then(|seconds| FixedOffset::east_opt(*seconds))
            .unwrap_or_else(|| Utc.fix());
        at.with_timezone(&offset)
    }

    pub fn is_available(&self, country: &str, at: DateTime<FixedOffset>) -> bool {
        match self
            .table
            .availability
            .get(country)
            .copied()
            .unwrap_or(Availability::Always)
        {
            Availability::Always => true,
            Availability::BusinessHours => {
                !matches!(at.weekday(), Weekday::Sat | Weekday::Sun) && (9..17).contains(&at.hour())
            }
        }
    }

    pub fn is_available_now(&self, country: &str) -> bool {
        self.is_available(country, self.local_time(country, self.clock.now()))
    }

    /// Builds the settlement record for a processed transaction.
    ///
    /// The settlement fee is charged on the gross amount.
    pub fn schedule(&self, transaction: &Transaction, fees: &FeeBreakdown) -> Result<SettlementRecord> {
        if matches!(
            transaction.status(),
            TransactionStatus::Failed | TransactionStatus::Rejected | TransactionStatus::Error
        ) {
            return Err(PaymentError::SettlementError(format!(
                "transaction {} ended {} and cannot be settled",
                transaction.id,
                transaction.status()
            )));
        }
        if fees.gross_amount != transaction.amount || fees.currency != transaction.currency {
            return Err(PaymentError::SettlementError(format!(
                "fee breakdown does not belong to transaction {}",
                transaction.id
            )));
        }
        let method: PaymentMethod = transaction
            .method
            .parse()
            .map_err(|e: PaymentError| PaymentError::SettlementError(e.to_string()))?;

        let settlement_fee = self.fees.calculate_settlement_fee(transaction.amount, method);

        Ok(SettlementRecord {
            settlement_id: self.ids.settlement_id(),
            transaction_id: transaction.id.clone(),
            amount: transaction.amount,
            currency: transaction.currency.clone(),
            fee: settlement_fee.fee,
            net_amount: transaction.amount - settlement_fee.fee,
            status: SettlementStatus::Completed,
            speed_seconds: self.speed_seconds(method),
            estimated_arrival: self.clock.now(),
        })
    }
}
