use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Integer amount in the currency's smallest unit (cents, yen, fils...).
pub type MinorUnits = i64;

/// Largest amount a 12-digit amount field can carry.
pub const MAX_AMOUNT: MinorUnits = 999_999_999_999;

/// Rounds to the nearest integer with ties going toward positive infinity
/// (`2.5 -> 3`, `-2.5 -> -2`).
pub fn round_half_up(value: Decimal) -> Decimal {
    (value + dec!(0.5)).floor()
}

/// `round_half_up(amount * percentage / 100)` in exact decimal arithmetic.
pub fn percentage_of(amount: MinorUnits, percentage: Decimal) -> MinorUnits {
    let fee = round_half_up(Decimal::from(amount) * percentage / dec!(100));
    MinorUnits::try_from(fee).unwrap_or(MinorUnits::MAX)
}

/// Number of decimal places between the major and minor unit of a currency.
pub fn minor_unit_exponent(currency: &str) -> u32 {
    match currency {
        "JPY" | "KRW" | "VND" | "CLP" | "ISK" | "UGX" | "XAF" | "XOF" => 0,
        "BHD" | "KWD" | "OMR" | "JOD" | "TND" | "LYD" | "IQD" => 3,
        _ => 2,
    }
}

/// Converts minor units into a major-unit decimal (`1050` USD -> `10.50`).
pub fn to_major_units(amount: MinorUnits, currency: &str) -> Decimal {
    Decimal::new(amount, minor_unit_exponent(currency))
}

/// A currency code is three ASCII uppercase letters.
pub fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_up_ties() {
        assert_eq!(round_half_up(dec!(2.5)), dec!(3));
        assert_eq!(round_half_up(dec!(2.4999)), dec!(2));
        assert_eq!(round_half_up(dec!(-2.5)), dec!(-2));
        assert_eq!(round_half_up(dec!(7)), dec!(7));
    }

    #[test]
    fn test_percentage_of() {
        assert_eq!(percentage_of(10_000, dec!(2.9)), 290);
        // 150 * 0.3% = 0.45 -> 0; 250 * 1% = 2.5 -> 3
        assert_eq!(percentage_of(150, dec!(0.3)), 0);
        assert_eq!(percentage_of(250, dec!(1.0)), 3);
    }

    #[test]
    fn test_major_units() {
        assert_eq!(to_major_units(1050, "USD"), dec!(10.50));
        assert_eq!(to_major_units(1050, "JPY"), dec!(1050));
        assert_eq!(to_major_units(1050, "KWD"), dec!(1.050));
    }

    #[test]
    fn test_currency_code_shape() {
        assert!(is_currency_code("USD"));
        assert!(!is_currency_code("usd"));
        assert!(!is_currency_code("US"));
        assert!(!is_currency_code("USDT"));
    }
}
