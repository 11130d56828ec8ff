use super::money::{MAX_AMOUNT, MinorUnits, is_currency_code};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    MobileMoney,
    Crypto,
    Upi,
    Alipay,
    #[serde(rename = "wechat")]
    WeChat,
    ApplePay,
    GooglePay,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 9] = [
        PaymentMethod::Card,
        PaymentMethod::BankTransfer,
        PaymentMethod::MobileMoney,
        PaymentMethod::Crypto,
        PaymentMethod::Upi,
        PaymentMethod::Alipay,
        PaymentMethod::WeChat,
        PaymentMethod::ApplePay,
        PaymentMethod::GooglePay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::Crypto => "crypto",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Alipay => "alipay",
            PaymentMethod::WeChat => "wechat",
            PaymentMethod::ApplePay => "apple_pay",
            PaymentMethod::GooglePay => "google_pay",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        PaymentMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| PaymentError::ValidationError(format!("unsupported payment method '{s}'")))
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MerchantTier {
    #[default]
    Standard,
    Premium,
    Enterprise,
}

impl MerchantTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MerchantTier::Standard => "standard",
            MerchantTier::Premium => "premium",
            MerchantTier::Enterprise => "enterprise",
        }
    }
}

impl FromStr for MerchantTier {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standard" => Ok(MerchantTier::Standard),
            "premium" => Ok(MerchantTier::Premium),
            "enterprise" => Ok(MerchantTier::Enterprise),
            other => Err(PaymentError::ValidationError(format!(
                "unknown merchant tier '{other}'"
            ))),
        }
    }
}

/// Inbound payment request as received from the caller, before validation.
///
/// Flat so that it deserializes directly from a CSV row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    #[serde(default)]
    pub idempotency_key: Option<String>,
    pub amount: MinorUnits,
    pub currency: String,
    pub method: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub device_fingerprint: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub card_number: Option<String>,
    /// Card expiry as `MMYY`.
    #[serde(default)]
    pub card_expiry: Option<String>,
    #[serde(default)]
    pub account_reference: Option<String>,
    #[serde(default)]
    pub instant_settlement: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    pub country: Option<String>,
}

/// Client-side signals used by the device and location risk factors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub ip_address: Option<String>,
    pub fingerprint: Option<String>,
    pub user_agent: Option<String>,
}

/// Method-specific payload handed to the processor adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInstrument {
    pub card_number: Option<String>,
    pub card_expiry: Option<String>,
    pub account_reference: Option<String>,
}

/// A request that passed structural validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPayment {
    pub amount: MinorUnits,
    pub currency: String,
    pub method: PaymentMethod,
    pub customer: Customer,
    pub device: DeviceInfo,
    pub instrument: PaymentInstrument,
    pub instant_settlement: Option<bool>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl PaymentRequest {
    /// Structural validation. All problems are reported together.
    pub fn validate(&self) -> Result<ValidatedPayment> {
        let mut errors = Vec::new();

        if self.amount <= 0 {
            errors.push("amount must be positive".to_string());
        } else if self.amount > MAX_AMOUNT {
            errors.push(format!("amount must not exceed {MAX_AMOUNT}"));
        }
        if !is_currency_code(&self.currency) {
            errors.push(format!("invalid currency '{}'", self.currency));
        }
        let method = match self.method.parse::<PaymentMethod>() {
            Ok(method) => Some(method),
            Err(e) => {
                errors.push(match e {
                    PaymentError::ValidationError(msg) => msg,
                    other => other.to_string(),
                });
                None
            }
        };
        if self.customer_name.trim().is_empty() {
            errors.push("customer name is required".to_string());
        }
        if self.customer_email.trim().is_empty() {
            errors.push("customer email is required".to_string());
        } else if !self.customer_email.contains('@') {
            errors.push("customer email is invalid".to_string());
        }

        match method {
            Some(method) if errors.is_empty() => Ok(ValidatedPayment {
                amount: self.amount,
                currency: self.currency.clone(),
                method,
                customer: Customer {
                    id: non_blank(&self.customer_id),
                    name: self.customer_name.trim().to_string(),
                    email: self.customer_email.trim().to_string(),
                    country: non_blank(&self.country).map(|c| c.to_ascii_uppercase()),
                },
                device: DeviceInfo {
                    ip_address: non_blank(&self.ip_address),
                    fingerprint: non_blank(&self.device_fingerprint),
                    user_agent: non_blank(&self.user_agent),
                },
                instrument: PaymentInstrument {
                    card_number: non_blank(&self.card_number),
                    card_expiry: non_blank(&self.card_expiry),
                    account_reference: non_blank(&self.account_reference),
                },
                instant_settlement: self.instant_settlement,
            }),
            _ => Err(PaymentError::ValidationError(errors.join(", "))),
        }
    }
}

/// Position in the authorization state machine.
///
/// Statuses only move forward; the four terminal statuses share the last
/// stage and nothing follows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Received,
    Validated,
    RiskChecked,
    Routed,
    ProcessorResult,
    FeeComputed,
    Settled,
    Logged,
    Completed,
    Failed,
    Rejected,
    Error,
}

impl TransactionStatus {
    fn stage(&self) -> u8 {
        match self {
            TransactionStatus::Received => 0,
            TransactionStatus::Validated => 1,
            TransactionStatus::RiskChecked => 2,
            TransactionStatus::Routed => 3,
            TransactionStatus::ProcessorResult => 4,
            TransactionStatus::FeeComputed => 5,
            TransactionStatus::Settled => 6,
            TransactionStatus::Logged => 7,
            TransactionStatus::Completed
            | TransactionStatus::Failed
            | TransactionStatus::Rejected
            | TransactionStatus::Error => 8,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage() == 8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Received => "RECEIVED",
            TransactionStatus::Validated => "VALIDATED",
            TransactionStatus::RiskChecked => "RISK_CHECKED",
            TransactionStatus::Routed => "ROUTED",
            TransactionStatus::ProcessorResult => "PROCESSOR_RESULT",
            TransactionStatus::FeeComputed => "FEE_COMPUTED",
            TransactionStatus::Settled => "SETTLED",
            TransactionStatus::Logged => "LOGGED",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Rejected => "REJECTED",
            TransactionStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment moving through the pipeline. Only `status` changes after
/// creation, and only forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub amount: MinorUnits,
    pub currency: String,
    /// Method tag as received; canonical once the transaction is validated.
    pub method: String,
    pub customer: Customer,
    pub created_at: DateTime<Utc>,
    status: TransactionStatus,
}

impl Transaction {
    pub fn receive(id: String, request: &PaymentRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            amount: request.amount,
            currency: request.currency.clone(),
            method: request.method.clone(),
            customer: Customer {
                id: non_blank(&request.customer_id),
                name: request.customer_name.clone(),
                email: request.customer_email.clone(),
                country: non_blank(&request.country),
            },
            created_at,
            status: TransactionStatus::Received,
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Moves to `next`, refusing anything that is not strictly forward.
    pub fn advance(&mut self, next: TransactionStatus) -> Result<()> {
        if self.status.is_terminal() || next.stage() <= self.status.stage() {
            return Err(PaymentError::SystemError(format!(
                "illegal status transition {} -> {} for transaction {}",
                self.status, next, self.id
            )));
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PaymentRequest {
        PaymentRequest {
            amount: 10_000,
            currency: "USD".to_string(),
            method: "card".to_string(),
            customer_name: "Ada Lovelace".to_string(),
            customer_email: "ada@example.com".to_string(),
            country: Some("us".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_method_tags_round_trip() {
        for method in PaymentMethod::ALL {
            assert_eq!(method.as_str().parse::<PaymentMethod>().unwrap(), method);
        }
        assert!("paypal".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_method_serde_matches_tags() {
        let json = serde_json::to_string(&PaymentMethod::WeChat).unwrap();
        assert_eq!(json, "\"wechat\"");
        let json = serde_json::to_string(&PaymentMethod::BankTransfer).unwrap();
        assert_eq!(json, "\"bank_transfer\"");
    }

    #[test]
    fn test_validate_accepts_well_formed_request() {
        let validated = request().validate().unwrap();
        assert_eq!(validated.method, PaymentMethod::Card);
        assert_eq!(validated.customer.country.as_deref(), Some("US"));
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let bad = PaymentRequest {
            amount: 0,
            currency: "dollars".to_string(),
            method: "cheque".to_string(),
            ..Default::default()
        };
        let err = bad.validate().unwrap_err();
        let PaymentError::ValidationError(msg) = err else {
            panic!("expected validation error");
        };
        assert!(msg.contains("amount must be positive"));
        assert!(msg.contains("invalid currency"));
        assert!(msg.contains("unsupported payment method 'cheque'"));
        assert!(msg.contains("customer name is required"));
        assert!(msg.contains("customer email is required"));
    }

    #[test]
    fn test_validate_bounds_amount_to_twelve_digits() {
        let at_limit = PaymentRequest {
            amount: MAX_AMOUNT,
            ..request()
        };
        assert!(at_limit.validate().is_ok());

        let over = PaymentRequest {
            amount: 1_000_000_000_000,
            ..request()
        };
        let Err(PaymentError::ValidationError(msg)) = over.validate() else {
            panic!("expected validation error");
        };
        assert_eq!(msg, "amount must not exceed 999999999999");
    }

    #[test]
    fn test_status_only_moves_forward() {
        let mut tx = Transaction::receive("tx_1".to_string(), &request(), Utc::now());
        tx.advance(TransactionStatus::Validated).unwrap();
        tx.advance(TransactionStatus::RiskChecked).unwrap();
        assert!(tx.advance(TransactionStatus::Validated).is_err());
        assert!(tx.advance(TransactionStatus::RiskChecked).is_err());

        // Skipping ahead is allowed, stepping out of a terminal status is not.
        tx.advance(TransactionStatus::Logged).unwrap();
        tx.advance(TransactionStatus::Failed).unwrap();
        assert!(tx.advance(TransactionStatus::Completed).is_err());
        assert_eq!(tx.status(), TransactionStatus::Failed);
    }

    #[test]
    fn test_merchant_tier_parsing() {
        assert_eq!("premium".parse::<MerchantTier>().unwrap(), MerchantTier::Premium);
        assert!("gold".parse::<MerchantTier>().is_err());
    }
}
