use super::fees::FeeBreakdown;
use super::money::MinorUnits;
use super::payment::{Transaction, TransactionStatus};
use super::ports::ProcessorResult;
use super::risk::RiskAssessment;
use super::settlement::SettlementRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-visible failure code, rendered in SCREAMING_SNAKE_CASE.
///
/// Codes reported by a processor adapter pass through as `Processor`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
    ValidationError,
    FraudDetected,
    ProcessorError,
    SettlementError,
    SystemError,
    Cancelled,
    DuplicateRequest,
    Processor(String),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::FraudDetected => "FRAUD_DETECTED",
            ErrorCode::ProcessorError => "PROCESSOR_ERROR",
            ErrorCode::SettlementError => "SETTLEMENT_ERROR",
            ErrorCode::SystemError => "SYSTEM_ERROR",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::DuplicateRequest => "DUPLICATE_REQUEST",
            ErrorCode::Processor(code) => code,
        }
    }
}

impl From<String> for ErrorCode {
    fn from(code: String) -> Self {
        match code.as_str() {
            "VALIDATION_ERROR" => ErrorCode::ValidationError,
            "FRAUD_DETECTED" => ErrorCode::FraudDetected,
            "PROCESSOR_ERROR" => ErrorCode::ProcessorError,
            "SETTLEMENT_ERROR" => ErrorCode::SettlementError,
            "SYSTEM_ERROR" => ErrorCode::SystemError,
            "CANCELLED" => ErrorCode::Cancelled,
            "DUPLICATE_REQUEST" => ErrorCode::DuplicateRequest,
            _ => ErrorCode::Processor(code),
        }
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the caller learns about one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub transaction: Transaction,
    pub risk: Option<RiskAssessment>,
    pub processor: Option<ProcessorResult>,
    pub fees: Option<FeeBreakdown>,
    pub settlement: Option<SettlementRecord>,
    /// Set when the payment succeeded but instant settlement did not.
    pub settlement_error: Option<String>,
    pub error_code: Option<ErrorCode>,
    /// Caller-safe message; fraud and system details are redacted.
    pub message: Option<String>,
}

impl PaymentOutcome {
    pub fn new(transaction: Transaction) -> Self {
        Self {
            transaction,
            risk: None,
            processor: None,
            fees: None,
            settlement: None,
            settlement_error: None,
            error_code: None,
            message: None,
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.transaction.status()
    }

    pub fn is_success(&self) -> bool {
        self.status() == TransactionStatus::Completed
    }
}

/// The record handed to the transaction logger, once per transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub transaction_id: String,
    pub merchant_id: String,
    pub amount: MinorUnits,
    pub currency: String,
    pub method: String,
    pub status: TransactionStatus,
    pub error_code: Option<ErrorCode>,
    pub fees: Option<FeeBreakdown>,
    pub risk_score: Option<u8>,
    /// Unredacted; never shown to the caller.
    pub fraud_reason: Option<String>,
    pub processor_transaction_id: Option<String>,
    pub settlement_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn from_outcome(
        outcome: &PaymentOutcome,
        merchant_id: &str,
        fraud_reason: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let tx = &outcome.transaction;
        Self {
            transaction_id: tx.id.clone(),
            merchant_id: merchant_id.to_string(),
            amount: tx.amount,
            currency: tx.currency.clone(),
            method: tx.method.clone(),
            status: tx.status(),
            error_code: outcome.error_code.clone(),
            fees: outcome.fees.clone(),
            risk_score: outcome.risk.as_ref().map(|risk| risk.score),
            fraud_reason,
            processor_transaction_id: outcome
                .processor
                .as_ref()
                .map(|p| p.processor_transaction_id.clone()),
            settlement_id: outcome.settlement.as_ref().map(|s| s.settlement_id.clone()),
            timestamp,
        }
    }
}
