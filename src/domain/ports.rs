use super::money::MinorUnits;
use super::outcome::{LogEntry, PaymentOutcome};
use super::payment::{Customer, PaymentInstrument, PaymentMethod};
use super::risk::{GeoLocation, HistoricalPayment};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// What a processor adapter is asked to authorize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub transaction_id: String,
    pub merchant_id: String,
    pub amount: MinorUnits,
    pub currency: String,
    pub method: PaymentMethod,
    pub customer: Customer,
    pub instrument: PaymentInstrument,
}

/// Successful authorization, unified across processors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorResult {
    pub processor_transaction_id: String,
    pub authorization_code: Option<String>,
    pub processor_name: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ProcessorFailure {
    pub code: String,
    pub message: String,
}

impl ProcessorFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// One adapter per payment method.
#[async_trait]
pub trait ProcessorAdapter: Send + Sync {
    fn name(&self) -> &str;
    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> std::result::Result<ProcessorResult, ProcessorFailure>;
}

/// Lookups feeding the risk factors.
#[async_trait]
pub trait RiskDataProvider: Send + Sync {
    async fn recent_transaction_count(&self, customer_id: &str, merchant_id: &str) -> Result<u32>;
    async fn geolocate(&self, ip_address: &str) -> Result<Option<GeoLocation>>;
    async fn customer_history(&self, customer_id: &str) -> Result<Vec<HistoricalPayment>>;
}

/// Sink for the single log entry written per transaction. Errors returned
/// here are reported and dropped by the pipeline.
#[async_trait]
pub trait TransactionLogger: Send + Sync {
    async fn log(&self, entry: &LogEntry) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    /// The caller owns the key and must `complete` or `release` it.
    Acquired,
    InFlight,
    Completed(Box<PaymentOutcome>),
}

/// How long a reservation may stay in flight before another request may
/// take the key over. Outlasts the pipeline's slowest path (processor,
/// provider and logger timeouts together).
pub const DEFAULT_IN_FLIGHT_LEASE: std::time::Duration = std::time::Duration::from_secs(300);

/// Whether an in-flight reservation taken at `since` has outlived `lease`.
/// A `since` in the future never has.
pub fn lease_expired(since: DateTime<Utc>, now: DateTime<Utc>, lease: std::time::Duration) -> bool {
    (now - since).to_std().is_ok_and(|age| age >= lease)
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn reserve(&self, key: &str) -> Result<Reservation>;
    async fn complete(&self, key: &str, outcome: &PaymentOutcome) -> Result<()>;
    async fn release(&self, key: &str) -> Result<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait IdGenerator: Send + Sync {
    fn transaction_id(&self) -> String;
    fn settlement_id(&self) -> String;
    /// Six-digit system trace audit number for wire messages.
    fn trace_number(&self) -> u32;
}

pub type ProcessorAdapterArc = Arc<dyn ProcessorAdapter>;
pub type RiskDataProviderBox = Box<dyn RiskDataProvider>;
pub type TransactionLoggerBox = Box<dyn TransactionLogger>;
pub type IdempotencyStoreBox = Box<dyn IdempotencyStore>;
pub type ClockArc = Arc<dyn Clock>;
pub type IdGeneratorArc = Arc<dyn IdGenerator>;
