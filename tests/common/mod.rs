#![allow(dead_code)]

use async_trait::async_trait;
use authsettle::application::pipeline::{AuthorizationPipeline, PipelinePorts};
use authsettle::application::registry::ProcessorRegistry;
use authsettle::config::PipelineConfig;
use authsettle::domain::outcome::LogEntry;
use authsettle::domain::payment::{PaymentMethod, PaymentRequest};
use authsettle::domain::ports::{
    AuthorizationRequest, ProcessorAdapter, ProcessorFailure, ProcessorResult, RiskDataProvider,
    RiskDataProviderBox, TransactionLogger, TransactionLoggerBox,
};
use authsettle::domain::risk::{GeoLocation, HistoricalPayment};
use authsettle::error::{PaymentError, Result};
use authsettle::infrastructure::clock::{FixedClock, SequentialIdGenerator};
use authsettle::infrastructure::in_memory::{
    InMemoryIdempotencyStore, InMemoryRiskData, InMemoryTransactionLog,
};
use chrono::{DateTime, TimeZone, Utc};
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const CSV_HEADER: [&str; 15] = [
    "idempotency_key",
    "amount",
    "currency",
    "method",
    "customer_id",
    "customer_name",
    "customer_email",
    "country",
    "ip_address",
    "device_fingerprint",
    "user_agent",
    "card_number",
    "card_expiry",
    "account_reference",
    "instant_settlement",
];

/// Tuesday 2024-06-11 12:00 UTC.
pub fn weekday_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 11, 12, 0, 0).unwrap()
}

pub fn card_request(amount: i64) -> PaymentRequest {
    PaymentRequest {
        amount,
        currency: "USD".to_string(),
        method: "card".to_string(),
        customer_id: Some("cus_1".to_string()),
        customer_name: "Ada Lovelace".to_string(),
        customer_email: "ada@example.com".to_string(),
        country: Some("US".to_string()),
        card_number: Some("4111111111111111".to_string()),
        card_expiry: Some("1299".to_string()),
        ..Default::default()
    }
}

pub fn keyed(key: &str, request: PaymentRequest) -> PaymentRequest {
    PaymentRequest {
        idempotency_key: Some(key.to_string()),
        ..request
    }
}

#[derive(Debug, Clone)]
pub enum Behavior {
    Approve,
    Decline { code: &'static str, message: &'static str },
}

/// Processor double that counts calls and answers after `delay`.
pub struct FakeProcessor {
    behavior: Behavior,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeProcessor {
    pub fn new(behavior: Behavior, delay: Duration) -> Self {
        Self {
            behavior,
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessorAdapter for FakeProcessor {
    fn name(&self) -> &str {
        "fake"
    }

    async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> std::result::Result<ProcessorResult, ProcessorFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.behavior {
            Behavior::Approve => Ok(ProcessorResult {
                processor_transaction_id: format!("fake_{}", request.transaction_id),
                authorization_code: Some("AUTH01".to_string()),
                processor_name: "fake".to_string(),
            }),
            Behavior::Decline { code, message } => Err(ProcessorFailure::new(*code, *message)),
        }
    }
}

pub struct FailingLogger;

#[async_trait]
impl TransactionLogger for FailingLogger {
    async fn log(&self, _entry: &LogEntry) -> Result<()> {
        Err(PaymentError::SystemError("log sink unavailable".to_string()))
    }
}

pub struct FailingRiskData;

#[async_trait]
impl RiskDataProvider for FailingRiskData {
    async fn recent_transaction_count(&self, _: &str, _: &str) -> Result<u32> {
        Err(PaymentError::SystemError("risk backend down".to_string()))
    }

    async fn geolocate(&self, _: &str) -> Result<Option<GeoLocation>> {
        Err(PaymentError::SystemError("risk backend down".to_string()))
    }

    async fn customer_history(&self, _: &str) -> Result<Vec<HistoricalPayment>> {
        Err(PaymentError::SystemError("risk backend down".to_string()))
    }
}

/// Answers nothing for a minute.
pub struct StalledRiskData;

#[async_trait]
impl RiskDataProvider for StalledRiskData {
    async fn recent_transaction_count(&self, _: &str, _: &str) -> Result<u32> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(0)
    }

    async fn geolocate(&self, _: &str) -> Result<Option<GeoLocation>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(None)
    }

    async fn customer_history(&self, _: &str) -> Result<Vec<HistoricalPayment>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }
}

/// Shared stores and doubles for building pipelines in tests.
pub struct Harness {
    pub config: PipelineConfig,
    pub processor: Arc<FakeProcessor>,
    pub log: InMemoryTransactionLog,
    pub risk_data: InMemoryRiskData,
    pub idempotency: InMemoryIdempotencyStore,
    pub clock: Arc<FixedClock>,
    pub ids: Arc<SequentialIdGenerator>,
}

impl Harness {
    pub fn new(behavior: Behavior) -> Self {
        Self::with_delay(behavior, Duration::ZERO)
    }

    pub fn with_delay(behavior: Behavior, delay: Duration) -> Self {
        let clock = Arc::new(FixedClock::new(weekday_noon()));
        Self {
            config: PipelineConfig::default(),
            processor: Arc::new(FakeProcessor::new(behavior, delay)),
            log: InMemoryTransactionLog::new(),
            risk_data: InMemoryRiskData::new(),
            idempotency: InMemoryIdempotencyStore::new().with_clock(clock.clone()),
            clock,
            ids: Arc::new(SequentialIdGenerator::new()),
        }
    }

    /// The fake processor registered for every method.
    pub fn registry(&self) -> ProcessorRegistry {
        let mut registry = ProcessorRegistry::new();
        for method in PaymentMethod::ALL {
            registry.register(method, self.processor.clone());
        }
        registry
    }

    pub fn pipeline(&self) -> Arc<AuthorizationPipeline> {
        self.build(
            self.registry(),
            Box::new(self.risk_data.clone()),
            Box::new(self.log.clone()),
        )
    }

    pub fn build(
        &self,
        processors: ProcessorRegistry,
        risk_data: RiskDataProviderBox,
        logger: TransactionLoggerBox,
    ) -> Arc<AuthorizationPipeline> {
        Arc::new(AuthorizationPipeline::new(
            self.config.clone(),
            PipelinePorts {
                processors,
                risk_data,
                logger,
                idempotency: Box::new(self.idempotency.clone()),
                clock: self.clock.clone(),
                ids: self.ids.clone(),
            },
        ))
    }
}

pub fn generate_csv(path: &Path, rows: usize) -> std::result::Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(CSV_HEADER)?;

    for i in 1..=rows {
        wtr.write_record([
            format!("order-{i}").as_str(),
            "1000",
            "USD",
            "card",
            &format!("cus_{i}"),
            "Load Test",
            "load@example.com",
            "US",
            "",
            "",
            "",
            "4111111111111111",
            "1299",
            "",
            "",
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
