use super::registry::ProcessorRegistry;
use crate::config::PipelineConfig;
use crate::domain::fees::{FeeEngine, FeeSchedule};
use crate::domain::outcome::{ErrorCode, LogEntry, PaymentOutcome};
use crate::domain::payment::{PaymentRequest, Transaction, TransactionStatus, ValidatedPayment};
use crate::domain::ports::{
    AuthorizationRequest, ClockArc, IdGeneratorArc, IdempotencyStoreBox, ProcessorResult,
    Reservation, RiskDataProviderBox, TransactionLoggerBox,
};
use crate::domain::risk::{RiskPolicy, RiskScorer, RiskSignals};
use crate::domain::settlement::{SettlementScheduler, SettlementTable};
use crate::error::{PaymentError, Result};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

const SYSTEM_ERROR_MESSAGE: &str = "An internal error occurred. Please try again later.";
const FRAUD_MESSAGE: &str = "Transaction declined";

/// External collaborators of the pipeline.
pub struct PipelinePorts {
    pub processors: ProcessorRegistry,
    pub risk_data: RiskDataProviderBox,
    pub logger: TransactionLoggerBox,
    pub idempotency: IdempotencyStoreBox,
    pub clock: ClockArc,
    pub ids: IdGeneratorArc,
}

/// Why an attempt stopped before completing.
struct Stop {
    status: TransactionStatus,
    code: ErrorCode,
    message: String,
    /// The idempotency key may be reused, provided no processor was called.
    releases_key: bool,
}

impl Stop {
    fn failed(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: TransactionStatus::Failed,
            code,
            message: message.into(),
            releases_key: false,
        }
    }

    fn validation(message: String) -> Self {
        Self {
            releases_key: true,
            ..Self::failed(ErrorCode::ValidationError, message)
        }
    }

    fn cancelled() -> Self {
        Self {
            releases_key: true,
            ..Self::failed(ErrorCode::Cancelled, "Request cancelled before authorization")
        }
    }

    fn fraud() -> Self {
        Self {
            status: TransactionStatus::Rejected,
            ..Self::failed(ErrorCode::FraudDetected, FRAUD_MESSAGE)
        }
    }
}

impl From<PaymentError> for Stop {
    fn from(error: PaymentError) -> Self {
        warn!(error = %error, "system error during authorization");
        Self {
            status: TransactionStatus::Error,
            code: ErrorCode::SystemError,
            message: SYSTEM_ERROR_MESSAGE.to_string(),
            releases_key: true,
        }
    }
}

/// State carried through one run of the pipeline.
struct Attempt {
    outcome: PaymentOutcome,
    fraud_reason: Option<String>,
    reached_processor: bool,
}

impl Attempt {
    fn new(transaction: Transaction) -> Self {
        Self {
            outcome: PaymentOutcome::new(transaction),
            fraud_reason: None,
            reached_processor: false,
        }
    }

    fn advance(&mut self, next: TransactionStatus) -> Result<()> {
        let tx = &mut self.outcome.transaction;
        debug!(transaction_id = %tx.id, from = %tx.status(), to = %next, "status transition");
        tx.advance(next)
    }
}

/// Runs payment requests through validation, risk scoring, processor
/// routing, fee computation, optional instant settlement and logging.
///
/// Stateless between requests apart from the injected stores, so one
/// instance can be shared behind an `Arc` and driven concurrently.
pub struct AuthorizationPipeline {
    config: PipelineConfig,
    scorer: RiskScorer,
    fees: Arc<FeeEngine>,
    settlement: SettlementScheduler,
    ports: PipelinePorts,
}

impl AuthorizationPipeline {
    /// Creates a pipeline over the standard risk, fee and settlement tables.
    pub fn new(config: PipelineConfig, ports: PipelinePorts) -> Self {
        Self::with_tables(
            config,
            ports,
            Arc::new(RiskPolicy::default()),
            Arc::new(FeeSchedule::default()),
            Arc::new(SettlementTable::default()),
        )
    }

    pub fn with_tables(
        config: PipelineConfig,
        ports: PipelinePorts,
        risk_policy: Arc<RiskPolicy>,
        fee_schedule: Arc<FeeSchedule>,
        settlement_table: Arc<SettlementTable>,
    ) -> Self {
        let fees = Arc::new(FeeEngine::new(fee_schedule));
        let settlement = SettlementScheduler::new(
            settlement_table,
            fees.clone(),
            ports.clock.clone(),
            ports.ids.clone(),
        );
        Self {
            config,
            scorer: RiskScorer::new(risk_policy),
            fees,
            settlement,
            ports,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn fee_engine(&self) -> &FeeEngine {
        &self.fees
    }

    pub async fn process(&self, request: PaymentRequest) -> PaymentOutcome {
        self.process_until(request, std::future::pending()).await
    }

    /// Like [`process`](Self::process), but gives up if `cancel` resolves
    /// before the processor has answered. Once the processor has approved,
    /// cancellation is ignored and the transaction runs to completion.
    pub async fn process_until<C>(&self, request: PaymentRequest, cancel: C) -> PaymentOutcome
    where
        C: Future<Output = ()> + Send,
    {
        let key = request
            .idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string);

        let receive = || {
            Attempt::new(Transaction::receive(
                self.ports.ids.transaction_id(),
                &request,
                self.ports.clock.now(),
            ))
        };

        if let Some(key) = &key {
            match self.ports.idempotency.reserve(key).await {
                Ok(Reservation::Acquired) => {}
                Ok(Reservation::Completed(outcome)) => {
                    info!(
                        idempotency_key = %key,
                        transaction_id = %outcome.transaction.id,
                        "replaying completed request"
                    );
                    return *outcome;
                }
                Ok(Reservation::InFlight) => {
                    let stop = Stop::failed(
                        ErrorCode::DuplicateRequest,
                        "A request with this idempotency key is already in progress",
                    );
                    return self.finish(receive(), Err(stop), None).await;
                }
                Err(e) => {
                    let mut stop = Stop::from(e);
                    stop.releases_key = false;
                    return self.finish(receive(), Err(stop), None).await;
                }
            }
        }

        let mut attempt = receive();
        tokio::pin!(cancel);
        let authorized = tokio::select! {
            biased;
            _ = &mut cancel => Err(Stop::cancelled()),
            result = self.authorize(&mut attempt, &request) => result,
        };

        let result = match authorized {
            Ok((payment, processor)) => {
                attempt.outcome.processor = Some(processor);
                self.settle(&mut attempt, &payment, &request)
                    .map_err(Stop::from)
            }
            Err(stop) => Err(stop),
        };
        self.finish(attempt, result, key.as_deref()).await
    }

    /// Everything up to and including the processor answer.
    async fn authorize(
        &self,
        attempt: &mut Attempt,
        request: &PaymentRequest,
    ) -> std::result::Result<(ValidatedPayment, ProcessorResult), Stop> {
        let payment = request.validate().map_err(|e| match e {
            PaymentError::ValidationError(message) => Stop::validation(message),
            other => Stop::from(other),
        })?;
        attempt.advance(TransactionStatus::Validated)?;

        let signals = self.gather_signals(&payment).await?;
        let assessment = self.scorer.assess(&signals);
        let fraudulent = assessment.is_fraudulent();
        if fraudulent {
            attempt.fraud_reason = Some(assessment.reason.clone());
        }
        attempt.outcome.risk = Some(assessment);
        attempt.advance(TransactionStatus::RiskChecked)?;
        if fraudulent {
            return Err(Stop::fraud());
        }

        let adapter = self.ports.processors.route(payment.method).ok_or_else(|| {
            Stop::failed(
                ErrorCode::ProcessorError,
                format!("No processor available for {}", payment.method),
            )
        })?;
        attempt.advance(TransactionStatus::Routed)?;

        let authorization = AuthorizationRequest {
            transaction_id: attempt.outcome.transaction.id.clone(),
            merchant_id: self.config.merchant_id.clone(),
            amount: payment.amount,
            currency: payment.currency.clone(),
            method: payment.method,
            customer: payment.customer.clone(),
            instrument: payment.instrument.clone(),
        };
        attempt.reached_processor = true;
        debug!(
            transaction_id = %authorization.transaction_id,
            processor = adapter.name(),
            "calling processor"
        );
        let processor = match tokio::time::timeout(
            self.config.processor_timeout,
            adapter.authorize(&authorization),
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(failure)) => {
                return Err(Stop::failed(ErrorCode::from(failure.code), failure.message));
            }
            Err(_) => {
                return Err(Stop::failed(
                    ErrorCode::ProcessorError,
                    format!("Processor {} timed out", adapter.name()),
                ));
            }
        };
        attempt.advance(TransactionStatus::ProcessorResult)?;
        Ok((payment, processor))
    }

    async fn lookup<T>(&self, what: &str, lookup: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.config.provider_timeout, lookup)
            .await
            .map_err(|_| PaymentError::SystemError(format!("risk data provider timed out on {what}")))?
    }

    async fn gather_signals(&self, payment: &ValidatedPayment) -> Result<RiskSignals> {
        let provider = &self.ports.risk_data;
        let (recent_transaction_count, history) = match &payment.customer.id {
            Some(id) => (
                self.lookup(
                    "recent transactions",
                    provider.recent_transaction_count(id, &self.config.merchant_id),
                )
                .await?,
                self.lookup("customer history", provider.customer_history(id))
                    .await?,
            ),
            None => (0, Vec::new()),
        };
        let geolocation = match &payment.device.ip_address {
            Some(ip) => self.lookup("geolocation", provider.geolocate(ip)).await?,
            None => None,
        };

        Ok(RiskSignals {
            amount: payment.amount,
            currency: payment.currency.clone(),
            method: payment.method,
            customer_id: payment.customer.id.clone(),
            customer_country: payment.customer.country.clone(),
            ip_address: payment.device.ip_address.clone(),
            geolocation,
            device_fingerprint: payment.device.fingerprint.clone(),
            user_agent: payment.device.user_agent.clone(),
            recent_transaction_count,
            history,
            at: self.ports.clock.now(),
        })
    }

    /// Fees and optional instant settlement. Settlement problems degrade the
    /// outcome but never fail it.
    fn settle(
        &self,
        attempt: &mut Attempt,
        payment: &ValidatedPayment,
        request: &PaymentRequest,
    ) -> Result<()> {
        let country = payment
            .customer
            .country
            .clone()
            .unwrap_or_else(|| self.config.default_country.clone());

        let fees = self.fees.calculate_processing_fee(
            payment.amount,
            &payment.currency,
            payment.method,
            &country,
            self.config.merchant_tier,
        );
        attempt.advance(TransactionStatus::FeeComputed)?;

        let instant = request
            .instant_settlement
            .unwrap_or(self.config.instant_settlement);
        if instant {
            let settled = if self.settlement.is_available_now(&country) {
                self.settlement.schedule(&attempt.outcome.transaction, &fees)
            } else {
                Err(PaymentError::SettlementError(format!(
                    "settlement is not available in {country} at this time"
                )))
            };
            match settled {
                Ok(record) => {
                    attempt.outcome.settlement = Some(record);
                    attempt.advance(TransactionStatus::Settled)?;
                }
                Err(e) => {
                    warn!(
                        transaction_id = %attempt.outcome.transaction.id,
                        error = %e,
                        "instant settlement failed"
                    );
                    attempt.outcome.settlement_error = Some(e.to_string());
                }
            }
        }
        attempt.outcome.fees = Some(fees);
        Ok(())
    }

    /// Writes the single log entry, moves to the terminal status and settles
    /// the idempotency key.
    async fn finish(
        &self,
        mut attempt: Attempt,
        result: std::result::Result<(), Stop>,
        key: Option<&str>,
    ) -> PaymentOutcome {
        let (terminal, releases_key) = match result {
            Ok(()) => (TransactionStatus::Completed, false),
            Err(stop) => {
                attempt.outcome.error_code = Some(stop.code);
                attempt.outcome.message = Some(stop.message);
                (stop.status, stop.releases_key && !attempt.reached_processor)
            }
        };

        if let Err(e) = attempt.advance(TransactionStatus::Logged) {
            warn!(error = %e, "could not mark transaction as logged");
        }
        let mut entry = LogEntry::from_outcome(
            &attempt.outcome,
            &self.config.merchant_id,
            attempt.fraud_reason.take(),
            self.ports.clock.now(),
        );
        entry.status = terminal;
        match tokio::time::timeout(self.config.logger_timeout, self.ports.logger.log(&entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(transaction_id = %entry.transaction_id, error = %e, "transaction log write failed"),
            Err(_) => warn!(transaction_id = %entry.transaction_id, "transaction log write timed out"),
        }
        if let Err(e) = attempt.advance(terminal) {
            warn!(error = %e, "could not set terminal status");
        }

        let outcome = attempt.outcome;
        if let Some(key) = key {
            let settled = if releases_key {
                self.ports.idempotency.release(key).await
            } else {
                self.ports.idempotency.complete(key, &outcome).await
            };
            if let Err(e) = settled {
                warn!(idempotency_key = %key, error = %e, "idempotency store update failed");
            }
        }

        info!(
            transaction_id = %outcome.transaction.id,
            status = %outcome.status(),
            error_code = outcome.error_code.as_ref().map(|c| c.as_str()),
            "transaction finished"
        );
        outcome
    }
}
