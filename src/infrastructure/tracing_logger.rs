use crate::domain::outcome::LogEntry;
use crate::domain::ports::TransactionLogger;
use crate::error::Result;
use async_trait::async_trait;

/// Emits each log entry as a structured `tracing` event under the
/// `transaction_log` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTransactionLogger;

#[async_trait]
impl TransactionLogger for TracingTransactionLogger {
    async fn log(&self, entry: &LogEntry) -> Result<()> {
        tracing::info!(
            target: "transaction_log",
            transaction_id = %entry.transaction_id,
            merchant_id = %entry.merchant_id,
            amount = entry.amount,
            currency = %entry.currency,
            method = %entry.method,
            status = %entry.status,
            error_code = entry.error_code.as_ref().map(|c| c.as_str()),
            total_fee = entry.fees.as_ref().map(|f| f.total_fee),
            risk_score = entry.risk_score,
            fraud_reason = entry.fraud_reason.as_deref(),
            processor_transaction_id = entry.processor_transaction_id.as_deref(),
            settlement_id = entry.settlement_id.as_deref(),
            timestamp = %entry.timestamp.to_rfc3339(),
            "transaction logged"
        );
        Ok(())
    }
}
