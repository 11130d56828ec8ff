use crate::domain::money::MinorUnits;
use crate::domain::outcome::PaymentOutcome;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct OutcomeRow<'a> {
    transaction_id: &'a str,
    status: &'static str,
    error_code: Option<&'a str>,
    amount: MinorUnits,
    currency: &'a str,
    method: &'a str,
    risk_score: Option<u8>,
    total_fee: Option<MinorUnits>,
    net_amount: Option<MinorUnits>,
    settlement_id: Option<&'a str>,
    settlement_net_amount: Option<MinorUnits>,
}

impl<'a> From<&'a PaymentOutcome> for OutcomeRow<'a> {
    fn from(outcome: &'a PaymentOutcome) -> Self {
        let tx = &outcome.transaction;
        Self {
            transaction_id: &tx.id,
            status: tx.status().as_str(),
            error_code: outcome.error_code.as_ref().map(|code| code.as_str()),
            amount: tx.amount,
            currency: &tx.currency,
            method: &tx.method,
            risk_score: outcome.risk.as_ref().map(|risk| risk.score),
            total_fee: outcome.fees.as_ref().map(|fees| fees.total_fee),
            net_amount: outcome.fees.as_ref().map(|fees| fees.net_amount),
            settlement_id: outcome.settlement.as_ref().map(|s| s.settlement_id.as_str()),
            settlement_net_amount: outcome.settlement.as_ref().map(|s| s.net_amount),
        }
    }
}

/// Writes one CSV row per outcome, header first.
pub struct OutcomeWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OutcomeWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_outcome(&mut self, outcome: &PaymentOutcome) -> Result<()> {
        self.writer.serialize(OutcomeRow::from(outcome))?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
