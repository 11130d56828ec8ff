//! In-process stand-ins for real processors.
//!
//! The card processor talks to a simulated acquirer over the wire codec, so
//! every CLI run exercises the full `0100` / `0110` exchange. Other methods
//! are approved by a generic processor after a configurable latency.

use crate::application::registry::ProcessorRegistry;
use crate::domain::money::MinorUnits;
use crate::domain::payment::PaymentMethod;
use crate::domain::ports::{
    AuthorizationRequest, ClockArc, IdGeneratorArc, ProcessorAdapter, ProcessorFailure,
    ProcessorResult,
};
use crate::error::ProtocolError;
use crate::interfaces::iso8583::MessageCodec;
use crate::interfaces::iso8583::builder::{
    AuthorizationResponse, CardAuthorization, RESPONSE_APPROVED, RESPONSE_DO_NOT_HONOR,
    authorization_request, authorization_response,
};
use async_trait::async_trait;
use chrono::Datelike;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_DECLINE_ABOVE: MinorUnits = 1_000_000;
const TERMINAL_ID: &str = "SIM00001";

/// Luhn checksum over a 12 to 19 digit PAN.
pub fn luhn_valid(pan: &str) -> bool {
    if !(12..=19).contains(&pan.len()) || !pan.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum: u32 = pan
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let digit = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();
    sum % 10 == 0
}

/// Card scheme from the PAN prefix.
pub fn card_network(pan: &str) -> &'static str {
    match pan.as_bytes() {
        [b'4', ..] => "visa",
        [b'5', b'1'..=b'5', ..] | [b'2', ..] => "mastercard",
        [b'3', b'4' | b'7', ..] => "amex",
        [b'6', ..] => "discover",
        _ => "unknown",
    }
}

/// Acquirer answering `0100` requests with `0110` responses.
///
/// Approves with response code `00` unless the amount is above the decline
/// limit, in which case it answers `05`.
#[derive(Debug, Clone)]
pub struct SimulatedAcquirer {
    codec: MessageCodec,
    decline_above: MinorUnits,
}

impl SimulatedAcquirer {
    pub fn new(codec: MessageCodec, decline_above: MinorUnits) -> Self {
        Self {
            codec,
            decline_above,
        }
    }

    pub fn respond(&self, request: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let message = self.codec.decode(request)?;
        let amount: MinorUnits = message
            .field_str(4)
            .and_then(|value| value.parse().ok())
            .ok_or(ProtocolError::MissingField(4))?;
        let trace: u32 = message
            .field_str(11)
            .and_then(|value| value.parse().ok())
            .ok_or(ProtocolError::MissingField(11))?;

        let reference = format!("{trace:012}");
        let response = if amount > self.decline_above {
            authorization_response(&message, RESPONSE_DO_NOT_HONOR, None, &reference)?
        } else {
            let code = format!("A{:05}", trace % 100_000);
            authorization_response(&message, RESPONSE_APPROVED, Some(&code), &reference)?
        };
        self.codec.encode(&response)
    }
}

fn invalid_card(message: &str) -> ProcessorFailure {
    ProcessorFailure::new("INVALID_CARD", message)
}

fn protocol_failure(error: ProtocolError) -> ProcessorFailure {
    ProcessorFailure::new("PROTOCOL_ERROR", error.to_string())
}

pub struct SimulatedCardProcessor {
    codec: MessageCodec,
    acquirer: SimulatedAcquirer,
    clock: ClockArc,
    ids: IdGeneratorArc,
}

impl SimulatedCardProcessor {
    pub fn new(codec: MessageCodec, acquirer: SimulatedAcquirer, clock: ClockArc, ids: IdGeneratorArc) -> Self {
        Self {
            codec,
            acquirer,
            clock,
            ids,
        }
    }

    /// `MMYY` from the request into the wire's `YYMM`, refusing expired cards.
    fn expiry(&self, mmyy: Option<&str>) -> Result<String, ProcessorFailure> {
        let mmyy = mmyy.ok_or_else(|| invalid_card("card expiry is required"))?;
        if mmyy.len() != 4 || !mmyy.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid_card("card expiry must be MMYY"));
        }
        let (mm, yy) = mmyy.split_at(2);
        let month: u32 = mm.parse().unwrap_or(0);
        let year: i32 = yy.parse().unwrap_or(0);
        if !(1..=12).contains(&month) {
            return Err(invalid_card("card expiry month is invalid"));
        }
        let now = self.clock.now();
        if (year, month) < (now.year() % 100, now.month()) {
            return Err(ProcessorFailure::new("EXPIRED_CARD", "card has expired"));
        }
        Ok(format!("{yy}{mm}"))
    }
}

#[async_trait]
impl ProcessorAdapter for SimulatedCardProcessor {
    fn name(&self) -> &str {
        "simulated-card"
    }

    async fn authorize(&self, request: &AuthorizationRequest) -> Result<ProcessorResult, ProcessorFailure> {
        let pan = request
            .instrument
            .card_number
            .as_deref()
            .ok_or_else(|| invalid_card("card number is required"))?;
        if !luhn_valid(pan) {
            return Err(invalid_card("card number failed the Luhn check"));
        }
        let expiry = self.expiry(request.instrument.card_expiry.as_deref())?;

        let message = authorization_request(&CardAuthorization {
            pan,
            expiry: &expiry,
            amount: request.amount,
            currency: &request.currency,
            merchant_id: &request.merchant_id,
            terminal_id: TERMINAL_ID,
            trace_number: self.ids.trace_number(),
            at: self.clock.now(),
            three_ds: None,
        });
        let wire = self.codec.encode(&message).map_err(protocol_failure)?;
        tracing::debug!(
            transaction_id = %request.transaction_id,
            network = card_network(pan),
            bytes = wire.len(),
            "sending authorization request"
        );

        let answer = self.acquirer.respond(&wire).map_err(protocol_failure)?;
        let decoded = self.codec.decode(&answer).map_err(protocol_failure)?;
        let response = AuthorizationResponse::from_message(&decoded).map_err(protocol_failure)?;

        if !response.is_approved() {
            return Err(ProcessorFailure::new(
                "CARD_DECLINED",
                format!("issuer declined with response code {}", response.response_code),
            ));
        }
        Ok(ProcessorResult {
            processor_transaction_id: response
                .retrieval_reference
                .or(response.trace_number)
                .unwrap_or_else(|| request.transaction_id.clone()),
            authorization_code: response.authorization_code,
            processor_name: self.name().to_string(),
        })
    }
}

/// Approves everything after `latency`.
pub struct SimulatedProcessor {
    name: String,
    latency: Duration,
    ids: IdGeneratorArc,
}

impl SimulatedProcessor {
    pub fn new(method: PaymentMethod, latency: Duration, ids: IdGeneratorArc) -> Self {
        Self {
            name: format!("simulated-{method}"),
            latency,
            ids,
        }
    }
}

#[async_trait]
impl ProcessorAdapter for SimulatedProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn authorize(&self, _request: &AuthorizationRequest) -> Result<ProcessorResult, ProcessorFailure> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(ProcessorResult {
            processor_transaction_id: format!("{}_{:06}", self.name, self.ids.trace_number()),
            authorization_code: None,
            processor_name: self.name.clone(),
        })
    }
}

/// A registry with the simulated card processor for cards and the generic
/// one for every other method.
pub fn simulated_registry(
    codec: MessageCodec,
    decline_above: MinorUnits,
    clock: ClockArc,
    ids: IdGeneratorArc,
) -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    let acquirer = SimulatedAcquirer::new(codec.clone(), decline_above);
    registry.register(
        PaymentMethod::Card,
        Arc::new(SimulatedCardProcessor::new(codec, acquirer, clock, ids.clone())),
    );
    for method in PaymentMethod::ALL {
        if method != PaymentMethod::Card {
            registry.register(
                method,
                Arc::new(SimulatedProcessor::new(method, Duration::ZERO, ids.clone())),
            );
        }
    }
    registry
}
