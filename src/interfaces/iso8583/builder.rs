//! Builders for the handful of messages the gateway exchanges with an
//! acquirer, and a typed view of the authorization response.

use super::message::{Mti, WireMessage};
use crate::domain::money::MinorUnits;
use crate::error::ProtocolError;
use chrono::{DateTime, Utc};

pub const PROCESSING_CODE_PURCHASE: &str = "000000";
pub const PROCESSING_CODE_REFUND: &str = "200000";
pub const POS_CARD_NOT_PRESENT: &str = "021";
pub const FUNCTION_CODE_AUTHORIZATION: &str = "100";
pub const FUNCTION_CODE_ECHO_TEST: &str = "831";
pub const POS_CONDITION_NORMAL: &str = "00";
pub const RESPONSE_APPROVED: &str = "00";
pub const RESPONSE_DO_NOT_HONOR: &str = "05";

/// Fields an acquirer echoes back from the request into its response.
const ECHOED_FIELDS: [u8; 8] = [2, 3, 4, 7, 11, 41, 42, 49];

/// Twelve zero-padded minor-unit digits.
pub fn format_amount(amount: MinorUnits) -> String {
    format!("{amount:012}")
}

/// ISO 4217 numeric code, `999` when unknown.
pub fn currency_numeric_code(currency: &str) -> &'static str {
    match currency {
        "USD" => "840",
        "EUR" => "978",
        "GBP" => "826",
        "JPY" => "392",
        "AUD" => "036",
        "CAD" => "124",
        "CNY" => "156",
        "INR" => "356",
        "BRL" => "986",
        "NGN" => "566",
        "KES" => "404",
        _ => "999",
    }
}

fn trace(trace_number: u32) -> String {
    format!("{:06}", trace_number % 1_000_000)
}

fn stamp(message: &mut WireMessage, at: DateTime<Utc>) {
    message.set_field(7, at.format("%m%d%H%M%S").to_string());
    message.set_field(12, at.format("%H%M%S").to_string());
    message.set_field(13, at.format("%m%d").to_string());
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardAuthorization<'a> {
    pub pan: &'a str,
    /// `YYMM`.
    pub expiry: &'a str,
    pub amount: MinorUnits,
    pub currency: &'a str,
    pub merchant_id: &'a str,
    pub terminal_id: &'a str,
    pub trace_number: u32,
    pub at: DateTime<Utc>,
    /// Pipe-joined 3-D Secure result, carried in field 48.
    pub three_ds: Option<&'a str>,
}

/// `0100` authorization request.
pub fn authorization_request(auth: &CardAuthorization<'_>) -> WireMessage {
    let mut message = WireMessage::new(Mti::authorization_request())
        .with_field(2, auth.pan)
        .with_field(3, PROCESSING_CODE_PURCHASE)
        .with_field(4, format_amount(auth.amount))
        .with_field(11, trace(auth.trace_number))
        .with_field(14, auth.expiry)
        .with_field(22, POS_CARD_NOT_PRESENT)
        .with_field(24, FUNCTION_CODE_AUTHORIZATION)
        .with_field(25, POS_CONDITION_NORMAL)
        .with_field(41, auth.terminal_id)
        .with_field(42, auth.merchant_id)
        .with_field(49, currency_numeric_code(auth.currency));
    stamp(&mut message, auth.at);
    if let Some(three_ds) = auth.three_ds {
        message.set_field(48, three_ds);
    }
    message
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refund<'a> {
    pub pan: &'a str,
    pub amount: MinorUnits,
    pub currency: &'a str,
    /// Retrieval reference of the original authorization.
    pub retrieval_reference: &'a str,
    pub merchant_id: &'a str,
    pub terminal_id: &'a str,
    pub trace_number: u32,
    pub at: DateTime<Utc>,
}

/// `0200` financial request with the refund processing code.
pub fn refund_request(refund: &Refund<'_>) -> WireMessage {
    let mut message = WireMessage::new(Mti::financial_request())
        .with_field(2, refund.pan)
        .with_field(3, PROCESSING_CODE_REFUND)
        .with_field(4, format_amount(refund.amount))
        .with_field(11, trace(refund.trace_number))
        .with_field(22, POS_CARD_NOT_PRESENT)
        .with_field(37, refund.retrieval_reference)
        .with_field(41, refund.terminal_id)
        .with_field(42, refund.merchant_id)
        .with_field(49, currency_numeric_code(refund.currency));
    stamp(&mut message, refund.at);
    message
}

/// `0800` echo test.
pub fn network_management_request(trace_number: u32, at: DateTime<Utc>) -> WireMessage {
    WireMessage::new(Mti::network_management_request())
        .with_field(7, at.format("%m%d%H%M%S").to_string())
        .with_field(11, trace(trace_number))
        .with_field(24, FUNCTION_CODE_ECHO_TEST)
}

/// `0110` answer to an authorization request, echoing its identifying fields.
pub fn authorization_response(
    request: &WireMessage,
    response_code: &str,
    authorization_code: Option<&str>,
    retrieval_reference: &str,
) -> Result<WireMessage, ProtocolError> {
    if request.mti() != &Mti::authorization_request() {
        return Err(ProtocolError::InvalidMti(request.mti().to_string()));
    }
    let mut response = WireMessage::new(Mti::authorization_response());
    for number in ECHOED_FIELDS {
        if let Some(value) = request.field(number) {
            response.set_field(number, value);
        }
    }
    response.set_field(37, retrieval_reference);
    if let Some(code) = authorization_code {
        response.set_field(38, code);
    }
    response.set_field(39, response_code);
    Ok(response)
}

/// The parts of a `0110` the card adapter cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationResponse {
    pub response_code: String,
    pub authorization_code: Option<String>,
    pub retrieval_reference: Option<String>,
    pub trace_number: Option<String>,
}

impl AuthorizationResponse {
    pub fn from_message(message: &WireMessage) -> Result<Self, ProtocolError> {
        if message.mti() != &Mti::authorization_response() {
            return Err(ProtocolError::InvalidMti(message.mti().to_string()));
        }
        let text = |number: u8| {
            message
                .field_str(number)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        Ok(Self {
            response_code: text(39).ok_or(ProtocolError::MissingField(39))?,
            authorization_code: text(38),
            retrieval_reference: text(37),
            trace_number: text(11),
        })
    }

    pub fn is_approved(&self) -> bool {
        self.response_code == RESPONSE_APPROVED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::iso8583::codec::MessageCodec;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 6).unwrap()
    }

    fn card() -> CardAuthorization<'static> {
        CardAuthorization {
            pan: "4111111111111111",
            expiry: "2712",
            amount: 10_050,
            currency: "EUR",
            merchant_id: "MERCHANT01",
            terminal_id: "T0000001",
            trace_number: 42,
            at: at(),
            three_ds: Some("Y|05|AAABBBCCC"),
        }
    }

    #[test]
    fn test_authorization_request_fields() {
        let message = authorization_request(&card());
        assert_eq!(message.mti(), &Mti::authorization_request());
        assert_eq!(message.field_str(3), Some("000000"));
        assert_eq!(message.field_str(4), Some("000000010050"));
        assert_eq!(message.field_str(7), Some("0309140506"));
        assert_eq!(message.field_str(11), Some("000042"));
        assert_eq!(message.field_str(12), Some("140506"));
        assert_eq!(message.field_str(13), Some("0309"));
        assert_eq!(message.field_str(24), Some("100"));
        assert_eq!(message.field_str(48), Some("Y|05|AAABBBCCC"));
        assert_eq!(message.field_str(49), Some("978"));
    }

    #[test]
    fn test_authorization_request_encodes() {
        let codec = MessageCodec::default();
        let message = authorization_request(&card());
        let bytes = codec.encode(&message).unwrap();
        assert!(bytes.starts_with(b"0100"));
        assert_eq!(codec.decode(&bytes).unwrap().field_str(42), Some("MERCHANT01     "));
    }

    #[test]
    fn test_refund_request_uses_refund_processing_code() {
        let message = refund_request(&Refund {
            pan: "4111111111111111",
            amount: 500,
            currency: "USD",
            retrieval_reference: "000000123456",
            merchant_id: "MERCHANT01",
            terminal_id: "T0000001",
            trace_number: 1_234_567,
            at: at(),
        });
        assert_eq!(message.mti(), &Mti::financial_request());
        assert_eq!(message.field_str(3), Some("200000"));
        assert_eq!(message.field_str(11), Some("234567"));
        assert!(MessageCodec::default().encode(&message).is_ok());
    }

    #[test]
    fn test_echo_test_message() {
        let message = network_management_request(7, at());
        assert_eq!(message.mti().as_str(), "0800");
        assert_eq!(message.field_str(24), Some("831"));
        assert!(MessageCodec::default().encode(&message).is_ok());
    }

    #[test]
    fn test_response_round_trip_through_codec() {
        let codec = MessageCodec::default();
        let request = authorization_request(&card());
        let response =
            authorization_response(&request, RESPONSE_APPROVED, Some("AB12CD"), "000000000042").unwrap();

        let decoded = codec.decode(&codec.encode(&response).unwrap()).unwrap();
        let parsed = AuthorizationResponse::from_message(&decoded).unwrap();
        assert!(parsed.is_approved());
        assert_eq!(parsed.authorization_code.as_deref(), Some("AB12CD"));
        assert_eq!(parsed.trace_number.as_deref(), Some("000042"));
        assert_eq!(decoded.field_str(4), Some("000000010050"));
    }

    #[test]
    fn test_response_requires_response_code() {
        let message = WireMessage::new(Mti::authorization_response()).with_field(38, "AB12CD");
        assert_eq!(
            AuthorizationResponse::from_message(&message),
            Err(ProtocolError::MissingField(39))
        );
    }

    #[test]
    fn test_response_to_non_authorization_is_refused() {
        let echo = network_management_request(1, at());
        assert!(matches!(
            authorization_response(&echo, RESPONSE_APPROVED, None, "000000000001"),
            Err(ProtocolError::InvalidMti(_))
        ));
    }

    #[test]
    fn test_currency_codes() {
        assert_eq!(currency_numeric_code("USD"), "840");
        assert_eq!(currency_numeric_code("AUD"), "036");
        assert_eq!(currency_numeric_code("XYZ"), "999");
    }
}
