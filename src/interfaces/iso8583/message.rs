use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Message Type Indicator: four ASCII digits classifying the message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mti(String);

impl Mti {
    pub fn new(value: &str) -> Result<Self, ProtocolError> {
        Self::from_bytes(value.as_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() != 4 || !bytes.iter().all(u8::is_ascii_digit) {
            return Err(ProtocolError::InvalidMti(
                String::from_utf8_lossy(bytes).into_owned(),
            ));
        }
        // Digits only, so this is valid UTF-8.
        Ok(Self(bytes.iter().map(|&b| b as char).collect()))
    }

    pub fn authorization_request() -> Self {
        Self("0100".to_string())
    }

    pub fn authorization_response() -> Self {
        Self("0110".to_string())
    }

    pub fn financial_request() -> Self {
        Self("0200".to_string())
    }

    pub fn network_management_request() -> Self {
        Self("0800".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl TryFrom<String> for Mti {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Mti> for String {
    fn from(mti: Mti) -> Self {
        mti.0
    }
}

impl fmt::Display for Mti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 64-bit primary bitmap. Field `n` maps to bit `n - 1`, counted from the most
/// significant bit, so field 1 is the leading bit of the first hex digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bitmap(u64);

impl Bitmap {
    pub const HEX_LENGTH: usize = 16;

    fn mask(field: u8) -> u64 {
        1u64 << (64 - u32::from(field))
    }

    pub fn from_fields(fields: impl IntoIterator<Item = u8>) -> Result<Self, ProtocolError> {
        let mut bitmap = Self::default();
        for field in fields {
            bitmap.set(field)?;
        }
        Ok(bitmap)
    }

    pub fn set(&mut self, field: u8) -> Result<(), ProtocolError> {
        if !(1..=64).contains(&field) {
            return Err(ProtocolError::FieldOutOfRange(field));
        }
        self.0 |= Self::mask(field);
        Ok(())
    }

    pub fn is_set(&self, field: u8) -> bool {
        (1..=64).contains(&field) && self.0 & Self::mask(field) != 0
    }

    /// Present field numbers in ascending order.
    pub fn fields(&self) -> impl Iterator<Item = u8> + '_ {
        (1..=64u8).filter(|&field| self.is_set(field))
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    pub fn to_hex(&self) -> String {
        format!("{:016X}", self.0)
    }

    pub fn from_hex(hex: &[u8]) -> Result<Self, ProtocolError> {
        let invalid = || ProtocolError::InvalidBitmap(String::from_utf8_lossy(hex).into_owned());
        if hex.len() != Self::HEX_LENGTH || !hex.iter().all(u8::is_ascii_hexdigit) {
            return Err(invalid());
        }
        let text = std::str::from_utf8(hex).map_err(|_| invalid())?;
        u64::from_str_radix(text, 16).map(Self).map_err(|_| invalid())
    }
}

/// A message as it appears on the wire: MTI plus the present fields, keyed
/// and iterated in ascending field-number order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    mti: Mti,
    fields: BTreeMap<u8, Vec<u8>>,
}

impl WireMessage {
    pub fn new(mti: Mti) -> Self {
        Self {
            mti,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, number: u8, value: impl Into<Vec<u8>>) -> Self {
        self.set_field(number, value);
        self
    }

    pub fn set_field(&mut self, number: u8, value: impl Into<Vec<u8>>) {
        self.fields.insert(number, value.into());
    }

    pub fn mti(&self) -> &Mti {
        &self.mti
    }

    pub fn field(&self, number: u8) -> Option<&[u8]> {
        self.fields.get(&number).map(Vec::as_slice)
    }

    /// Field as text, `None` when absent or not UTF-8.
    pub fn field_str(&self, number: u8) -> Option<&str> {
        self.field(number)
            .and_then(|value| std::str::from_utf8(value).ok())
    }

    pub fn fields(&self) -> impl Iterator<Item = (u8, &[u8])> {
        self.fields
            .iter()
            .map(|(&number, value)| (number, value.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn bitmap(&self) -> Result<Bitmap, ProtocolError> {
        Bitmap::from_fields(self.fields.keys().copied())
    }
}
