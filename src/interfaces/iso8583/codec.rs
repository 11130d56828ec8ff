use super::field::{FieldSpec, FieldSpecTable, LengthEncoding};
use super::message::{Bitmap, Mti, WireMessage};
use crate::error::ProtocolError;
use std::sync::Arc;

/// Highest addressable field. There is no secondary bitmap, so fields 65 to 128
/// cannot be carried and field 1 (its indicator) is refused.
pub const MAX_FIELD: u8 = 64;
pub const MTI_LENGTH: usize = 4;

/// Encodes and decodes `MTI | bitmap | fields` messages against a shared
/// field table.
#[derive(Debug, Clone, Default)]
pub struct MessageCodec {
    specs: Arc<FieldSpecTable>,
}

impl MessageCodec {
    pub fn new(specs: Arc<FieldSpecTable>) -> Self {
        Self { specs }
    }

    pub fn specs(&self) -> &FieldSpecTable {
        &self.specs
    }

    pub fn encode(&self, message: &WireMessage) -> Result<Vec<u8>, ProtocolError> {
        let bitmap = message.bitmap()?;
        if bitmap.is_set(1) {
            return Err(ProtocolError::SecondaryBitmap);
        }

        let mut out = Vec::with_capacity(MTI_LENGTH + Bitmap::HEX_LENGTH + message.len() * 16);
        out.extend_from_slice(message.mti().as_bytes());
        out.extend_from_slice(bitmap.to_hex().as_bytes());
        for (number, value) in message.fields() {
            encode_field(&self.specs.get(number), value, &mut out)?;
        }
        Ok(out)
    }

    /// Decodes a whole message. Any defect fails the entire decode; there is
    /// no partial result.
    pub fn decode(&self, bytes: &[u8]) -> Result<WireMessage, ProtocolError> {
        let mut cursor = Cursor::new(bytes);
        let mti = Mti::from_bytes(cursor.take(MTI_LENGTH)?)?;
        let bitmap = Bitmap::from_hex(cursor.take(Bitmap::HEX_LENGTH)?)?;
        if bitmap.is_set(1) {
            return Err(ProtocolError::SecondaryBitmap);
        }

        let mut message = WireMessage::new(mti);
        for number in bitmap.fields() {
            let value = decode_field(&self.specs.get(number), &mut cursor)?;
            message.set_field(number, value);
        }

        match cursor.remaining() {
            0 => Ok(message),
            extra => Err(ProtocolError::TrailingData(extra)),
        }
    }
}

fn check_alphabet(spec: &FieldSpec, value: &[u8]) -> Result<(), ProtocolError> {
    if value.iter().all(|&b| spec.data_type.accepts(b)) {
        Ok(())
    } else {
        Err(ProtocolError::InvalidData {
            field: spec.number,
            data_type: spec.data_type.label(),
        })
    }
}

fn encode_field(spec: &FieldSpec, value: &[u8], out: &mut Vec<u8>) -> Result<(), ProtocolError> {
    let max = spec.effective_max();
    if value.len() > max {
        return Err(ProtocolError::FieldTooLong {
            field: spec.number,
            length: value.len(),
            max,
        });
    }
    check_alphabet(spec, value)?;

    match spec.length_encoding {
        LengthEncoding::Fixed => {
            let padding = std::iter::repeat_n(spec.data_type.pad_byte(), max - value.len());
            if spec.data_type.pads_left() {
                out.extend(padding);
                out.extend_from_slice(value);
            } else {
                out.extend_from_slice(value);
                out.extend(padding);
            }
        }
        LengthEncoding::LlVar => {
            out.extend_from_slice(format!("{:02}", value.len()).as_bytes());
            out.extend_from_slice(value);
        }
        LengthEncoding::LllVar => {
            out.extend_from_slice(format!("{:03}", value.len()).as_bytes());
            out.extend_from_slice(value);
        }
    }
    Ok(())
}

fn decode_field(spec: &FieldSpec, cursor: &mut Cursor<'_>) -> Result<Vec<u8>, ProtocolError> {
    let max = spec.effective_max();
    let length = match spec.length_encoding {
        LengthEncoding::Fixed => max,
        encoding => {
            let prefix = cursor.take(encoding.prefix_width())?;
            let length = parse_length(spec.number, prefix)?;
            if length > max {
                return Err(ProtocolError::FieldTooLong {
                    field: spec.number,
                    length,
                    max,
                });
            }
            length
        }
    };

    let value = cursor.take(length)?;
    check_alphabet(spec, value)?;
    Ok(value.to_vec())
}

fn parse_length(field: u8, prefix: &[u8]) -> Result<usize, ProtocolError> {
    let malformed = || ProtocolError::MalformedLength {
        field,
        prefix: String::from_utf8_lossy(prefix).into_owned(),
    };
    if !prefix.iter().all(u8::is_ascii_digit) {
        return Err(malformed());
    }
    Ok(prefix
        .iter()
        .fold(0usize, |acc, &digit| acc * 10 + usize::from(digit - b'0')))
}

struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], ProtocolError> {
        if count > self.remaining() {
            return Err(ProtocolError::Truncated {
                offset: self.offset,
                needed: count,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }
}
