use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Character class a field's payload must belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// `n`: decimal digits.
    Numeric,
    /// `an`: letters, digits and space.
    AlphaNumeric,
    /// `ans`: any printable ASCII.
    AlphaNumericSpecial,
    /// `b`: opaque bytes.
    Binary,
}

impl DataType {
    pub fn label(&self) -> &'static str {
        match self {
            DataType::Numeric => "n",
            DataType::AlphaNumeric => "an",
            DataType::AlphaNumericSpecial => "ans",
            DataType::Binary => "b",
        }
    }

    pub fn accepts(&self, byte: u8) -> bool {
        match self {
            DataType::Numeric => byte.is_ascii_digit(),
            DataType::AlphaNumeric => byte.is_ascii_alphanumeric() || byte == b' ',
            DataType::AlphaNumericSpecial => (0x20..=0x7E).contains(&byte),
            DataType::Binary => true,
        }
    }

    /// Filler used to bring a short value up to a fixed width.
    pub(crate) fn pad_byte(&self) -> u8 {
        match self {
            DataType::Numeric => b'0',
            DataType::Binary => 0x00,
            DataType::AlphaNumeric | DataType::AlphaNumericSpecial => b' ',
        }
    }

    /// Numbers are right-aligned, text is left-aligned.
    pub(crate) fn pads_left(&self) -> bool {
        matches!(self, DataType::Numeric)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthEncoding {
    Fixed,
    /// 2-digit decimal length prefix.
    LlVar,
    /// 3-digit decimal length prefix.
    LllVar,
}

impl LengthEncoding {
    /// Width of the decimal length prefix.
    pub fn prefix_width(&self) -> usize {
        match self {
            LengthEncoding::Fixed => 0,
            LengthEncoding::LlVar => 2,
            LengthEncoding::LllVar => 3,
        }
    }

    /// Largest length the prefix can express.
    pub fn ceiling(&self) -> usize {
        match self {
            LengthEncoding::Fixed => usize::MAX,
            LengthEncoding::LlVar => 99,
            LengthEncoding::LllVar => 999,
        }
    }
}

/// Format of one numbered field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub number: u8,
    pub data_type: DataType,
    pub max_length: usize,
    pub length_encoding: LengthEncoding,
}

impl FieldSpec {
    pub const fn fixed(number: u8, data_type: DataType, length: usize) -> Self {
        Self {
            number,
            data_type,
            max_length: length,
            length_encoding: LengthEncoding::Fixed,
        }
    }

    pub const fn llvar(number: u8, data_type: DataType, max_length: usize) -> Self {
        Self {
            number,
            data_type,
            max_length,
            length_encoding: LengthEncoding::LlVar,
        }
    }

    pub const fn lllvar(number: u8, data_type: DataType, max_length: usize) -> Self {
        Self {
            number,
            data_type,
            max_length,
            length_encoding: LengthEncoding::LllVar,
        }
    }

    /// Effective upper bound: the declared maximum, capped by what the prefix can carry.
    pub fn effective_max(&self) -> usize {
        self.max_length.min(self.length_encoding.ceiling())
    }
}

/// Immutable lookup of field formats, built once and shared behind an `Arc`.
///
/// Fields without an explicit entry are treated as `ans` LLLVAR up to 999 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpecTable {
    specs: BTreeMap<u8, FieldSpec>,
}

impl FieldSpecTable {
    pub fn from_specs(specs: impl IntoIterator<Item = FieldSpec>) -> Self {
        Self {
            specs: specs.into_iter().map(|spec| (spec.number, spec)).collect(),
        }
    }

    pub fn get(&self, number: u8) -> FieldSpec {
        self.specs
            .get(&number)
            .copied()
            .unwrap_or_else(|| FieldSpec::lllvar(number, DataType::AlphaNumericSpecial, 999))
    }

    pub fn is_declared(&self, number: u8) -> bool {
        self.specs.contains_key(&number)
    }
}

impl Default for FieldSpecTable {
    fn default() -> Self {
        use DataType::*;
        Self::from_specs([
            FieldSpec::llvar(2, Numeric, 19),               // primary account number
            FieldSpec::fixed(3, Numeric, 6),                // processing code
            FieldSpec::fixed(4, Numeric, 12),               // amount, minor units
            FieldSpec::fixed(7, Numeric, 10),               // transmission MMDDhhmmss
            FieldSpec::fixed(11, Numeric, 6),               // system trace audit number
            FieldSpec::fixed(12, Numeric, 6),               // local time hhmmss
            FieldSpec::fixed(13, Numeric, 4),               // local date MMDD
            FieldSpec::fixed(14, Numeric, 4),               // expiry YYMM
            FieldSpec::fixed(18, Numeric, 4),               // merchant category
            FieldSpec::fixed(22, Numeric, 3),               // POS entry mode
            FieldSpec::fixed(24, Numeric, 3),               // function code
            FieldSpec::fixed(25, Numeric, 2),               // POS condition code
            FieldSpec::llvar(32, Numeric, 11),              // acquiring institution id
            FieldSpec::fixed(37, AlphaNumeric, 12),         // retrieval reference
            FieldSpec::fixed(38, AlphaNumeric, 6),          // authorization code
            FieldSpec::fixed(39, AlphaNumeric, 2),          // response code
            FieldSpec::fixed(41, AlphaNumericSpecial, 8),   // terminal id
            FieldSpec::fixed(42, AlphaNumericSpecial, 15),  // card acceptor id
            FieldSpec::fixed(43, AlphaNumericSpecial, 40),  // card acceptor name/location
            FieldSpec::lllvar(48, AlphaNumericSpecial, 999), // additional data
            FieldSpec::fixed(49, Numeric, 3),               // currency code
        ])
    }
}
