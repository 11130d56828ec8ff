//! ISO 8583-style wire messages: `MTI | bitmap | fields`, all ASCII.

pub mod builder;
pub mod codec;
pub mod field;
pub mod message;

pub use codec::MessageCodec;
pub use field::{DataType, FieldSpec, FieldSpecTable, LengthEncoding};
pub use message::{Bitmap, Mti, WireMessage};
