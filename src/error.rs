use thiserror::Error;

/// Failures of the wire codec. Always fatal to the message being processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid MTI {0:?}: expected 4 ASCII digits")]
    InvalidMti(String),
    #[error("message truncated: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("invalid bitmap {0:?}: expected 16 hexadecimal characters")]
    InvalidBitmap(String),
    #[error("field {0} is outside the addressable range 2..=64")]
    FieldOutOfRange(u8),
    #[error("secondary bitmap is not supported")]
    SecondaryBitmap,
    #[error("field {field}: malformed length prefix {prefix:?}")]
    MalformedLength { field: u8, prefix: String },
    #[error("field {field}: length {length} exceeds maximum {max}")]
    FieldTooLong { field: u8, length: usize, max: usize },
    #[error("field {field}: value does not match data type {data_type}")]
    InvalidData { field: u8, data_type: &'static str },
    #[error("{0} trailing bytes after the last field")]
    TrailingData(usize),
    #[error("required field {0} is missing")]
    MissingField(u8),
}

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Protocol error: {0}")]
    ProtocolError(#[from] ProtocolError),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Fraud rejected: {0}")]
    FraudRejected(String),
    #[error("Processor error [{code}]: {message}")]
    ProcessorError { code: String, message: String },
    #[error("Settlement error: {0}")]
    SettlementError(String),
    #[error("System error: {0}")]
    SystemError(String),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
}

pub type Result<T> = std::result::Result<T, PaymentError>;
