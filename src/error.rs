use crate::digits::Constant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscryptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Hex decoding error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error(
        "Digit range out of bounds for {constant}: start {start} + length {length} exceeds {available} available digits"
    )]
    OutOfRange {
        constant: Constant,
        start: u64,
        length: u64,
        available: u64,
    },

    #[error("Pattern not found: {found} of {required} matches within {searched} stream positions")]
    PatternNotFound {
        found: usize,
        required: usize,
        searched: u64,
    },

    #[error("Verification failed: private key does not correspond to public key")]
    VerificationMismatch,

    #[error("Invalid digit file {path}: {reason}")]
    InvalidDigitFile { path: String, reason: String },

    #[error("No digit source loaded for {0}")]
    SourceMissing(Constant),

    #[error("Invalid stream recipe: {0}")]
    InvalidRecipe(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid match sequence: {0}")]
    InvalidMatches(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Data integrity error: {0}")]
    IntegrityError(String),
}

pub type Result<T> = std::result::Result<T, TranscryptError>;
