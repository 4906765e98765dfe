//! Error types for the QR-to-proof pipeline

use thiserror::Error;

/// Result type alias for prover operations
pub type Result<T> = std::result::Result<T, ProverError>;

/// Everything that can go wrong between a scanned QR payload and a verified proof.
#[derive(Error, Debug)]
pub enum ProverError {
    /// QR payload is not a decimal number
    #[error("Invalid QR payload: {0}")]
    InvalidQrPayload(String),

    /// Neither gzip nor zlib could inflate the payload
    #[error("Failed to decompress QR payload: {0}")]
    Decompression(String),

    /// Decompressed payload cannot hold a trailing RSA signature
    #[error("QR payload too short: {len} bytes, need more than {signature_len}")]
    PayloadTooShort { len: usize, signature_len: usize },

    /// Signature over the signed region did not verify
    #[error("Signature verification failed: {0}")]
    SignatureVerificationFailed(String),

    /// Certificate could not be parsed
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Certificate does not carry an RSA public key
    #[error("Unsupported public key: {0}")]
    UnsupportedPublicKey(String),

    /// Signed data does not fit the circuit's fixed buffer
    #[error("Signed data is {len} bytes, circuit buffer holds at most {max}")]
    SignedDataTooLarge { len: usize, max: usize },

    /// Fewer delimiter bytes than the circuit expects
    #[error("Found {found} delimiters in signed data, circuit expects {expected}")]
    MissingDelimiters { found: usize, expected: usize },

    /// Compiled circuit artifact is missing or malformed
    #[error("Circuit artifact error: {0}")]
    Circuit(String),

    /// Built input does not line up with the circuit ABI
    #[error("Circuit input mismatch: {0}")]
    InputMismatch(String),

    /// Proving or verification backend failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Proof object cannot be handed to the backend
    #[error("Malformed proof: {0}")]
    MalformedProof(String),

    /// Proof was generated against another circuit build
    #[error("Proof was generated with circuit {proof_version}, verifier has {circuit_version}")]
    CircuitVersionMismatch {
        proof_version: String,
        circuit_version: String,
    },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Blocking proving task failed to complete
    #[error("Proving task failed: {0}")]
    Task(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rsa::Error> for ProverError {
    fn from(err: rsa::Error) -> Self {
        ProverError::SignatureVerificationFailed(err.to_string())
    }
}

impl From<x509_parser::error::X509Error> for ProverError {
    fn from(err: x509_parser::error::X509Error) -> Self {
        ProverError::InvalidCertificate(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ProverError {
    fn from(err: tokio::task::JoinError) -> Self {
        ProverError::Task(err.to_string())
    }
}
