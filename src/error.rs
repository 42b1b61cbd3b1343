//! use devcert::error::DevCertError;

use thiserror::Error;

/// Represents errors that can occur while issuing device certificates.
///
/// Every failure is surfaced to the caller; issuance never retries internally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DevCertError {
    /// The CSR self-signature does not verify against its embedded public key.
    #[error("CSR signature verification failed: {0}")]
    InvalidSignature(String),

    /// The CSR bytes could not be decoded.
    #[error("Malformed certificate request: {0}")]
    MalformedRequest(String),

    /// A certificate lacks an extension the issuer requires.
    #[error("Missing extension: {0}")]
    MissingExtension(String),

    /// An argument is outside its accepted range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A post-issuance sanity check failed. Not retryable.
    #[error("Internal invariant violated: {0}")]
    InternalInvariantViolation(String),

    /// Key material could not be parsed or is of an unsupported type.
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// An encrypted private key could not be decrypted with the given passphrase.
    #[error("Wrong passphrase for encrypted private key")]
    WrongPassphrase,

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    EncodingError(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    DecodingError(String),
}

impl From<der::Error> for DevCertError {
    /// Converts a `der::Error` into a `DevCertError`.
    fn from(err: der::Error) -> Self {
        DevCertError::DecodingError(err.to_string())
    }
}

impl From<rsa::Error> for DevCertError {
    fn from(err: rsa::Error) -> Self {
        DevCertError::InvalidKeyMaterial(err.to_string())
    }
}

impl From<pem::PemError> for DevCertError {
    fn from(err: pem::PemError) -> Self {
        DevCertError::DecodingError(err.to_string())
    }
}
