use thiserror::Error;

/// Failures raised while decoding a key attestation extension.
#[derive(Debug, Clone, PartialEq, Eq, Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum AttestationError {
    /// The DER structure does not have the expected shape.
    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),

    /// A node decoded to the wrong ASN.1 type for its role.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The certificate does not carry the key attestation extension.
    #[error("Certificate issued by '{issuer}' carries no attestation extension")]
    NotAttested { issuer: String },

    /// The certificate carries both the ASN.1 and the EAT attestation extension.
    #[error("Multiple attestation extensions found")]
    ConflictingExtensions,

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AttestationError>;
