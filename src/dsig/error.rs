use thiserror::Error;

/// Signing failures. Every variant is terminal for the operation that
/// raised it; nothing in this subsystem retries or falls back to an
/// unsigned request.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("invalid private key or wrong passphrase: {0}")]
    InvalidKeyOrPassphrase(String),

    #[error("signing failed: {0}")]
    SigningFailure(#[from] crate::crypto::Error),

    #[error("element to be signed has no parent")]
    MissingParentElement,

    #[error("signature template is missing '{0}'")]
    MalformedSignatureTemplate(&'static str),

    #[error("XML processing error: {0}")]
    Xml(#[from] crate::xml::Error),
}
