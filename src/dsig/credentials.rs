use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use x509_parser::objects::{oid2abbrev, oid_registry};
use x509_parser::prelude::*;

use crate::crypto::rsa::{self, RsaPrivateKey};
use crate::dsig::{Error, Result};

/// A signing credential set: exactly one X.509 certificate paired with
/// the RSA private key it was issued for.
///
/// Immutable once loaded and safe to share across concurrent sign calls.
/// The pairing is taken on faith: the service rejects mismatched
/// signatures itself, and the certificate's public key is deliberately
/// not compared against the private key here.
#[derive(Clone)]
pub struct Credentials {
    certificate: Certificate,
    key: RsaPrivateKey,
}

impl Credentials {
    /// Load from a DER-encoded certificate and a DER-encoded encrypted
    /// PKCS#8 private key, decrypted with `passphrase`. No partial state
    /// is retained on failure.
    pub fn from_der(cer_der: &[u8], key_der: &[u8], passphrase: &str) -> Result<Self> {
        let certificate = Certificate::from_der(cer_der)?;
        let key = RsaPrivateKey::from_encrypted_pkcs8_der(key_der, passphrase)
            .map_err(|e| Error::InvalidKeyOrPassphrase(e.to_string()))?;
        Ok(Self { certificate, key })
    }

    /// SHA-1 the data and sign the digest with RSA PKCS#1 v1.5. Returns
    /// the raw signature bytes; callers base64-encode where needed.
    pub fn sign_digest(&self, data: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        let signature = rsa::sign(&self.key, data)?;
        Ok(signature.into_bytes())
    }

    /// The certificate's DER encoding, base64-encoded.
    pub fn certificate_base64(&self) -> String {
        BASE64.encode(&self.certificate.raw)
    }

    /// The certificate's raw DER bytes.
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate.raw
    }

    /// Issuer distinguished name as comma-joined `key=value` pairs in
    /// certificate order, e.g. `C=MX,O=SAT`.
    pub fn issuer(&self) -> &str {
        &self.certificate.issuer
    }

    /// Certificate serial number as a base-10 string.
    pub fn serial_number(&self) -> &str {
        &self.certificate.serial_number
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("issuer", &self.certificate.issuer)
            .field("serial_number", &self.certificate.serial_number)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Parsed-once certificate metadata alongside the raw DER.
#[derive(Clone)]
struct Certificate {
    raw: Vec<u8>,
    issuer: String,
    serial_number: String,
}

impl Certificate {
    fn from_der(der: &[u8]) -> Result<Self> {
        let (rest, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::InvalidCertificate(e.to_string()))?;
        if !rest.is_empty() {
            return Err(Error::InvalidCertificate(
                "trailing data after certificate".into(),
            ));
        }

        let issuer = issuer_string(cert.issuer());
        let serial_number = cert.tbs_certificate.serial.to_string();

        Ok(Self {
            raw: der.to_vec(),
            issuer,
            serial_number,
        })
    }
}

/// Render a distinguished name the way the target service compares it:
/// `key=value` pairs joined with `,`, no spaces, no RFC 4514 escaping,
/// components in the order the certificate presents them.
fn issuer_string(name: &X509Name<'_>) -> String {
    let registry = oid_registry();
    name.iter_rdn()
        .flat_map(|rdn| rdn.iter())
        .map(|attr| {
            let key = match oid2abbrev(attr.attr_type(), registry) {
                Ok(abbrev) => abbrev.to_string(),
                Err(_) => attr.attr_type().to_id_string(),
            };
            let value = match attr.as_str() {
                Ok(value) => value.to_string(),
                Err(_) => String::from_utf8_lossy(attr.attr_value().data).into_owned(),
            };
            format!("{key}={value}")
        })
        .collect::<Vec<_>>()
        .join(",")
}
