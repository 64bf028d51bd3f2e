use std::fmt;

use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private, Public};
use openssl::sign::{Signer, Verifier};

use crate::crypto::errors::{CryptoResult, Error};

/// RSA private key wrapper
#[derive(Clone)]
pub struct RsaPrivateKey {
    key: PKey<Private>,
}

impl RsaPrivateKey {
    /// Load from DER-encoded, passphrase-encrypted PKCS#8. This is the
    /// format credential key files are distributed in.
    pub fn from_encrypted_pkcs8_der(
        der_bytes: impl AsRef<[u8]>,
        passphrase: &str,
    ) -> CryptoResult<Self> {
        let key =
            PKey::private_key_from_pkcs8_passphrase(der_bytes.as_ref(), passphrase.as_bytes())?;
        Self::from_pkey(key)
    }

    fn from_pkey(key: PKey<Private>) -> CryptoResult<Self> {
        if key.rsa().is_err() {
            return Err(Error::Invalid("not an RSA private key".into()));
        }
        Ok(Self { key })
    }

    /// Get the corresponding public key
    pub fn public_key(&self) -> CryptoResult<RsaPublicKey> {
        let key = PKey::public_key_from_der(&self.key.public_key_to_der()?)?;
        Ok(RsaPublicKey { key })
    }

    /// Get the underlying OpenSSL private key
    pub(crate) fn pkey(&self) -> &PKey<Private> {
        &self.key
    }
}

impl fmt::Debug for RsaPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaPrivateKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// RSA public key wrapper
#[derive(Debug, Clone)]
pub struct RsaPublicKey {
    key: PKey<Public>,
}

impl RsaPublicKey {
    /// Import from SubjectPublicKeyInfo DER, e.g. a certificate's
    /// `subject_pki` bytes.
    pub fn from_der(der_bytes: impl AsRef<[u8]>) -> CryptoResult<Self> {
        let key = PKey::public_key_from_der(der_bytes.as_ref())?;
        Ok(Self { key })
    }

    pub(crate) fn pkey(&self) -> &PKey<Public> {
        &self.key
    }
}

/// Raw RSA signature bytes
#[derive(Clone)]
pub struct RsaSignature {
    data: Vec<u8>,
}

impl RsaSignature {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for RsaSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaSignature")
            .field("size", &self.len())
            .field("hex", &self.to_hex())
            .finish()
    }
}

/// Sign data with RSA PKCS#1 v1.5 over a SHA-1 digest, the only scheme
/// the target service accepts.
pub fn sign(private_key: &RsaPrivateKey, data: impl AsRef<[u8]>) -> CryptoResult<RsaSignature> {
    let mut signer = Signer::new(MessageDigest::sha1(), private_key.pkey())?;
    let signature = signer.sign_oneshot_to_vec(data.as_ref())?;
    Ok(RsaSignature::new(signature))
}

/// Verify an RSA PKCS#1 v1.5 / SHA-1 signature
pub fn verify(
    public_key: &RsaPublicKey,
    data: impl AsRef<[u8]>,
    signature: &RsaSignature,
) -> CryptoResult<bool> {
    let mut verifier = Verifier::new(MessageDigest::sha1(), public_key.pkey())?;
    Ok(verifier.verify_oneshot(signature.as_bytes(), data.as_ref())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::rsa::Rsa;

    fn generate_key() -> RsaPrivateKey {
        let rsa = Rsa::generate(2048).unwrap();
        RsaPrivateKey::from_pkey(PKey::from_rsa(rsa).unwrap()).unwrap()
    }

    #[test]
    fn test_sign_verify() {
        let private_key = generate_key();
        let public_key = private_key.public_key().unwrap();
        let data = b"test data";

        let signature = sign(&private_key, data).unwrap();
        assert_eq!(signature.len(), 256);
        assert!(verify(&public_key, data, &signature).unwrap());
        assert!(!verify(&public_key, b"wrong data", &signature).unwrap());
    }

    #[test]
    fn test_cross_key_verification_fails() {
        let key1 = generate_key();
        let key2 = generate_key();
        let data = b"test data";

        let signature = sign(&key1, data).unwrap();
        let is_valid = verify(&key2.public_key().unwrap(), data, &signature).unwrap();
        assert!(!is_valid);
    }

    #[test]
    fn test_encrypted_key_roundtrip() {
        use openssl::symm::Cipher;

        let rsa = Rsa::generate(2048).unwrap();
        let pkey = PKey::from_rsa(rsa).unwrap();
        let der = pkey
            .private_key_to_pkcs8_passphrase(Cipher::aes_256_cbc(), b"secret")
            .unwrap();

        let loaded = RsaPrivateKey::from_encrypted_pkcs8_der(&der, "secret").unwrap();
        let signature = sign(&loaded, b"payload").unwrap();
        assert!(verify(&loaded.public_key().unwrap(), b"payload", &signature).unwrap());

        assert!(RsaPrivateKey::from_encrypted_pkcs8_der(&der, "wrong").is_err());
    }

    #[test]
    fn test_signature_debug_format() {
        let signature = RsaSignature::new(vec![0xab, 0xcd]);
        let debug_str = format!("{signature:?}");
        assert!(debug_str.contains("RsaSignature"));
        assert!(debug_str.contains("abcd"));
    }
}
