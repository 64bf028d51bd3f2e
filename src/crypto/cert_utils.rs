use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::symm::Cipher;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Builder, X509Name, X509NameBuilder};

/// Helper to generate self-signed test identities in the same encoding
/// the real credential files use: a DER certificate plus a
/// passphrase-encrypted PKCS#8 DER key.
#[derive(Debug, Clone)]
pub struct TestIdentity {
    pub certificate_der: Vec<u8>,
    pub key_der: Vec<u8>,
}

/// Generate a self-signed RSA identity with the given issuer/subject name
/// entries and decimal serial number.
pub fn generate_identity(
    passphrase: &str,
    name_entries: &[(&str, &str)],
    serial: u64,
) -> TestIdentity {
    let rsa = Rsa::generate(2048).unwrap();
    let key_pair = PKey::from_rsa(rsa).unwrap();

    let mut cert_builder = X509Builder::new().unwrap();

    cert_builder.set_version(2).unwrap();
    cert_builder
        .set_serial_number(&serial_number(serial))
        .unwrap();

    let name = create_x509_name(name_entries).unwrap();
    cert_builder.set_subject_name(&name).unwrap();
    cert_builder.set_issuer_name(&name).unwrap();

    cert_builder.set_pubkey(&key_pair).unwrap();

    // Set validity period (1 year)
    let not_before = Asn1Time::days_from_now(0).unwrap();
    let not_after = Asn1Time::days_from_now(365).unwrap();
    cert_builder.set_not_before(&not_before).unwrap();
    cert_builder.set_not_after(&not_after).unwrap();

    cert_builder
        .append_extension(BasicConstraints::new().build().unwrap())
        .unwrap();

    cert_builder
        .append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .non_repudiation()
                .build()
                .unwrap(),
        )
        .unwrap();

    cert_builder
        .sign(&key_pair, MessageDigest::sha256())
        .unwrap();

    let certificate_der = cert_builder.build().to_der().unwrap();
    let key_der = key_pair
        .private_key_to_pkcs8_passphrase(Cipher::aes_256_cbc(), passphrase.as_bytes())
        .unwrap();

    TestIdentity {
        certificate_der,
        key_der,
    }
}

fn serial_number(serial: u64) -> Asn1Integer {
    let bn = BigNum::from_dec_str(&serial.to_string()).unwrap();
    bn.to_asn1_integer().unwrap()
}

fn create_x509_name(entries: &[(&str, &str)]) -> Result<X509Name, openssl::error::ErrorStack> {
    let mut name_builder = X509NameBuilder::new()?;
    for (key, value) in entries {
        name_builder.append_entry_by_text(key, value)?;
    }
    Ok(name_builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::x509::X509;

    #[test]
    fn test_generated_identity_parses() {
        let identity = generate_identity("secret", &[("C", "MX"), ("O", "Test")], 7);

        let cert = X509::from_der(&identity.certificate_der);
        assert!(cert.is_ok());

        let key = PKey::private_key_from_pkcs8_passphrase(&identity.key_der, b"secret");
        assert!(key.is_ok());
    }
}
