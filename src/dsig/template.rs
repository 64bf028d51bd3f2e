use crate::dsig::{Error, Result};
use crate::xml::{Document, NodeId, c14n};

/// Built-in XMLDSig template for the service's signature profile
/// (exclusive c14n, RSA/SHA-1, issuer+serial key info). The element
/// layout is a contract with the service and must not be altered.
const SIGNATURE_TEMPLATE: &str = include_str!("templates/signature.xml");

/// A signature template with every writable field resolved to a typed
/// handle at construction time.
///
/// Binding up front means a structurally broken template is rejected
/// before any digesting starts, and the three signing phases never do a
/// path lookup of their own. A template value is single-use: the signer
/// consumes it, so one instance can never back two overlapping sign
/// calls.
pub struct SignatureTemplate {
    doc: Document,
    signed_info: NodeId,
    digest_value: NodeId,
    signature_value: NodeId,
    certificate: NodeId,
    issuer_name: NodeId,
    serial_number: NodeId,
}

impl SignatureTemplate {
    /// A fresh copy of the built-in template.
    pub fn standard() -> Result<Self> {
        Self::from_xml(SIGNATURE_TEMPLATE)
    }

    /// Parse a template and bind its field handles, failing with
    /// [`Error::MalformedSignatureTemplate`] naming the first missing
    /// field.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let doc = Document::parse(xml)?;
        let root = doc.root();
        let signed_info = field(&doc, root, "SignedInfo")?;
        let digest_value = field(&doc, root, "SignedInfo/Reference/DigestValue")?;
        let signature_value = field(&doc, root, "SignatureValue")?;
        let certificate = field(&doc, root, "KeyInfo/X509Data/X509Certificate")?;
        let issuer_name = field(&doc, root, "KeyInfo/X509Data/X509IssuerSerial/X509IssuerName")?;
        let serial_number = field(
            &doc,
            root,
            "KeyInfo/X509Data/X509IssuerSerial/X509SerialNumber",
        )?;

        Ok(Self {
            doc,
            signed_info,
            digest_value,
            signature_value,
            certificate,
            issuer_name,
            serial_number,
        })
    }

    /// Canonical bytes of the `SignedInfo` subtree in its current state.
    pub(crate) fn canonical_signed_info(&self) -> Result<String> {
        Ok(c14n::canonicalize(&self.doc, self.signed_info)?)
    }

    pub(crate) fn set_digest_value(&mut self, value: &str) {
        self.doc.set_text(self.digest_value, value);
    }

    pub(crate) fn set_signature_value(&mut self, value: &str) {
        self.doc.set_text(self.signature_value, value);
    }

    pub(crate) fn set_certificate(&mut self, value: &str) {
        self.doc.set_text(self.certificate, value);
    }

    pub(crate) fn set_issuer_name(&mut self, value: &str) {
        self.doc.set_text(self.issuer_name, value);
    }

    pub(crate) fn set_serial_number(&mut self, value: &str) {
        self.doc.set_text(self.serial_number, value);
    }

    /// Consume the template, yielding its document and the `Signature`
    /// root for adoption into the signed request.
    pub(crate) fn into_parts(self) -> (Document, NodeId) {
        let root = self.doc.root();
        (self.doc, root)
    }
}

fn field(doc: &Document, root: NodeId, path: &'static str) -> Result<NodeId> {
    doc.find(root, path)
        .ok_or(Error::MalformedSignatureTemplate(path))
}
