use base64::{Engine, engine::general_purpose::STANDARD as BASE64};

use crate::crypto;
use crate::dsig::{Credentials, Error, Result, SignatureTemplate};
use crate::xml::{Document, NodeId, c14n};

/// Builds signature blocks over request elements and splices them into
/// the document.
pub struct Signer {
    credentials: Credentials,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Sign `target` using a fresh copy of the built-in template and
    /// append the signature block as its last child. Returns the id of
    /// the appended `Signature` element.
    pub fn sign(&self, doc: &mut Document, target: NodeId) -> Result<NodeId> {
        let template = SignatureTemplate::standard()?;
        self.sign_with_template(doc, target, template)
    }

    /// Sign `target`, consuming `template`.
    ///
    /// The reference digest covers the canonical form of the target's
    /// *parent*, computed before the signature block is attached.
    /// Attaching first would change the parent's canonical bytes and
    /// void the digest, so the three phases below must stay in order.
    pub fn sign_with_template(
        &self,
        doc: &mut Document,
        target: NodeId,
        mut template: SignatureTemplate,
    ) -> Result<NodeId> {
        let parent = doc.parent(target).ok_or(Error::MissingParentElement)?;

        // Digest phase
        let parent_c14n = c14n::canonicalize(doc, parent)?;
        let digest = crypto::sha1(parent_c14n.as_bytes())?;
        template.set_digest_value(&BASE64.encode(&digest));

        // Sign phase, over SignedInfo with the digest in place
        let signed_info_c14n = template.canonical_signed_info()?;
        let signature = self.credentials.sign_digest(signed_info_c14n.as_bytes())?;
        template.set_signature_value(&BASE64.encode(&signature));

        // Key-info phase
        template.set_certificate(&self.credentials.certificate_base64());
        template.set_issuer_name(self.credentials.issuer());
        template.set_serial_number(self.credentials.serial_number());

        let (signature_doc, signature_root) = template.into_parts();
        Ok(doc.adopt(target, &signature_doc, signature_root))
    }
}
