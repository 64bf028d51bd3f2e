mod credentials;
mod error;
mod signer;
mod template;

pub use credentials::Credentials;
pub use error::Error;
pub use signer::Signer;
pub use template::SignatureTemplate;

pub type Result<T> = std::result::Result<T, Error>;

// Algorithm URIs for the service's signature profile
pub mod algorithms {
    // Digest algorithm
    pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";

    // Signature algorithm
    pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";

    // Canonicalization algorithm
    pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
}

// Namespaces
pub mod ns {
    pub const DS: &str = "http://www.w3.org/2000/09/xmldsig#";
}
