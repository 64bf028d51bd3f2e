pub mod cert_utils;
mod errors;
pub mod rsa;

pub use errors::Error;

use errors::CryptoResult;
use openssl::hash::{MessageDigest, hash};

/// SHA-1 digest of the given data.
///
/// The target service's signature profile is fixed to SHA-1; no other
/// digest algorithm is exposed.
pub fn sha1(data: impl AsRef<[u8]>) -> CryptoResult<Vec<u8>> {
    Ok(hash(MessageDigest::sha1(), data.as_ref())?.to_vec())
}
