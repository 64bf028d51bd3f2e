pub mod c14n;
mod document;

pub use document::{Document, NodeId, local_name};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing, navigating or canonicalizing documents.
#[derive(Debug, Error)]
pub enum Error {
    #[error("XML parse error: {0}")]
    Parse(String),

    #[error("node is not an element")]
    NotAnElement,

    #[error("namespace prefix '{0}' is not bound in scope")]
    UnboundPrefix(String),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Parse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Parse(err.to_string())
    }
}
