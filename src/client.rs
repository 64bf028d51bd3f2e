//! SOAP request layer for the bulk-download web services.
//!
//! Thin plumbing around the signing core: binds request arguments into an
//! envelope template, signs the request element, posts the canonical
//! envelope and extracts the operation result.

mod download;

pub use download::{DownloadRequest, DownloadRequested, RequestType};

use std::time::Duration;

use reqwest::header::{
    ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue,
};
use tracing::debug;

use crate::config::ServiceConfig;
use crate::dsig::{self, Credentials, Signer};
use crate::xml::{self, Document, c14n};

pub type Result<T> = std::result::Result<T, Error>;

const FAULT_PATH: &str = "Body/Fault/faultstring";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML processing error: {0}")]
    Xml(#[from] xml::Error),

    #[error("signature error: {0}")]
    Signature(#[from] dsig::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid authorization token")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),

    #[error("request template is missing '{0}'")]
    Template(&'static str),

    #[error("service fault: {0}")]
    Fault(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// A fixed web-service operation: endpoint, action and envelope shape.
struct Operation {
    url: &'static str,
    action: &'static str,
    template: &'static str,
    request_path: &'static str,
    result_path: &'static str,
}

/// Client for the bulk-download web services. Owns the HTTP client and
/// the signing credentials; one value serves any number of requests.
pub struct Client {
    http: reqwest::Client,
    signer: Signer,
}

impl Client {
    pub fn new(credentials: Credentials, config: &ServiceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;
        Ok(Self {
            http,
            signer: Signer::new(credentials),
        })
    }

    /// Bind arguments into the operation's envelope template, sign the
    /// request element and serialize the canonical envelope.
    fn assemble(
        &self,
        operation: &Operation,
        attributes: &[(&'static str, String)],
        receiver_rfc: Option<&str>,
    ) -> Result<String> {
        let mut doc = Document::parse(operation.template)?;
        let root = doc.root();
        let request = doc
            .find(root, operation.request_path)
            .ok_or(Error::Template(operation.request_path))?;

        for (name, value) in attributes {
            doc.set_attribute(request, name, value);
        }
        if let Some(rfc) = receiver_rfc {
            let receptor = doc
                .find(request, "RfcReceptores/RfcReceptor")
                .ok_or(Error::Template("RfcReceptores/RfcReceptor"))?;
            doc.set_text(receptor, rfc);
        }

        self.signer.sign(&mut doc, request)?;
        Ok(c14n::canonicalize(&doc, root)?)
    }

    /// Post a signed request and parse the response, surfacing
    /// `faultstring` on non-success statuses.
    async fn call(
        &self,
        operation: &Operation,
        token: Option<&str>,
        attributes: &[(&'static str, String)],
        receiver_rfc: Option<&str>,
    ) -> Result<Document> {
        let body = self.assemble(operation, attributes, receiver_rfc)?;
        let headers = build_headers(operation.action, token)?;

        debug!(url = operation.url, action = operation.action, "service request");
        debug!(?headers);
        debug!(payload = %body);

        let response = self
            .http
            .post(operation.url)
            .headers(headers)
            .body(body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        debug!(status = %status, response = %text);

        let doc = Document::parse(&text)
            .map_err(|e| Error::UnexpectedResponse(format!("unparseable body: {e}")))?;

        if !status.is_success() {
            let fault = doc
                .find(doc.root(), FAULT_PATH)
                .and_then(|node| doc.text(node))
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP status {status}"));
            return Err(Error::Fault(fault));
        }
        Ok(doc)
    }
}

fn build_headers(action: &'static str, token: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/xml;charset=\"utf-8\""),
    );
    headers.insert(ACCEPT, HeaderValue::from_static("text/xml"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        HeaderName::from_static("soapaction"),
        HeaderValue::from_static(action),
    );
    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("WRAP access_token=\"{token}\""))?;
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}
