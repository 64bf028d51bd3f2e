use chrono::{NaiveDate, NaiveTime};
use tracing::debug;

use super::{Client, Error, Operation, Result};
use crate::xml::Document;

const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const SOLICITA_DESCARGA: Operation = Operation {
    url: "https://cfdidescargamasivasolicitud.clouda.sat.gob.mx/SolicitaDescargaService.svc",
    action: "http://DescargaMasivaTerceros.sat.gob.mx/ISolicitaDescargaService/SolicitaDescarga",
    template: include_str!("templates/solicita_descarga.xml"),
    request_path: "Body/SolicitaDescarga/solicitud",
    result_path: "Body/SolicitaDescargaResponse/SolicitaDescargaResult",
};

/// Kind of artifacts requested for download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestType {
    #[default]
    Cfdi,
    Metadata,
}

impl RequestType {
    fn as_str(self) -> &'static str {
        match self {
            RequestType::Cfdi => "CFDI",
            RequestType::Metadata => "Metadata",
        }
    }
}

/// Parameters for a bulk download request.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub requester_rfc: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub request_type: RequestType,
    pub issuer_rfc: Option<String>,
    pub receiver_rfc: Option<String>,
    pub voucher_type: Option<String>,
    pub voucher_status: Option<String>,
    pub third_party_rfc: Option<String>,
    pub complement: Option<String>,
    pub uuid: Option<String>,
}

impl DownloadRequest {
    pub fn new(requester_rfc: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            requester_rfc: requester_rfc.into(),
            start_date,
            end_date,
            request_type: RequestType::default(),
            issuer_rfc: None,
            receiver_rfc: None,
            voucher_type: None,
            voucher_status: None,
            third_party_rfc: None,
            complement: None,
            uuid: None,
        }
    }

    /// Attributes bound onto the request element; unset options are
    /// skipped entirely rather than sent empty.
    fn attributes(&self) -> Vec<(&'static str, String)> {
        let mut attrs = vec![
            ("RfcSolicitante", self.requester_rfc.clone()),
            ("FechaFinal", format_date(self.end_date)),
            ("FechaInicial", format_date(self.start_date)),
            ("TipoSolicitud", self.request_type.as_str().to_string()),
        ];
        let optional = [
            ("TipoComprobante", &self.voucher_type),
            ("EstadoComprobante", &self.voucher_status),
            ("RfcACuentaTerceros", &self.third_party_rfc),
            ("Complemento", &self.complement),
            ("UUID", &self.uuid),
            ("RfcEmisor", &self.issuer_rfc),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                attrs.push((name, value.clone()));
            }
        }
        attrs
    }
}

fn format_date(date: NaiveDate) -> String {
    date.and_time(NaiveTime::MIN)
        .format(DATE_TIME_FORMAT)
        .to_string()
}

/// Outcome of a download request as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequested {
    /// `IdSolicitud`: identifier to poll for the download package
    pub request_id: Option<String>,
    /// `CodEstatus`: service status code
    pub status_code: Option<String>,
    /// `Mensaje`: human-readable status message
    pub message: Option<String>,
}

impl Client {
    /// Assemble and sign a download request envelope without sending it.
    pub fn build_download_request(&self, request: &DownloadRequest) -> Result<String> {
        self.assemble(
            &SOLICITA_DESCARGA,
            &request.attributes(),
            request.receiver_rfc.as_deref(),
        )
    }

    /// Submit a download request to the SolicitaDescarga service.
    pub async fn request_download(
        &self,
        token: &str,
        request: &DownloadRequest,
    ) -> Result<DownloadRequested> {
        debug!(requester = %request.requester_rfc, "requesting download");
        let doc = self
            .call(
                &SOLICITA_DESCARGA,
                Some(token),
                &request.attributes(),
                request.receiver_rfc.as_deref(),
            )
            .await?;
        parse_result(&doc)
    }
}

fn parse_result(doc: &Document) -> Result<DownloadRequested> {
    let result = doc
        .find(doc.root(), SOLICITA_DESCARGA.result_path)
        .ok_or_else(|| {
            Error::UnexpectedResponse("SolicitaDescargaResult element not found".into())
        })?;
    let attr = |name: &str| doc.attribute(result, name).map(str::to_string);
    Ok(DownloadRequested {
        request_id: attr("IdSolicitud"),
        status_code: attr("CodEstatus"),
        message: attr("Mensaje"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_request() -> DownloadRequest {
        DownloadRequest::new(
            "AAA010101AAA",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
    }

    #[test]
    fn test_attributes_include_formatted_dates() {
        let attrs = test_request().attributes();
        assert!(attrs.contains(&("FechaInicial", "2024-01-01T00:00:00".to_string())));
        assert!(attrs.contains(&("FechaFinal", "2024-01-31T00:00:00".to_string())));
        assert!(attrs.contains(&("TipoSolicitud", "CFDI".to_string())));
    }

    #[test]
    fn test_unset_options_are_skipped() {
        let attrs = test_request().attributes();
        assert_eq!(attrs.len(), 4);
        assert!(!attrs.iter().any(|(name, _)| *name == "RfcEmisor"));
    }

    #[test]
    fn test_set_options_are_bound() {
        let mut request = test_request();
        request.request_type = RequestType::Metadata;
        request.issuer_rfc = Some("BBB010101BBB".to_string());
        request.uuid = Some("ad662d33-6934-459c-a128-BDf0393f0f44".to_string());

        let attrs = request.attributes();
        assert!(attrs.contains(&("TipoSolicitud", "Metadata".to_string())));
        assert!(attrs.contains(&("RfcEmisor", "BBB010101BBB".to_string())));
        assert!(attrs.iter().any(|(name, _)| *name == "UUID"));
    }

    #[test]
    fn test_parse_result_reads_attributes() {
        let response = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
            <s:Body>
                <SolicitaDescargaResponse xmlns="http://DescargaMasivaTerceros.sat.gob.mx">
                    <SolicitaDescargaResult IdSolicitud="42aabb" CodEstatus="5000" Mensaje="Solicitud Aceptada"/>
                </SolicitaDescargaResponse>
            </s:Body>
        </s:Envelope>"#;
        let doc = Document::parse(response).unwrap();
        let parsed = parse_result(&doc).unwrap();
        assert_eq!(parsed.request_id.as_deref(), Some("42aabb"));
        assert_eq!(parsed.status_code.as_deref(), Some("5000"));
        assert_eq!(parsed.message.as_deref(), Some("Solicitud Aceptada"));
    }

    #[test]
    fn test_parse_result_rejects_unrelated_response() {
        let doc = Document::parse("<s:Envelope xmlns:s=\"http://e\"><s:Body/></s:Envelope>").unwrap();
        assert!(matches!(
            parse_result(&doc),
            Err(Error::UnexpectedResponse(_))
        ));
    }
}
