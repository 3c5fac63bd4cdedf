//! EU VIES SOAP client.

use async_trait::async_trait;
use quick_xml::{
    Reader, Writer,
    events::{BytesText, Event},
};
use reqwest::{Client, header::CONTENT_TYPE};
use tracing::warn;

use super::{VatBackend, VatError};

pub const VIES_URL: &str = "https://ec.europa.eu/taxation_customs/vies/services/checkVatService";

const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const CHECK_VAT_NS: &str = "urn:ec.europa.eu:taxud:vies:services:checkVat:types";

#[derive(Debug, Clone)]
pub struct ViesClient {
    http: Client,
    url: String,
}

impl ViesClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            url: VIES_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl VatBackend for ViesClient {
    fn name(&self) -> &'static str {
        "vies"
    }

    async fn check(&self, country: &str, number: &str) -> Result<bool, VatError> {
        let response = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(envelope(country, number)?)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // VIES reports faults with a 500 and a SOAP body.
        if let Some(fault) = element_text(&body, "faultstring") {
            return Err(VatError::Fault(fault));
        }

        if !status.is_success() {
            return Err(VatError::Status(status.as_u16()));
        }

        match element_text(&body, "valid").as_deref() {
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            _ => {
                warn!(country, "unreadable VIES response");
                Ok(false)
            }
        }
    }
}

fn envelope(country: &str, number: &str) -> Result<String, VatError> {
    let mut writer = Writer::new(Vec::new());

    writer
        .create_element("soapenv:Envelope")
        .with_attribute(("xmlns:soapenv", SOAP_ENVELOPE_NS))
        .with_attribute(("xmlns:urn", CHECK_VAT_NS))
        .write_inner_content(|writer| {
            writer.create_element("soapenv:Header").write_empty()?;
            writer
                .create_element("soapenv:Body")
                .write_inner_content(|writer| {
                    writer
                        .create_element("urn:checkVat")
                        .write_inner_content(|writer| {
                            writer
                                .create_element("urn:countryCode")
                                .write_text_content(BytesText::new(country))?;
                            writer
                                .create_element("urn:vatNumber")
                                .write_text_content(BytesText::new(number))?;
                            Ok(())
                        })?;
                    Ok(())
                })?;
            Ok(())
        })?;

    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

/// Text of the first element with local name `name`, whatever its prefix and attributes.
///
/// Unparseable documents have no elements.
fn element_text(body: &str, name: &str) -> Option<String> {
    match read_element_text(body, name.as_bytes()) {
        Ok(text) => text,
        Err(error) => {
            warn!(%error, "malformed VIES response");
            None
        }
    }
}

fn read_element_text(body: &str, name: &[u8]) -> Result<Option<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(body);
    let mut text: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) if text.is_none() && start.local_name().as_ref() == name => {
                text = Some(String::new());
            }
            Event::Empty(empty) if text.is_none() && empty.local_name().as_ref() == name => {
                return Ok(Some(String::new()));
            }
            Event::Text(chunk) => {
                if let Some(text) = text.as_mut() {
                    text.push_str(&chunk.unescape()?);
                }
            }
            Event::End(end) if text.is_some() && end.local_name().as_ref() == name => {
                return Ok(text.map(|text| text.trim().to_string()));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, method},
    };

    use super::*;

    const VALID: &str = r#"<env:Envelope xmlns:env="http://schemas.xmlsoap.org/soap/envelope/"><env:Body><ns2:checkVatResponse xmlns:ns2="urn:ec.europa.eu:taxud:vies:services:checkVat:types"><ns2:countryCode>DE</ns2:countryCode><ns2:vatNumber>123456789</ns2:vatNumber><ns2:requestDate>2026-01-01+01:00</ns2:requestDate><ns2:valid>true</ns2:valid><ns2:name>---</ns2:name></ns2:checkVatResponse></env:Body></env:Envelope>"#;

    #[test]
    fn reads_the_valid_flag_behind_a_prefix() {
        assert_eq!(element_text(VALID, "valid").as_deref(), Some("true"));
        assert_eq!(element_text(VALID, "countryCode").as_deref(), Some("DE"));
    }

    #[test]
    fn attributes_do_not_hide_elements() {
        let typed = r#"<env:Envelope xmlns:env="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><env:Body><ns2:checkVatResponse xmlns:ns2="urn:ec.europa.eu:taxud:vies:services:checkVat:types"><ns2:valid xsi:type="xsd:boolean">true</ns2:valid></ns2:checkVatResponse></env:Body></env:Envelope>"#;
        let fault = r#"<soap:Fault xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><faultcode>soap:Server</faultcode><faultstring xml:lang="en">MS_UNAVAILABLE</faultstring></soap:Fault>"#;

        assert_eq!(element_text(typed, "valid").as_deref(), Some("true"));
        assert_eq!(element_text(fault, "faultstring").as_deref(), Some("MS_UNAVAILABLE"));
    }

    #[test]
    fn unprefixed_and_similar_tags() {
        assert_eq!(element_text("<valid> false </valid>", "valid").as_deref(), Some("false"));
        assert_eq!(element_text("<isvalid>true</isvalid>", "valid"), None);
        assert_eq!(element_text("<valid>true", "valid"), None);
    }

    #[test]
    fn envelope_carries_country_and_number() -> TestResult {
        let body = envelope("EL", "123456789")?;

        assert!(body.contains("<urn:countryCode>EL</urn:countryCode>"));
        assert!(body.contains("<urn:vatNumber>123456789</urn:vatNumber>"));

        Ok(())
    }

    #[test]
    fn envelope_escapes_input() -> TestResult {
        let body = envelope("DE", "1<2&3")?;

        assert!(body.contains("<urn:vatNumber>1&lt;2&amp;3</urn:vatNumber>"));

        Ok(())
    }

    #[tokio::test]
    async fn soap_faults_are_errors() -> TestResult {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_string_contains("<urn:countryCode>DE</urn:countryCode>"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VALID))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("<urn:countryCode>FR</urn:countryCode>"))
            .respond_with(ResponseTemplate::new(500).set_body_string(
                r#"<soap:Fault xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><faultstring xml:lang="en">MS_MAX_CONCURRENT_REQ</faultstring></soap:Fault>"#,
            ))
            .mount(&server)
            .await;

        let client = ViesClient::new(Client::new()).with_url(server.uri());

        assert!(client.check("DE", "123456789").await?);
        assert!(matches!(
            client.check("FR", "12345678901").await,
            Err(VatError::Fault(fault)) if fault == "MS_MAX_CONCURRENT_REQ"
        ));

        Ok(())
    }
}
