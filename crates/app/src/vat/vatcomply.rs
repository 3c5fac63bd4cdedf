//! VATComply REST client, used for countries outside the EU and the UK.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use super::{VatBackend, VatError};

pub const VATCOMPLY_URL: &str = "https://api.vatcomply.com/vat";

#[derive(Debug, Clone)]
pub struct VatComplyClient {
    http: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct VatComplyResponse {
    valid: bool,
}

impl VatComplyClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            url: VATCOMPLY_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl VatBackend for VatComplyClient {
    fn name(&self) -> &'static str {
        "vatcomply"
    }

    async fn check(&self, country: &str, number: &str) -> Result<bool, VatError> {
        let response = self
            .http
            .get(&self.url)
            .query(&[("vat_number", number)])
            .send()
            .await?;

        let status = response.status();

        if status.is_server_error() {
            return Err(VatError::Status(status.as_u16()));
        }

        // Malformed numbers are rejected with a client error.
        if !status.is_success() {
            return Ok(false);
        }

        let body = response.text().await?;

        Ok(parse_response(&body).unwrap_or_else(|| {
            warn!(country, "unreadable VATComply response");
            false
        }))
    }
}

fn parse_response(body: &str) -> Option<bool> {
    serde_json::from_str::<VatComplyResponse>(body)
        .ok()
        .map(|response| response.valid)
}
