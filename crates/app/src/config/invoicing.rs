//! Invoicing Config

use std::time::Duration;

use clap::Args;

use crate::invoicing::RestInvoiceConfig;

/// External invoicing system; invoices are numbered locally when no URL is given.
#[derive(Debug, Clone, Default, Args)]
pub struct InvoicingConfig {
    /// Base URL of the invoicing system's REST API
    #[arg(long, env = "INVOICING_URL")]
    pub invoicing_url: Option<String>,

    /// API key
    #[arg(long, env = "INVOICING_API_KEY", hide_env_values = true, default_value = "")]
    pub invoicing_api_key: String,

    /// API secret
    #[arg(long, env = "INVOICING_API_SECRET", hide_env_values = true, default_value = "")]
    pub invoicing_api_secret: String,

    /// Account tax rows are booked on
    #[arg(long, env = "INVOICING_TAX_ACCOUNT")]
    pub invoicing_tax_account: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "INVOICING_TIMEOUT_SECONDS", default_value_t = 30)]
    pub invoicing_timeout_seconds: u64,
}

impl InvoicingConfig {
    pub fn rest_config(&self) -> Option<RestInvoiceConfig> {
        let base_url = self.invoicing_url.as_ref()?;
        let defaults = RestInvoiceConfig::default();

        Some(RestInvoiceConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: self.invoicing_api_key.clone(),
            api_secret: self.invoicing_api_secret.clone(),
            tax_account: self
                .invoicing_tax_account
                .clone()
                .unwrap_or_else(|| defaults.tax_account.clone()),
            timeout: Duration::from_secs(self.invoicing_timeout_seconds),
            ..defaults
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_url_means_local_numbering() {
        assert_eq!(InvoicingConfig::default().rest_config(), None);
    }

    #[test]
    fn url_enables_the_rest_provider() {
        let config = InvoicingConfig {
            invoicing_url: Some("https://erp.example.com/".to_string()),
            invoicing_api_key: "key".to_string(),
            invoicing_api_secret: "secret".to_string(),
            invoicing_tax_account: None,
            invoicing_timeout_seconds: 5,
        };

        let rest = config.rest_config();

        assert_eq!(
            rest.as_ref().map(|rest| rest.base_url.as_str()),
            Some("https://erp.example.com")
        );
        assert_eq!(rest.map(|rest| rest.timeout), Some(Duration::from_secs(5)));
    }
}
