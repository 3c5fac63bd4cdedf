//! VAT number validation
//!
//! EU numbers are checked against VIES, UK numbers with the HMRC checksum and everything else
//! through VATComply. Transport failures are errors; answers that cannot be read count as
//! "not valid".

use std::sync::Arc;

use async_trait::async_trait;
use mockall::automock;
use reqwest::Client;
use shopcart::vat::{VatRegion, hmrc_checksum_valid, normalise_vat_number, vies_country_code};
use thiserror::Error;
use tracing::debug;

mod vatcomply;
mod vies;

pub use vatcomply::VatComplyClient;
pub use vies::ViesClient;

#[derive(Debug, Error)]
pub enum VatError {
    #[error("VAT service request failed")]
    Http(#[from] reqwest::Error),

    #[error("VAT service answered with status {0}")]
    Status(u16),

    #[error("VAT service fault: {0}")]
    Fault(String),

    #[error("VAT request could not be written")]
    Envelope(#[from] std::io::Error),
}

/// A remote service answering whether a VAT number exists.
#[automock]
#[async_trait]
pub trait VatBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Check a normalised number; `country` is in the form the service expects.
    async fn check(&self, country: &str, number: &str) -> Result<bool, VatError>;
}

/// Routes a VAT number to the service responsible for its country.
#[derive(Clone)]
pub struct VatNumberChecker {
    vies: Arc<dyn VatBackend>,
    vat_comply: Arc<dyn VatBackend>,
}

impl VatNumberChecker {
    pub fn new(vies: Arc<dyn VatBackend>, vat_comply: Arc<dyn VatBackend>) -> Self {
        Self { vies, vat_comply }
    }

    /// Checker using the public VIES and VATComply endpoints.
    pub fn with_client(client: Client) -> Self {
        Self::new(
            Arc::new(ViesClient::new(client.clone())),
            Arc::new(VatComplyClient::new(client)),
        )
    }

    /// Whether `number` is a valid VAT number of `country`.
    ///
    /// # Errors
    ///
    /// Returns an error when the responsible service cannot be reached.
    pub async fn is_vatnr_valid(&self, country: &str, number: &str) -> Result<bool, VatError> {
        let normalised = normalise_vat_number(country, number);

        if normalised.is_empty() {
            return Ok(false);
        }

        let valid = match VatRegion::for_country(country) {
            VatRegion::Hmrc => hmrc_checksum_valid(&normalised),
            VatRegion::Vies => {
                self.vies
                    .check(&vies_country_code(country), &normalised)
                    .await?
            }
            VatRegion::VatComply => {
                let country = country.trim().to_ascii_uppercase();

                self.vat_comply
                    .check(&country, &format!("{country}{normalised}"))
                    .await?
            }
        };

        debug!(country, valid, "VAT number checked");

        Ok(valid)
    }
}

impl std::fmt::Debug for VatNumberChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VatNumberChecker")
            .field("vies", &self.vies.name())
            .field("vat_comply", &self.vat_comply.name())
            .finish()
    }
}
