//! Configuration
//!
//! Command line flags with environment fallbacks, grouped the same way for every command that
//! needs them. Business settings come from a YAML document.

use std::{path::PathBuf, sync::Arc};

use clap::Args;
use shopcart::settings::SettingsError;
use thiserror::Error;

use crate::{
    catalog::CatalogRegistry,
    clock::Clock,
    context::{AppInitError, ShopContext},
};

pub mod db;
pub mod invoicing;
pub mod logging;
pub mod settings;

pub use db::DatabaseConfig;
pub use invoicing::InvoicingConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use settings::SettingsConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings from {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Init(#[from] AppInitError),
}

/// Everything needed to build a database backed [`ShopContext`].
#[derive(Debug, Args)]
pub struct ShopConfig {
    /// Application database settings.
    #[command(flatten)]
    pub database: DatabaseConfig,

    /// Cart settings document.
    #[command(flatten)]
    pub settings: SettingsConfig,

    /// External invoicing system.
    #[command(flatten)]
    pub invoicing: InvoicingConfig,
}

impl ShopConfig {
    /// Connect, migrate and wire a shop.
    ///
    /// # Errors
    ///
    /// Returns an error when the settings are invalid or the database cannot be prepared.
    pub async fn context(
        &self,
        catalog: CatalogRegistry,
        clock: Arc<dyn Clock>,
    ) -> Result<ShopContext, ConfigError> {
        let settings = self.settings.load()?;

        Ok(ShopContext::from_database_url(
            &self.database.database_url,
            settings,
            catalog,
            clock,
            self.invoicing.rest_config(),
        )
        .await?)
    }
}
