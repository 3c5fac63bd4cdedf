//! Settings Config

use std::path::PathBuf;

use clap::Args;
use shopcart::settings::CartSettings;
use tracing::info;

use super::ConfigError;

/// Where the cart settings live.
#[derive(Debug, Clone, Args)]
pub struct SettingsConfig {
    /// Cart settings YAML file; built-in defaults apply when omitted
    #[arg(long = "settings", env = "SHOPCART_SETTINGS")]
    pub path: Option<PathBuf>,
}

impl SettingsConfig {
    /// Read and validate the settings document.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or holds invalid settings.
    pub fn load(&self) -> Result<CartSettings, ConfigError> {
        let Some(path) = &self.path else {
            return Ok(CartSettings::default());
        };

        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        let settings = CartSettings::from_yaml(&source)?;

        info!(path = %path.display(), "loaded cart settings");

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn defaults_apply_without_a_file() -> TestResult {
        let settings = SettingsConfig { path: None }.load()?;

        assert_eq!(settings, CartSettings::default());

        Ok(())
    }

    #[test]
    fn missing_files_name_the_path() {
        let config = SettingsConfig {
            path: Some(PathBuf::from("/nonexistent/shopcart.yaml")),
        };

        assert!(matches!(
            config.load(),
            Err(ConfigError::Read { path, .. }) if path.ends_with("shopcart.yaml")
        ));
    }
}
