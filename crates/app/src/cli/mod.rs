use std::sync::Arc;

use clap::{Parser, Subcommand};
use shopcart_app::{
    catalog::CatalogRegistry,
    clock::SystemClock,
    config::{LoggingConfig, ShopConfig},
    context::ShopContext,
};

mod ledger;
mod settings;
mod tasks;

#[derive(Debug, Parser)]
#[command(name = "shopcart-app", about = "Shopcart CLI", long_about = None)]
pub(crate) struct Cli {
    /// Logging output settings.
    #[command(flatten)]
    pub(crate) logging: LoggingConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Ledger(ledger::LedgerCommand),
    Tasks(tasks::TasksCommand),
    Settings(settings::SettingsCommand),
}

impl Cli {
    pub(crate) async fn run(self) -> Result<(), String> {
        match self.command {
            Commands::Ledger(command) => ledger::run(command).await,
            Commands::Tasks(command) => tasks::run(command).await,
            Commands::Settings(command) => settings::run(&command),
        }
    }
}

/// A shop without catalog providers, for maintenance commands.
async fn maintenance_context(config: &ShopConfig) -> Result<ShopContext, String> {
    config
        .context(CatalogRegistry::new(), Arc::new(SystemClock))
        .await
        .map_err(|error| format!("failed to set up shop: {error}"))
}
