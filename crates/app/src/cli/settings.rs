use clap::{Args, Subcommand};
use shopcart::settings::CartSettings;
use shopcart_app::config::SettingsConfig;
use tabled::{builder::Builder, settings::Style};

#[derive(Debug, Args)]
pub(crate) struct SettingsCommand {
    #[command(subcommand)]
    command: SettingsSubcommand,
}

#[derive(Debug, Subcommand)]
enum SettingsSubcommand {
    /// Validate a settings document and print the effective values
    Check(CheckArgs),
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[command(flatten)]
    settings: SettingsConfig,
}

pub(crate) fn run(command: &SettingsCommand) -> Result<(), String> {
    match &command.command {
        SettingsSubcommand::Check(args) => {
            let settings = args
                .settings
                .load()
                .map_err(|error| format!("invalid settings: {error}"))?;

            println!("{}", settings_table(&settings));

            Ok(())
        }
    }
}

fn settings_table(settings: &CartSettings) -> String {
    let rows = [
        ("max items", settings.max_items.to_string()),
        ("expiration (minutes)", settings.expiration_minutes.to_string()),
        ("currency", settings.currency.clone()),
        ("booking fee", settings.booking_fee.to_string()),
        ("cancellation fee", settings.cancellation_fee.to_string()),
        ("rebooking", settings.rebooking.enabled.to_string()),
        ("checkout steps", settings.checkout_steps.join(", ")),
        ("invoice prefix", settings.invoice_prefix.clone()),
    ];

    let mut builder = Builder::default();

    for (label, value) in rows {
        builder.push_record([label.to_string(), value]);
    }

    let mut table = builder.build();
    table.with(Style::modern_rounded());

    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_list_every_step() {
        let table = settings_table(&CartSettings::default());

        assert!(table.contains("addresses, vatnrchecker, termsandconditions, credits"));
        assert!(table.contains("INV-"));
    }
}
