use clap::{Args, Subcommand};
use shopcart_app::{
    config::ShopConfig,
    domain::{history::models::HistoryRecord, ledger::models::Reconciliation},
};
use tabled::{
    builder::Builder,
    settings::{
        Alignment, Style,
        object::Columns,
    },
};

use super::maintenance_context;

#[derive(Debug, Args)]
pub(crate) struct LedgerCommand {
    #[command(subcommand)]
    command: LedgerSubcommand,
}

#[derive(Debug, Subcommand)]
enum LedgerSubcommand {
    /// List paid purchases that have no ledger entry
    Check(CheckArgs),

    /// Compare history and ledger totals of one checkout
    Reconcile(ReconcileArgs),
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[command(flatten)]
    shop: ShopConfig,
}

#[derive(Debug, Args)]
struct ReconcileArgs {
    #[command(flatten)]
    shop: ShopConfig,

    /// Checkout identifier
    #[arg(long)]
    identifier: u64,
}

pub(crate) async fn run(command: LedgerCommand) -> Result<(), String> {
    match command.command {
        LedgerSubcommand::Check(args) => check(args).await,
        LedgerSubcommand::Reconcile(args) => reconcile(args).await,
    }
}

async fn check(args: CheckArgs) -> Result<(), String> {
    let context = maintenance_context(&args.shop).await?;

    let missing = context
        .ledger
        .unreconciled_history()
        .await
        .map_err(|error| format!("failed to check ledger: {error}"))?;

    if missing.is_empty() {
        println!("every paid purchase is in the ledger");
        return Ok(());
    }

    println!("{}", unreconciled_table(&missing));

    Err(format!("{} paid purchases have no ledger entry", missing.len()))
}

async fn reconcile(args: ReconcileArgs) -> Result<(), String> {
    let context = maintenance_context(&args.shop).await?;

    let reconciliation = context
        .ledger
        .reconcile(args.identifier)
        .await
        .map_err(|error| format!("failed to reconcile {}: {error}", args.identifier))?;

    println!("{}", reconciliation_table(&reconciliation));

    if reconciliation.is_balanced() {
        Ok(())
    } else {
        Err(format!("checkout {} is out of balance", args.identifier))
    }
}

fn unreconciled_table(records: &[HistoryRecord]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["id", "identifier", "user", "item", "price", "paid at"]);

    for record in records {
        builder.push_record([
            record.id.to_string(),
            record.identifier.to_string(),
            record.userid.to_string(),
            record.item_name.clone(),
            format!("{} {}", record.price, record.currency),
            record.updated_at.to_string(),
        ]);
    }

    let mut table = builder.build();
    table.with(Style::modern_rounded());
    table.modify(Columns::new(4..5), Alignment::right());

    table.to_string()
}

fn reconciliation_table(reconciliation: &Reconciliation) -> String {
    let missing = reconciliation
        .missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    let status = if reconciliation.is_balanced() {
        "balanced"
    } else {
        "out of balance"
    };

    let rows = [
        ("checkout", reconciliation.identifier.to_string()),
        ("history total", reconciliation.history_total.to_string()),
        ("ledger total", reconciliation.ledger_total.to_string()),
        ("history credits", reconciliation.history_credits.to_string()),
        ("ledger credits", reconciliation.ledger_credits.to_string()),
        ("fees retained", reconciliation.fees.to_string()),
        ("credit refunded", reconciliation.refunded.to_string()),
        ("missing rows", missing),
        ("status", status.to_string()),
    ];

    let mut builder = Builder::default();

    for (label, value) in rows {
        builder.push_record([label.to_string(), value]);
    }

    let mut table = builder.build();
    table.with(Style::modern_rounded());
    table.modify(Columns::new(1..2), Alignment::right());

    table.to_string()
}
