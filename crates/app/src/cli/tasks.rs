use std::sync::Arc;

use clap::{Args, Subcommand};
use shopcart_app::{
    config::ShopConfig,
    tasks::{ShopTaskHandler, TaskRunner},
};

use super::maintenance_context;

#[derive(Debug, Args)]
pub(crate) struct TasksCommand {
    #[command(subcommand)]
    command: TasksSubcommand,
}

#[derive(Debug, Subcommand)]
enum TasksSubcommand {
    /// Run every task that is due now
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    shop: ShopConfig,
}

pub(crate) async fn run(command: TasksCommand) -> Result<(), String> {
    match command.command {
        TasksSubcommand::Run(args) => run_due(args).await,
    }
}

async fn run_due(args: RunArgs) -> Result<(), String> {
    let context = maintenance_context(&args.shop).await?;
    let now = context.clock.now();

    let runner = TaskRunner::new(
        context.tasks.clone(),
        Arc::new(ShopTaskHandler::new(context.clone())),
    );

    let report = runner
        .run_due(now)
        .await
        .map_err(|error| format!("failed to run tasks: {error}"))?;

    println!("completed: {}", report.completed);
    println!("failed: {}", report.failed);

    Ok(())
}
