//! starkaid is a CLI tool to declare and deploy the starkaid contracts on Starknet.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command, ReportFormat};
use starkaid_deploy::{DeployConfig, Deployer, RunReport, summary_table};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = DeployConfig::load(cli.config.as_deref(), &cli.overrides())?;
    let command = cli.command.unwrap_or(Command::Deploy { redeploy: false });

    match command {
        Command::Deploy { redeploy } => deploy(config, redeploy).await,
        Command::Plan => print_plan(config),
        Command::Report { format } => print_report(&config, format),
    }
}

async fn deploy(config: DeployConfig, redeploy: bool) -> Result<()> {
    tracing::info!(
        rpc_url = config.rpc_url.as_deref().unwrap_or_default(),
        outdata_path = %config.outdata.display(),
        package = %config.artifacts.package,
        units = config.units.len(),
        "Loading deployment configuration..."
    );

    let report = Deployer::new(config).deploy(redeploy).await?;

    if let Some((unit, kind, reason)) = report.failure() {
        anyhow::bail!("Deployment halted at {} ({} failure): {}", unit, kind, reason);
    }
    if !report.success() {
        anyhow::bail!("Deployment did not complete");
    }

    Ok(())
}

fn print_plan(config: DeployConfig) -> Result<()> {
    let plan = Deployer::new(config).plan()?;

    for (position, unit) in plan.units().iter().enumerate() {
        println!("{}. {}", position + 1, unit.name);
        for arg in &unit.constructor_args {
            println!("     {} <- {}", arg.param, arg.from);
        }
        for dependency in unit
            .dependencies
            .iter()
            .filter(|dependency| !unit.constructor_args.iter().any(|arg| &arg.from == *dependency))
        {
            println!("     after {}", dependency);
        }
    }

    Ok(())
}

fn print_report(config: &DeployConfig, format: ReportFormat) -> Result<()> {
    let path = config.report_path();
    let report = RunReport::load_from_file(&path)
        .with_context(|| format!("No run report found in {}", config.outdata.display()))?;

    match format {
        ReportFormat::Table => {
            println!("{}", summary_table(&report));
            println!(
                "started {}, finished {}, success: {}",
                report.started_at, report.finished_at, report.success()
            );
        }
        ReportFormat::Json => {
            let json =
                serde_json::to_string_pretty(&report).context("Failed to serialize run report")?;
            println!("{}", json);
        }
    }

    Ok(())
}
