//! Progress and result output.

use comfy_table::{Table, presets::UTF8_FULL};

use crate::{ContractAddress, RunReport, UnitOutcome};

/// Receives progress events from the orchestrator.
pub trait Reporter {
    /// `unit` was deployed at `address`.
    fn unit_deployed(&self, unit: &str, address: ContractAddress);

    /// `unit` was taken over from a previous run at `address`.
    fn unit_reused(&self, unit: &str, address: ContractAddress);

    /// `unit` failed and the run halts.
    fn unit_failed(&self, unit: &str, reason: &str);

    /// The run is over, successfully or not.
    fn run_finished(&self, report: &RunReport);
}

/// Reports through `tracing` and renders a summary table at the end of a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn unit_deployed(&self, unit: &str, address: ContractAddress) {
        tracing::info!(unit, %address, "✅ {} contract has been deployed", unit);
    }

    fn unit_reused(&self, unit: &str, address: ContractAddress) {
        tracing::info!(unit, %address, "♻️ {} contract already deployed, reusing it", unit);
    }

    fn unit_failed(&self, unit: &str, reason: &str) {
        tracing::error!(unit, reason, "❌ {} contract deployment failed", unit);
    }

    fn run_finished(&self, report: &RunReport) {
        for line in summary_table(report).lines() {
            tracing::info!("{}", line);
        }

        match report.failure() {
            None if report.success() => {
                tracing::info!(units = report.units.len(), "✓ Deployment complete!")
            }
            Some((unit, kind, _)) => tracing::error!(
                unit,
                %kind,
                not_attempted = ?report.not_attempted,
                "Deployment halted"
            ),
            None => tracing::error!(status = ?report.status, "Deployment incomplete"),
        }
    }
}

/// Render a run report as a table with one row per unit.
pub fn summary_table(report: &RunReport) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Unit", "Status", "Address / Reason"]);

    for unit in &report.units {
        let (status, detail) = match &unit.outcome {
            UnitOutcome::Deployed { address, .. } => ("deployed".to_string(), address.to_string()),
            UnitOutcome::Reused { address, .. } => ("reused".to_string(), address.to_string()),
            UnitOutcome::Failed { kind, reason } => (format!("failed ({})", kind), reason.clone()),
        };
        table.add_row(vec![unit.unit.clone(), status, detail]);
    }

    for unit in &report.not_attempted {
        table.add_row(vec![unit.clone(), "not attempted".to_string(), String::new()]);
    }

    for unit in &report.carried_over {
        if let Some(address) = unit.address() {
            table.add_row(vec![
                unit.unit.clone(),
                "recorded earlier".to_string(),
                address.to_string(),
            ]);
        }
    }

    table.to_string()
}
