//! CLI command handlers.
//!
//! This module contains the business logic for CLI commands,
//! separated from argument parsing for testability.

use crate::prelude::*;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::io::Write;

/// Run the registry workflow, writing tutorial output to `out`.
///
/// # Errors
///
/// Returns the first workflow error; output written before the failure
/// is kept.
pub fn handle_demo<C, W>(client: &C, config: WorkflowConfig, out: &mut W) -> Result<WorkflowReport>
where
    C: RegistryClient + ?Sized,
    W: Write,
{
    let workflow = RegistryWorkflow::new(client, config);
    let mut write_error = None;
    let result = workflow.run(|step: Step| {
        if write_error.is_none() {
            if let Err(e) = writeln!(out, "{step}") {
                write_error = Some(e);
            }
        }
    });
    if let Some(e) = write_error {
        return Err(e.into());
    }
    let report = result?;

    out.write_all(format_demo_summary(&report).as_bytes())?;
    Ok(report)
}

/// Tutorial-style summary of a completed workflow.
pub fn format_demo_summary(report: &WorkflowReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Name: {}", report.registered.name);
    let _ = writeln!(out, "Version: {}", report.registered.version);
    let _ = writeln!(out, "Stage: {}", report.registered.current_stage);
    let _ = writeln!(out, "{}", format_predictions(&report.run_predictions));
    let _ = writeln!(out, "{}", format_predictions(&report.registry_predictions));
    let _ = writeln!(
        out,
        "Transitioned {} to {}",
        report.model_uri,
        report.final_stage()
    );
    out
}

/// `model_pred: [..]` line.
pub fn format_predictions(predictions: &[f64]) -> String {
    format!("model_pred: {predictions:?}")
}

/// Parse a comma-separated feature row such as `0,1,0`.
///
/// # Errors
///
/// Returns `Validation` if the row is empty or a value is not a number.
pub fn parse_row(row: &str) -> Result<Vec<f64>> {
    if row.trim().is_empty() {
        return Err(RegflowError::Validation("empty input row".to_string()));
    }
    row.split(',')
        .map(|value| {
            value.trim().parse::<f64>().map_err(|_| {
                RegflowError::Validation(format!("invalid feature value '{value}' in row '{row}'"))
            })
        })
        .collect()
}

/// Format model version info for display.
pub fn format_model_version(mv: &ModelVersion) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Name: {}", mv.name);
    let _ = writeln!(out, "Version: {}", mv.version);
    let _ = writeln!(out, "Stage: {}", mv.current_stage);
    let _ = writeln!(out, "  Source:  {}", mv.source);
    let _ = writeln!(out, "  Run:     {}", mv.run_id);
    let _ = writeln!(out, "  Created: {}", mv.created_at);
    let _ = writeln!(out, "  Updated: {}", mv.updated_at);
    let _ = writeln!(out, "  Size:    {} bytes", mv.content_address.size());
    let _ = writeln!(out, "  Hash:    {}", mv.content_address.hash_hex());
    out
}

/// One line per version, for `model list <NAME>`.
pub fn format_version_line(mv: &ModelVersion) -> String {
    format!("  {:>4}  {:<10}  {}", mv.version, mv.current_stage, mv.source)
}

/// Format storage stats for display.
pub fn format_stats(stats: &StorageStats) -> String {
    let mut out = String::new();
    out.push_str("Registry Statistics:\n");
    let _ = writeln!(out, "  Runs:     {}", stats.run_count);
    let _ = writeln!(out, "  Models:   {}", stats.model_count);
    let _ = writeln!(out, "  Versions: {}", stats.version_count);
    let _ = writeln!(out, "  Objects:  {}", stats.object_count);
    let _ = writeln!(out, "  Size:     {} bytes", stats.total_size_bytes);
    out
}

/// Format run info for display.
pub fn format_run_info(run: &Run) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Run: {}", run.run_id);
    if let Some(name) = &run.run_name {
        let _ = writeln!(out, "  Name:       {name}");
    }
    let _ = writeln!(out, "  Experiment: {}", run.experiment_name);
    let _ = writeln!(out, "  Status:     {}", run.status);
    let _ = writeln!(out, "  Started:    {}", run.started_at);
    if let Some(finished) = run.finished_at {
        let _ = writeln!(out, "  Finished:   {finished}");
    }
    if !run.params.is_empty() {
        out.push_str("  Params:\n");
        for (k, v) in &run.params {
            let _ = writeln!(out, "    {k}: {v}");
        }
    }
    if !run.metrics.is_empty() {
        out.push_str("  Final metrics:\n");
        let names: BTreeSet<&str> = run.metrics.iter().map(|m| m.name.as_str()).collect();
        for name in names {
            if let Some(value) = run.get_metric(name) {
                let _ = writeln!(out, "    {name}: {value}");
            }
        }
    }
    if !run.tags.is_empty() {
        out.push_str("  Tags:\n");
        for (k, v) in &run.tags {
            let _ = writeln!(out, "    {k}: {v}");
        }
    }
    if !run.artifacts.is_empty() {
        out.push_str("  Artifacts:\n");
        for (path, address) in &run.artifacts {
            let _ = writeln!(out, "    {path} ({} bytes)", address.size());
        }
    }
    out
}
