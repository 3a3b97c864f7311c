//! `flowrun runs`: inspect recorded runs.

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use flowrun_types::run::{FlowRun, FlowRunStatus};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum RunsCommand {
    /// List recent runs, newest first.
    #[command(alias = "ls")]
    List {
        /// Only runs of this flow.
        #[arg(long)]
        flow: Option<String>,

        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Show one run in full.
    Show {
        /// Run ID.
        id: String,
    },
}

pub async fn handle(state: &AppState, action: RunsCommand, json: bool) -> Result<()> {
    match action {
        RunsCommand::List { flow, limit } => list_runs(state, flow.as_deref(), limit, json).await,
        RunsCommand::Show { id } => show_run(state, &id, json).await,
    }
}

async fn list_runs(state: &AppState, flow: Option<&str>, limit: u32, json: bool) -> Result<()> {
    let runs = state.run_service.list_runs(flow, limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!();
        println!(
            "  {} No runs recorded yet. Start one with: {}",
            style("i").blue().bold(),
            style("flowrun run <graph.json>").yellow()
        );
        println!();
        return Ok(());
    }

    println!();
    println!("{}", runs_table(&runs));
    println!();
    Ok(())
}

async fn show_run(state: &AppState, id: &str, json: bool) -> Result<()> {
    let id: Uuid = id.parse().with_context(|| format!("invalid run id: {id}"))?;
    let run = state.run_service.get_run(&id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
        return Ok(());
    }

    println!();
    println!("  {}  {}", style("Run").bold(), style(run.id).cyan());
    println!("  {}  {}", style("Flow").bold(), run.flow_id.as_deref().unwrap_or("-"));
    println!("  {}  {}", style("Status").bold(), status_label(run.status));
    println!("  {}  {}", style("Started").bold(), run.created_at.to_rfc3339());
    println!("  {}  {}", style("Updated").bold(), run.updated_at.to_rfc3339());
    if let Some(error) = &run.error {
        println!("  {}  {}", style("Error").bold(), style(error).red());
    }
    for (label, value) in [("Start data", &run.start_data), ("End data", &run.end_data)] {
        if let Some(value) = value {
            println!();
            println!("  {}", style(label).bold());
            println!("{}", serde_json::to_string_pretty(value)?);
        }
    }
    println!();
    Ok(())
}

fn runs_table(runs: &[FlowRun]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Run").fg(Color::White),
        Cell::new("Flow").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Started").fg(Color::White),
        Cell::new("Error").fg(Color::White),
    ]);

    for run in runs {
        let status = match run.status {
            FlowRunStatus::Running => Cell::new("◌ running").fg(Color::Yellow),
            FlowRunStatus::Success => Cell::new("● success").fg(Color::Green),
            FlowRunStatus::Failed => Cell::new("✗ failed").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(run.id).fg(Color::Cyan),
            Cell::new(run.flow_id.as_deref().unwrap_or("-")),
            status,
            Cell::new(format_relative_time(&run.created_at)).fg(Color::DarkGrey),
            Cell::new(truncate(run.error.as_deref().unwrap_or(""), 50)),
        ]);
    }
    table
}

fn status_label(status: FlowRunStatus) -> String {
    match status {
        FlowRunStatus::Running => style("running").yellow().to_string(),
        FlowRunStatus::Success => style("success").green().to_string(),
        FlowRunStatus::Failed => style("failed").red().to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max - 3).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn format_relative_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let diff = chrono::Utc::now() - *dt;

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_days() < 1 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_days() < 30 {
        format!("{}d ago", diff.num_days())
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_lists_each_run() {
        let mut failed = FlowRun::started(Some("f1".into()), Some(json!({})));
        failed.status = FlowRunStatus::Failed;
        failed.error = Some("No start node found".into());
        let ok = FlowRun::started(None, None);

        let rendered = runs_table(&[failed.clone(), ok.clone()]).to_string();
        assert!(rendered.contains(&failed.id.to_string()));
        assert!(rendered.contains(&ok.id.to_string()));
        assert!(rendered.contains("No start node found"));
    }

    #[test]
    fn test_truncate_and_relative_time() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate(&"y".repeat(20), 10), "yyyyyyy...");

        let now = chrono::Utc::now();
        assert_eq!(format_relative_time(&now), "just now");
        assert_eq!(format_relative_time(&(now - chrono::Duration::hours(3))), "3h ago");
    }
}
