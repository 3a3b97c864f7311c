//! `flowrun run`: execute a graph file from the terminal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use console::style;
use flowrun_core::engine::FlowEngine;
use flowrun_core::service::flow_run::FlowRunService;
use flowrun_infra::config::load_global_config;
use flowrun_infra::filesystem::resolve_data_dir;
use flowrun_infra::llm::generator_from_env;
use flowrun_infra::sqlite::flow_run::SqliteFlowRunRepository;
use flowrun_types::config::{EngineConfig, GlobalConfig};
use flowrun_types::graph::FlowGraph;
use tokio_util::sync::CancellationToken;

use super::printer::EventPrinter;
use crate::state::open_pool;

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Path to a JSON file with `nodes` and `edges`.
    pub graph: PathBuf,

    /// Use the preview profile (higher step bound, start field expansion).
    #[arg(long)]
    pub preview: bool,

    /// Override the step bound.
    #[arg(long)]
    pub step_limit: Option<u32>,

    /// Do not record the run in the database.
    #[arg(long)]
    pub no_persist: bool,
}

/// Engine settings for this invocation.
pub fn engine_config(config: &GlobalConfig, args: &RunArgs) -> EngineConfig {
    let base = if args.preview {
        config.preview.clone()
    } else {
        config.engine.clone()
    };
    match args.step_limit {
        Some(limit) => base.with_step_limit(limit),
        None => base,
    }
}

pub async fn load_graph(path: &Path) -> Result<FlowGraph> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a valid flow graph", path.display()))
}

/// Run the graph, printing events as they arrive. Ctrl+C cancels the run.
///
/// Returns an error when the flow fails so the process exits non-zero.
pub async fn run_graph(args: RunArgs, json: bool) -> Result<()> {
    let graph = load_graph(&args.graph).await?;
    let data_dir = resolve_data_dir();
    let config = load_global_config(&data_dir).await;
    let generator = generator_from_env(&config.ai).context("failed to set up text generator")?;
    let engine = FlowEngine::new(engine_config(&config, &args), Arc::new(generator));

    let cancel = CancellationToken::new();
    let watcher = {
        let token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        })
    };

    let mut printer = EventPrinter::new(json);
    let failure = if args.no_persist {
        engine
            .run(&graph, &mut printer, &cancel)
            .await
            .err()
            .map(|e| e.to_string())
    } else {
        let pool = open_pool(&data_dir).await?;
        let service = FlowRunService::new(SqliteFlowRunRepository::new(pool), engine);
        let summary = service.run(&graph, &mut printer, &cancel).await?;
        if !json {
            println!("  {} run id {}", style("i").blue().bold(), style(summary.run_id).cyan());
        }
        summary.error
    };
    watcher.abort();

    match failure {
        Some(error) => bail!("flow failed: {error}"),
        None => Ok(()),
    }
}
