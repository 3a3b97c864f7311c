//! Terminal rendering of progress events.
//!
//! [`EventPrinter`] is an [`EventSink`], so `flowrun run` prints each event
//! the moment the engine emits it.

use console::style;
use flowrun_core::engine::EventSink;
use flowrun_types::event::{FinishStatus, ProgressEvent};
use serde_json::Value;

/// Prints events as styled lines, or as JSON lines with `json`.
pub struct EventPrinter {
    json: bool,
}

impl EventPrinter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// One rendered line for `event`.
    pub fn render(&self, event: &ProgressEvent) -> String {
        if self.json {
            return serde_json::to_string(event).unwrap_or_default();
        }

        match event {
            ProgressEvent::RunStarted { flow_id, start_data } => format!(
                "  {} run started{} {}",
                style("▶").cyan().bold(),
                flow_id
                    .as_deref()
                    .map(|id| format!(" (flow {id})"))
                    .unwrap_or_default(),
                style(compact(&Value::Object(start_data.clone()))).dim()
            ),
            ProgressEvent::NodeStarted {
                node_id,
                node_type,
                step,
            } => format!(
                "  {} [{step}] {} {}",
                style("·").dim(),
                style(node_type).yellow(),
                node_id
            ),
            ProgressEvent::NodeSucceeded {
                node_id, step, data, ..
            } => format!(
                "  {} [{step}] {} {}",
                style("✓").green(),
                node_id,
                style(compact(&Value::Object(data.clone()))).dim()
            ),
            ProgressEvent::NodeFailed {
                node_id,
                step,
                error,
                ..
            } => format!("  {} [{step}] {} {}", style("✗").red(), node_id, style(error).red()),
            ProgressEvent::RunFinished {
                status: FinishStatus::Success,
                result,
                ..
            } => format!(
                "  {} run succeeded {}",
                style("●").green().bold(),
                result
                    .as_ref()
                    .map(|r| compact(&Value::Object(r.clone())))
                    .unwrap_or_default()
            ),
            ProgressEvent::RunFinished {
                status: FinishStatus::Failed,
                error,
                ..
            } => format!(
                "  {} run failed: {}",
                style("●").red().bold(),
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

impl EventSink for EventPrinter {
    async fn emit(&mut self, event: ProgressEvent) {
        println!("{}", self.render(&event));
    }
}

fn compact(value: &Value) -> String {
    const MAX: usize = 120;
    let text = value.to_string();
    if text.chars().count() > MAX {
        let cut: String = text.chars().take(MAX - 3).collect();
        format!("{cut}...")
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    #[test]
    fn test_json_mode_is_wire_form() {
        let printer = EventPrinter::new(true);
        let line = printer.render(&ProgressEvent::finished_err("boom"));
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], json!("run:finished"));
        assert_eq!(value["status"], json!("failed"));
    }

    #[test]
    fn test_text_mode_mentions_outcome() {
        console::set_colors_enabled(false);
        let printer = EventPrinter::new(false);

        let ok = printer.render(&ProgressEvent::finished_ok(
            json!({ "n": 1 }).as_object().cloned().unwrap(),
        ));
        assert!(ok.contains("run succeeded {\"n\":1}"));

        let failed = printer.render(&ProgressEvent::finished_err("No start node found"));
        assert!(failed.contains("run failed: No start node found"));

        let started = printer.render(&ProgressEvent::RunStarted {
            flow_id: Some("f1".into()),
            start_data: Map::new(),
        });
        assert!(started.contains("(flow f1)"));
    }

    #[test]
    fn test_compact_truncates_long_values() {
        let long = Value::String("x".repeat(500));
        let text = compact(&long);
        assert_eq!(text.chars().count(), 120);
        assert!(text.ends_with("..."));
    }
}
