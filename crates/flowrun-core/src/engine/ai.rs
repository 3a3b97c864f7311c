//! AI node execution: expand the prompt, call the generator, store the text.

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::llm::box_generator::BoxTextGenerator;

use super::error::NodeError;
use super::prompt;

/// Run one AI step.
///
/// `template` is the node's `script` (missing means empty) and
/// `result_field` the key the generated text is stored under (missing means
/// `""`; not validated). The generator call is raced against `cancel`.
pub async fn run_ai_node(
    generator: &BoxTextGenerator,
    template: Option<&str>,
    result_field: Option<&str>,
    mut data: Map<String, Value>,
    cancel: &CancellationToken,
) -> Result<Map<String, Value>, NodeError> {
    let prompt = prompt::expand(template.unwrap_or_default(), &data);
    tracing::debug!(
        generator = generator.name(),
        prompt_len = prompt.len(),
        "calling text generator"
    );

    let text = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(NodeError::Cancelled),
        result = generator.generate(&prompt) => {
            result.map_err(|e| NodeError::AiBridge(e.to_string()))?
        }
    };

    data.insert(result_field.unwrap_or_default().to_string(), Value::String(text));
    Ok(data)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use flowrun_types::error::GenerateError;
    use serde_json::json;

    use super::*;
    use crate::llm::disabled::DisabledGenerator;
    use crate::llm::generator::TextGenerator;

    /// Records prompts and answers with a canned reply.
    #[derive(Clone, Default)]
    struct Recorder {
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl TextGenerator for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("generated".to_string())
        }
    }

    struct Slow;

    impl TextGenerator for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("late".to_string())
        }
    }

    fn data() -> Map<String, Value> {
        json!({ "topic": "rust" }).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_stores_text_under_result_field() {
        let recorder = Recorder::default();
        let generator = BoxTextGenerator::new(recorder.clone());

        let out = run_ai_node(
            &generator,
            Some("Write about ${data.topic}"),
            Some("summary"),
            data(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(out["summary"], json!("generated"));
        assert_eq!(out["topic"], json!("rust"));
        assert_eq!(*recorder.prompts.lock().unwrap(), vec!["Write about rust"]);
    }

    #[tokio::test]
    async fn test_missing_fields_default_to_empty() {
        let recorder = Recorder::default();
        let generator = BoxTextGenerator::new(recorder.clone());

        let out = run_ai_node(&generator, None, None, data(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(out[""], json!("generated"));
        assert_eq!(*recorder.prompts.lock().unwrap(), vec![String::new()]);
    }

    #[tokio::test]
    async fn test_generator_fault_is_bridge_error() {
        let generator = BoxTextGenerator::new(DisabledGenerator);
        let err = run_ai_node(&generator, Some("x"), Some("y"), data(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "[AIBridgeError] no text generator configured");
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_generation() {
        let generator = BoxTextGenerator::new(Slow);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = run_ai_node(&generator, Some("x"), Some("y"), data(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, NodeError::Cancelled);
    }
}
