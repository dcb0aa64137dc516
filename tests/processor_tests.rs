// tests/processor_tests.rs
// Processor loop tests against a mock provider (no network).

use std::sync::Mutex;

use async_trait::async_trait;
use pravka::chunker::SplitPolicy;
use pravka::llm_provider::{LlmError, LlmProvider};
use pravka::processor::{process_document, ProcessOptions};

/// Echoes the user content back and records every call, so tests can
/// inspect the exact prompts the processor builds.
struct EchoProvider {
    calls: Mutex<Vec<(String, String)>>,
}

impl EchoProvider {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for EchoProvider {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        Ok(user.to_string())
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

/// Fails on every call.
struct FailingProvider;

#[async_trait]
impl LlmProvider for FailingProvider {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
        Err(LlmError::GenerationFailed("quota exceeded".to_string()))
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

#[cfg(test)]
mod processor_tests {
    use super::*;

    #[tokio::test]
    async fn test_one_call_per_chunk_in_order() {
        let provider = EchoProvider::new();
        let text = "Ааа.\n\nБбб.\n\nВвв.";

        let report = process_document(
            &provider,
            text,
            &SplitPolicy::MaxChars(5),
            ProcessOptions::default(),
        )
        .await
        .expect("processing should succeed");

        assert_eq!(report.chunks, 3);
        let calls = provider.calls();
        assert_eq!(calls.len(), 3, "one provider call per chunk");
        assert!(calls[0].1.starts_with("[часть 1 из 3]"));
        assert!(calls[1].1.starts_with("[часть 2 из 3]"));
        assert!(calls[2].1.starts_with("[часть 3 из 3]"));
        // The echoed markers are stripped before reassembly.
        assert_eq!(report.output, "Ааа.\n\nБбб.\n\nВвв.");
    }

    #[tokio::test]
    async fn test_single_chunk_document() {
        let provider = EchoProvider::new();
        let report = process_document(
            &provider,
            "Один короткий текст.",
            &SplitPolicy::Whole,
            ProcessOptions::default(),
        )
        .await
        .expect("processing should succeed");

        assert_eq!(report.chunks, 1);
        assert_eq!(report.output, "Один короткий текст.");
    }

    #[tokio::test]
    async fn test_empty_input_is_a_noop() {
        let provider = EchoProvider::new();
        let report = process_document(
            &provider,
            "   ",
            &SplitPolicy::MaxChars(100),
            ProcessOptions::default(),
        )
        .await
        .expect("empty input is not an error");

        assert_eq!(report.chunks, 0);
        assert_eq!(report.output, "");
        assert!(provider.calls().is_empty(), "no provider calls for empty input");
    }

    #[tokio::test]
    async fn test_summary_adds_one_extra_call_and_context() {
        let provider = EchoProvider::new();
        let text = "Ааа.\n\nБбб.\n\nВвв.";

        let report = process_document(
            &provider,
            text,
            &SplitPolicy::MaxChars(5),
            ProcessOptions { with_summary: true },
        )
        .await
        .expect("processing should succeed");

        assert_eq!(report.chunks, 3);
        let calls = provider.calls();
        assert_eq!(calls.len(), 4, "summary call plus one call per chunk");
        // Every chunk call carries the summary in its instruction.
        for (system, _) in &calls[1..] {
            assert!(
                system.contains("Контекст всего документа"),
                "chunk instruction missing summary context"
            );
        }
    }

    #[tokio::test]
    async fn test_no_summary_call_for_single_chunk() {
        let provider = EchoProvider::new();
        process_document(
            &provider,
            "Короткий текст.",
            &SplitPolicy::Whole,
            ProcessOptions { with_summary: true },
        )
        .await
        .expect("processing should succeed");

        assert_eq!(provider.calls().len(), 1, "no summary needed for one chunk");
    }

    #[tokio::test]
    async fn test_first_failure_aborts_the_run() {
        let err = process_document(
            &FailingProvider,
            "Ааа.\n\nБбб.",
            &SplitPolicy::MaxChars(5),
            ProcessOptions::default(),
        )
        .await
        .expect_err("failure must propagate");

        let message = err.to_string();
        assert!(message.contains("quota exceeded"), "got: {}", message);
    }
}
