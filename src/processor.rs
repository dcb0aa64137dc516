// src/processor.rs
// Drives the chunk loop: split, per-segment provider calls in document
// order, positional-marker bookkeeping, final reassembly. Strictly
// sequential; the first provider failure aborts the whole run.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::info;

use crate::chunker::{self, SplitPolicy};
use crate::llm_provider::{LlmError, LlmProvider};

/// Fixed editorial instruction for lecture-style Russian transcripts:
/// fix spelling and punctuation, keep the author's voice, order, and
/// content untouched.
pub const SYSTEM_INSTRUCTION: &str = "\
Ты работаешь с учебным, лекционным текстом, который должен сохранить авторский стиль, плавность и структуру повествования.
Прочти текст и аккуратно:
- Исправь орфографические и пунктуационные ошибки.
- Сохрани эмоциональные выражения, повторения, авторские отступления и метафоры.
- Не меняй порядок предложений и абзацев.
- Не сокращай текст, не убирай смысловые блоки.
- Не переписывай текст от себя.

Цель: сделать текст чище и легче для чтения, сохраняя стиль, эмоции и авторский поток мысли.";

const SUMMARY_INSTRUCTION: &str = "\
Кратко изложи содержание текста в 3-5 предложениях. Эта выжимка будет \
служить контекстом при редактировании отдельных частей документа.";

/// Cap on how much of the document feeds the one-shot summary call.
const SUMMARY_INPUT_MAX_CHARS: usize = 12_000;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("text processing failed: {0}")]
    Llm(#[from] LlmError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Generate a one-shot document summary and prefix it to every
    /// segment's instruction to reduce cross-segment discontinuity.
    pub with_summary: bool,
}

/// Assembled output plus how many segments produced it.
#[derive(Debug)]
pub struct ProcessReport {
    pub output: String,
    pub chunks: usize,
}

/// Splits `text` under `policy` and runs every segment through the
/// provider in order, reassembling the replies with a blank line between
/// them. Segments are processed one at a time; no partial output survives
/// a failure.
pub async fn process_document(
    provider: &dyn LlmProvider,
    text: &str,
    policy: &SplitPolicy,
    options: ProcessOptions,
) -> Result<ProcessReport, ProcessError> {
    let chunks = chunker::split(text, policy);
    if chunks.is_empty() {
        return Ok(ProcessReport {
            output: String::new(),
            chunks: 0,
        });
    }

    let total = chunks.len();
    info!(
        model = %provider.model_name(),
        segments = total,
        tokens = chunker::count_tokens(text),
        "Starting document processing"
    );

    let system = if options.with_summary && total > 1 {
        let summary = summarize(provider, text).await?;
        format!("{SYSTEM_INSTRUCTION}\n\nКонтекст всего документа:\n{summary}")
    } else {
        SYSTEM_INSTRUCTION.to_string()
    };

    let mut results = Vec::with_capacity(total);
    for (idx, chunk) in chunks.iter().enumerate() {
        let ordinal = idx + 1;
        info!(part = ordinal, total, chars = chunk.chars().count(), "Processing segment");
        let user = format!("[часть {ordinal} из {total}]\n{chunk}");
        let reply = provider.complete(&system, &user).await?;
        results.push(strip_marker(&reply).to_string());
    }

    Ok(ProcessReport {
        output: results.join("\n\n"),
        chunks: total,
    })
}

async fn summarize(provider: &dyn LlmProvider, text: &str) -> Result<String, LlmError> {
    let input = truncate_chars(text, SUMMARY_INPUT_MAX_CHARS);
    info!(chars = input.chars().count(), "Generating document summary");
    provider.complete(SUMMARY_INSTRUCTION, input).await
}

/// Removes an echoed positional marker from the start of a model reply.
/// The marker is cosmetic bookkeeping, never part of the document.
pub fn strip_marker(reply: &str) -> &str {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    let re = MARKER.get_or_init(|| {
        Regex::new(r"^\[часть\s+\d+\s+из\s+\d+\]\s*").expect("marker pattern is valid")
    });
    match re.find(reply) {
        Some(m) => &reply[m.end()..],
        None => reply,
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
