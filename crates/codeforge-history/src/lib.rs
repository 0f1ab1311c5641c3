//! Conversation history compression (spec §4.9): keep a leading system
//! message and the last few turns verbatim, replace the rest with one
//! synthesized summary under a token budget, falling back to truncation
//! when summarization isn't available or trusted.

#![warn(missing_docs)]
#![warn(clippy::all)]

use async_trait::async_trait;
use thiserror::Error;

/// Number of trailing turns always kept verbatim, after the leading
/// system message.
pub const PRESERVED_TURNS: usize = 4;

/// Characters per token used by the `~4 chars/token` estimate.
const CHARS_PER_TOKEN: usize = 4;

/// A conversation role the compressor distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The leading system/instructions message, always kept verbatim.
    System,
    /// A user turn.
    User,
    /// An assistant turn.
    Assistant,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Who sent this turn.
    pub role: Role,
    /// The turn's text content.
    pub content: String,
}

impl Message {
    /// Construct a message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Estimated token count at ~4 characters per token.
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.content)
    }
}

fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN
}

fn total_tokens(messages: &[Message]) -> usize {
    messages.iter().map(Message::estimated_tokens).sum()
}

/// Errors a [`Summarizer`] can report.
#[derive(Debug, Error)]
pub enum SummarizeError {
    /// The summarization call itself failed (model error, timeout, ...).
    #[error("summarization failed: {0}")]
    Failed(String),
}

/// Produces one summary string from a run of conversation turns.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `messages` into a single piece of text.
    async fn summarize(&self, messages: &[Message]) -> Result<String, SummarizeError>;
}

/// Compress `messages` to fit under `max_tokens`.
///
/// Preserves a leading system message and the last [`PRESERVED_TURNS`]
/// turns verbatim. Everything else is replaced by one summary message
/// from `summarizer`, unless `is_local_model` is set (a model too small
/// to trust with the summarization round-trip) or the summarizer
/// errors, in which case the oldest compressible turns are dropped one
/// at a time until the budget is met.
pub async fn compress(
    messages: Vec<Message>,
    max_tokens: usize,
    is_local_model: bool,
    summarizer: &dyn Summarizer,
) -> Vec<Message> {
    if total_tokens(&messages) <= max_tokens {
        return messages;
    }

    let (system, rest) = split_system(messages);
    if rest.len() <= PRESERVED_TURNS {
        return reassemble(system, Vec::new(), rest);
    }

    let split_at = rest.len() - PRESERVED_TURNS;
    let to_compress = rest[..split_at].to_vec();
    let preserved = rest[split_at..].to_vec();

    if is_local_model {
        return truncate_fallback(system, to_compress, preserved, max_tokens);
    }

    match summarizer.summarize(&to_compress).await {
        Ok(summary_text) => {
            let summary = Message::new(Role::User, summary_text);
            reassemble(system, vec![summary], preserved)
        }
        Err(err) => {
            tracing::warn!(error = %err, "history summarization failed, falling back to truncation");
            truncate_fallback(system, to_compress, preserved, max_tokens)
        }
    }
}

/// Drop the oldest entries of `to_compress` one at a time until the
/// reassembled history fits `max_tokens`, or none are left.
fn truncate_fallback(
    system: Option<Message>,
    mut to_compress: Vec<Message>,
    preserved: Vec<Message>,
    max_tokens: usize,
) -> Vec<Message> {
    loop {
        let assembled = reassemble(system.clone(), to_compress.clone(), preserved.clone());
        if total_tokens(&assembled) <= max_tokens || to_compress.is_empty() {
            return assembled;
        }
        to_compress.remove(0);
    }
}

fn split_system(messages: Vec<Message>) -> (Option<Message>, Vec<Message>) {
    let mut iter = messages.into_iter();
    match iter.next() {
        Some(first) if first.role == Role::System => (Some(first), iter.collect()),
        Some(first) => {
            let mut rest = vec![first];
            rest.extend(iter);
            (None, rest)
        }
        None => (None, Vec::new()),
    }
}

fn reassemble(system: Option<Message>, middle: Vec<Message>, tail: Vec<Message>) -> Vec<Message> {
    let mut out = Vec::with_capacity(middle.len() + tail.len() + 1);
    out.extend(system);
    out.extend(middle);
    out.extend(tail);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSummarizer(&'static str);

    #[async_trait]
    impl Summarizer for FixedSummarizer {
        async fn summarize(&self, _messages: &[Message]) -> Result<String, SummarizeError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Summarizer for FailingSummarizer {
        async fn summarize(&self, _messages: &[Message]) -> Result<String, SummarizeError> {
            Err(SummarizeError::Failed("model unavailable".to_string()))
        }
    }

    fn long_history(turns: usize) -> Vec<Message> {
        let mut messages = vec![Message::new(Role::System, "you are a helpful assistant")];
        for i in 0..turns {
            messages.push(Message::new(Role::User, format!("turn {i} from the user, padded out to a realistic length so it costs real tokens")));
            messages.push(Message::new(Role::Assistant, format!("turn {i} response from the assistant, also padded to a realistic length")));
        }
        messages
    }

    #[test]
    fn estimate_tokens_is_roughly_four_chars_per_token() {
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[tokio::test]
    async fn compress_returns_input_unchanged_when_under_budget() {
        let messages = long_history(2);
        let summarizer = FixedSummarizer("summary");
        let result = compress(messages.clone(), 10_000, false, &summarizer).await;
        assert_eq!(result, messages);
    }

    #[tokio::test]
    async fn compress_preserves_system_message_and_last_turns_verbatim() {
        let messages = long_history(20);
        let preserved_tail = messages[messages.len() - PRESERVED_TURNS..].to_vec();
        let summarizer = FixedSummarizer("a short summary of the earlier conversation");
        let result = compress(messages.clone(), 200, false, &summarizer).await;

        assert_eq!(result[0], messages[0]);
        assert_eq!(&result[result.len() - PRESERVED_TURNS..], &preserved_tail[..]);
        assert!(result.len() < messages.len());
    }

    #[tokio::test]
    async fn compress_falls_back_to_truncation_when_summarizer_fails() {
        let messages = long_history(20);
        let summarizer = FailingSummarizer;
        let result = compress(messages.clone(), 200, false, &summarizer).await;
        assert!(total_tokens(&result) <= 200 || result.len() <= PRESERVED_TURNS + 1);
        assert_eq!(result[0], messages[0]);
    }

    #[tokio::test]
    async fn compress_falls_back_to_truncation_for_local_model_without_calling_summarizer() {
        let messages = long_history(20);
        let summarizer = FailingSummarizer;
        let result = compress(messages.clone(), 200, true, &summarizer).await;
        assert_eq!(result[0], messages[0]);
        let tail = &messages[messages.len() - PRESERVED_TURNS..];
        assert_eq!(&result[result.len() - PRESERVED_TURNS..], tail);
    }

    #[tokio::test]
    async fn short_conversation_is_passed_through_without_a_summary_message() {
        let messages = long_history(1);
        let summarizer = FixedSummarizer("unused");
        let result = compress(messages.clone(), 1, false, &summarizer).await;
        assert_eq!(result, messages);
    }
}
