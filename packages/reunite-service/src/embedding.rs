use reunite_config::{EmbeddingProviderConfig, SearchEmbedding};
use reunite_providers::{Error as ProviderError, embedding::TaskType};

use crate::{
	EmbeddingProvider, Error, Result,
	retry::{RetryDecision, RetryPolicy},
};

/// Embeds `text`, rotating through `keys` on repeated transient failures.
pub async fn embed_text(
	provider: &dyn EmbeddingProvider,
	provider_cfg: &EmbeddingProviderConfig,
	cfg: &SearchEmbedding,
	keys: &[String],
	text: &str,
	task_type: TaskType,
) -> Result<Vec<f32>> {
	if text.trim().is_empty() {
		return Err(Error::InvalidRequest { message: "Nothing to embed.".to_string() });
	}

	let text = truncate_chars(text, cfg.max_chars);
	let policy = RetryPolicy::for_embedding(cfg);

	policy
		.run(keys, 0, |key| provider.embed(provider_cfg, text, task_type, key), classify)
		.await
		.map_err(|err| Error::Provider { message: format!("Embedding failed. {err}") })
}

/// Longest prefix of at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
	match text.char_indices().nth(max_chars) {
		Some((byte_index, _)) => &text[..byte_index],
		None => text,
	}
}

fn classify(err: &ProviderError) -> RetryDecision {
	if err.is_credential_error() {
		return RetryDecision::Rotate;
	}

	match err.status() {
		Some(status) if (400..500).contains(&status) && status != 429 => RetryDecision::Stop,
		_ => RetryDecision::Retry,
	}
}
