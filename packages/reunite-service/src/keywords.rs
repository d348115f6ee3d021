use reunite_config::{LlmProviderConfig, SearchKeywords};
use reunite_providers::generation::{GenerateRequest, Generation};

use crate::{GenerationProvider, prompts};

/// Asks the LLM for salient search terms. Any failure yields an empty list.
pub async fn extract_keywords(
	provider: &dyn GenerationProvider,
	llm: &LlmProviderConfig,
	cfg: &SearchKeywords,
	api_key: &str,
	query: &str,
) -> Vec<String> {
	let req = GenerateRequest {
		prompt: prompts::keyword_prompt(query),
		temperature: cfg.temperature,
		max_output_tokens: cfg.max_output_tokens,
	};

	match provider.generate(llm, &req, api_key).await {
		Ok(Generation::Text(text)) => {
			let keywords = split_keywords(&text);

			tracing::debug!(count = keywords.len(), "Keywords extracted.");

			keywords
		},
		Ok(Generation::Blocked(reason)) => {
			tracing::warn!(
				reason = %reason,
				"Keyword extraction was blocked. Continuing without keywords."
			);

			Vec::new()
		},
		Err(err) => {
			tracing::warn!(error = %err, "Keyword extraction failed. Continuing without keywords.");

			Vec::new()
		},
	}
}

/// Splits on commas and newlines, trimming and dropping empty tokens.
pub fn split_keywords(text: &str) -> Vec<String> {
	text.split([',', '\n'])
		.map(str::trim)
		.filter(|token| !token.is_empty())
		.map(str::to_string)
		.collect()
}
