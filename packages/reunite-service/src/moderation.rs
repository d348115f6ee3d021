use regex::Regex;
use serde::Deserialize;

use reunite_config::{LlmProviderConfig, SearchModeration, SearchVerify};
use reunite_providers::generation::{GenerateRequest, Generation};

use crate::{
	GenerationProvider, prompts,
	retry::{RetryDecision, RetryPolicy},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
	Allowed,
	Rejected { feedback: String },
}

#[derive(Deserialize)]
struct RawVerdict {
	#[serde(default = "default_appropriate")]
	is_appropriate: bool,
	#[serde(default)]
	feedback: String,
}

/// Screens `query` with the LLM. Fails open: only an explicit negative verdict rejects.
pub async fn check_query(
	provider: &dyn GenerationProvider,
	llm: &LlmProviderConfig,
	cfg: &SearchModeration,
	retry: &SearchVerify,
	keys: &[String],
	query: &str,
) -> Verdict {
	let req = GenerateRequest {
		prompt: prompts::moderation_prompt(query),
		temperature: cfg.temperature,
		max_output_tokens: cfg.max_output_tokens,
	};
	let result = RetryPolicy::for_generation(retry)
		.run(keys, 0, |key| provider.generate(llm, &req, key), |err| {
			if err.is_transient() { RetryDecision::Retry } else { RetryDecision::Stop }
		})
		.await;

	match result {
		Ok(Generation::Text(text)) => parse_verdict(&text).unwrap_or_else(|| {
			tracing::warn!("Moderation reply had no readable verdict. Allowing query.");

			Verdict::Allowed
		}),
		Ok(Generation::Blocked(reason)) => {
			tracing::warn!(reason = %reason, "Moderation call was blocked. Allowing query.");

			Verdict::Allowed
		},
		Err(err) => {
			tracing::warn!(error = %err, "Moderation call failed. Allowing query.");

			Verdict::Allowed
		},
	}
}

/// Reads the first `{...}` span of `text` as a verdict.
pub fn parse_verdict(text: &str) -> Option<Verdict> {
	let re = Regex::new(r"(\{[\s\S]*\})").ok()?;
	let raw = re.captures(text)?.get(1)?.as_str();
	let verdict: RawVerdict = serde_json::from_str(raw).ok()?;

	if verdict.is_appropriate {
		Some(Verdict::Allowed)
	} else {
		Some(Verdict::Rejected { feedback: verdict.feedback })
	}
}

fn default_appropriate() -> bool {
	true
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reads_json_inside_fenced_reply() {
		let text = "```json\n{\"is_appropriate\": false, \"feedback\": \"Spam.\"}\n```";

		assert_eq!(parse_verdict(text), Some(Verdict::Rejected { feedback: "Spam.".to_string() }));
	}

	#[test]
	fn missing_fields_default_to_allowed() {
		assert_eq!(parse_verdict("{}"), Some(Verdict::Allowed));
	}

	#[test]
	fn unreadable_reply_has_no_verdict() {
		assert_eq!(parse_verdict("I cannot decide."), None);
		assert_eq!(parse_verdict("{not json}"), None);
	}
}
