use serde_json::Value;

use crate::{Error, Result};

const SAFETY_CATEGORIES: [&str; 4] = [
	"HARM_CATEGORY_HARASSMENT",
	"HARM_CATEGORY_HATE_SPEECH",
	"HARM_CATEGORY_SEXUALLY_EXPLICIT",
	"HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Clone, Debug)]
pub struct GenerateRequest {
	pub prompt: String,
	pub temperature: f32,
	pub max_output_tokens: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Generation {
	Text(String),
	/// The provider refused to answer. Carries the block or finish reason.
	Blocked(String),
}

pub async fn generate(
	cfg: &reunite_config::LlmProviderConfig,
	req: &GenerateRequest,
	api_key: &str,
) -> Result<Generation> {
	let url = crate::endpoint(&cfg.api_base, &cfg.path, &cfg.model);
	let safety_settings: Vec<Value> = SAFETY_CATEGORIES
		.iter()
		.map(|category| {
			serde_json::json!({ "category": category, "threshold": cfg.safety_threshold })
		})
		.collect();
	let body = serde_json::json!({
		"contents": [{ "parts": [{ "text": req.prompt }] }],
		"generationConfig": {
			"temperature": req.temperature,
			"maxOutputTokens": req.max_output_tokens,
		},
		"safetySettings": safety_settings,
	});
	let headers = crate::auth_headers(&cfg.api_key_header, api_key, &cfg.default_headers)?;
	let json = crate::post_json(cfg.timeout_ms, &url, headers, &body).await?;

	parse_generation_response(&json)
}

fn parse_generation_response(json: &Value) -> Result<Generation> {
	if let Some(reason) = json
		.get("promptFeedback")
		.and_then(|v| v.get("blockReason"))
		.and_then(|v| v.as_str())
	{
		return Ok(Generation::Blocked(reason.to_string()));
	}

	let candidate = json
		.get("candidates")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Generation response has no candidates.".to_string(),
		})?;
	let text: Option<String> = candidate
		.get("content")
		.and_then(|c| c.get("parts"))
		.and_then(|p| p.as_array())
		.map(|parts| parts.iter().filter_map(|part| part.get("text")?.as_str()).collect());

	match text {
		Some(text) if !text.is_empty() => Ok(Generation::Text(text)),
		_ => match candidate.get("finishReason").and_then(|v| v.as_str()) {
			Some(reason @ ("SAFETY" | "BLOCKLIST" | "PROHIBITED_CONTENT")) =>
				Ok(Generation::Blocked(reason.to_string())),
			_ => Err(Error::InvalidResponse {
				message: "Generation response has no text.".to_string(),
			}),
		},
	}
}
