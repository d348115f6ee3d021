use serde_json::Value;

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskType {
	RetrievalDocument,
	RetrievalQuery,
}
impl TaskType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::RetrievalDocument => "RETRIEVAL_DOCUMENT",
			Self::RetrievalQuery => "RETRIEVAL_QUERY",
		}
	}
}

pub async fn embed(
	cfg: &reunite_config::EmbeddingProviderConfig,
	text: &str,
	task_type: TaskType,
	api_key: &str,
) -> Result<Vec<f32>> {
	let url = crate::endpoint(&cfg.api_base, &cfg.path, &cfg.model);
	let body = serde_json::json!({
		"model": format!("models/{}", cfg.model),
		"content": { "parts": [{ "text": text }] },
		"taskType": task_type.as_str(),
	});
	let headers = crate::auth_headers(&cfg.api_key_header, api_key, &cfg.default_headers)?;
	let json = crate::post_json(cfg.timeout_ms, &url, headers, &body).await?;

	parse_embedding_response(json)
}

fn parse_embedding_response(json: Value) -> Result<Vec<f32>> {
	let values = json
		.get("embedding")
		.and_then(|v| v.get("values"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Embedding response is missing embedding.values.".to_string(),
		})?;
	let mut vec = Vec::with_capacity(values.len());

	for value in values {
		let number = value.as_f64().ok_or_else(|| Error::InvalidResponse {
			message: "Embedding value must be numeric.".to_string(),
		})?;

		vec.push(number as f32);
	}

	if vec.is_empty() {
		return Err(Error::InvalidResponse {
			message: "Embedding response contains an empty vector.".to_string(),
		});
	}

	Ok(vec)
}
