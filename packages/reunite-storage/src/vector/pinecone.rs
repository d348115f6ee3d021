use reqwest::{
	Client, Method,
	header::{HeaderMap, HeaderName, HeaderValue},
};
use serde_json::Value;

use crate::{
	BoxFuture, Error, Result,
	vector::{self, VectorHit, VectorPoint, VectorStore},
};

/// Pinecone's data-plane caps `topK` at this value.
const MAX_TOP_K: u64 = 10_000;

pub struct PineconeStore {
	client: Client,
	host: String,
	api_key: String,
	namespace: Option<String>,
	id_field: String,
}
impl PineconeStore {
	pub fn new(cfg: &reunite_config::Pinecone, id_field: &str) -> Result<Self> {
		let host = cfg.host.trim_end_matches('/');
		let host = if host.starts_with("http://") || host.starts_with("https://") {
			host.to_string()
		} else {
			format!("https://{host}")
		};

		Ok(Self {
			client: vector::http_client(cfg.timeout_ms)?,
			host,
			api_key: cfg.api_key.clone(),
			namespace: cfg.namespace.clone(),
			id_field: id_field.to_string(),
		})
	}

	fn headers(&self) -> Result<HeaderMap> {
		let mut headers = HeaderMap::new();
		let mut value = HeaderValue::from_str(&self.api_key)
			.map_err(|err| Error::InvalidArgument(format!("Invalid Pinecone API key: {err}.")))?;

		value.set_sensitive(true);
		headers.insert(HeaderName::from_static("api-key"), value);

		Ok(headers)
	}

	async fn post(&self, path: &str, body: &Value) -> Result<Value> {
		let url = format!("{}{path}", self.host);

		vector::send_json(&self.client, Method::POST, &url, self.headers()?, Some(body)).await
	}

	async fn query_points(&self, embedding: &[f32], limit: u64) -> Result<Vec<VectorHit>> {
		let mut body = serde_json::json!({
			"vector": embedding,
			"topK": limit.min(MAX_TOP_K),
			"includeMetadata": true,
		});

		if let Some(namespace) = self.namespace.as_ref() {
			body["namespace"] = Value::from(namespace.clone());
		}

		let json = self.post("/query", &body).await?;

		parse_query_response(&json, &self.id_field)
	}

	async fn count_points(&self) -> Result<u64> {
		let json = self.post("/describe_index_stats", &serde_json::json!({})).await?;
		let count = match self.namespace.as_deref() {
			Some(namespace) => json
				.get("namespaces")
				.and_then(|v| v.get(namespace))
				.and_then(|v| v.get("vectorCount"))
				.and_then(|v| v.as_u64())
				.unwrap_or(0),
			None => json.get("totalVectorCount").and_then(|v| v.as_u64()).ok_or_else(|| {
				Error::InvalidResponse {
					message: "Pinecone stats response is missing totalVectorCount.".to_string(),
				}
			})?,
		};

		Ok(count)
	}

	async fn upsert_points(&self, points: &[VectorPoint]) -> Result<()> {
		if points.is_empty() {
			return Ok(());
		}

		let vectors: Vec<Value> = points
			.iter()
			.map(|point| {
				let mut metadata = point.payload.clone();

				metadata.insert(self.id_field.clone(), Value::from(point.id));

				serde_json::json!({
					"id": point.id.to_string(),
					"values": point.vector,
					"metadata": metadata,
				})
			})
			.collect();
		let mut body = serde_json::json!({ "vectors": vectors });

		if let Some(namespace) = self.namespace.as_ref() {
			body["namespace"] = Value::from(namespace.clone());
		}

		self.post("/vectors/upsert", &body).await?;

		Ok(())
	}
}
impl VectorStore for PineconeStore {
	fn backend(&self) -> &'static str {
		"pinecone"
	}

	fn query<'a>(
		&'a self,
		embedding: &'a [f32],
		limit: u64,
	) -> BoxFuture<'a, Result<Vec<VectorHit>>> {
		Box::pin(self.query_points(embedding, limit))
	}

	fn count(&self) -> BoxFuture<'_, Result<u64>> {
		Box::pin(self.count_points())
	}

	fn upsert<'a>(&'a self, points: &'a [VectorPoint]) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.upsert_points(points))
	}
}

fn parse_query_response(json: &Value, id_field: &str) -> Result<Vec<VectorHit>> {
	let matches = json.get("matches").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "Pinecone query response is missing matches.".to_string() }
	})?;
	let mut hits = Vec::with_capacity(matches.len());

	for item in matches {
		let raw_id = item.get("id").and_then(|v| v.as_str()).unwrap_or_default();
		let payload_id =
			item.get("metadata").and_then(|m| m.get(id_field)).and_then(vector::json_record_id);
		let score = item.get("score").and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;

		match vector::resolve_record_id(payload_id, raw_id) {
			Some(id) => hits.push(VectorHit { id, similarity: vector::normalize_similarity(score) }),
			None => tracing::warn!(raw_id, "Skipping Pinecone hit without a numeric profile id."),
		}
	}

	Ok(hits)
}
