use reqwest::{Client, Method, header::HeaderMap};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::{
	BoxFuture, Error, Result,
	vector::{self, VectorHit, VectorPoint, VectorStore},
};

/// Chroma over its v1 REST API. Distances are cosine distances.
pub struct ChromaStore {
	client: Client,
	base_url: String,
	collection: String,
	id_field: String,
	collection_id: OnceCell<String>,
}
impl ChromaStore {
	pub fn new(cfg: &reunite_config::Chroma, id_field: &str) -> Result<Self> {
		Ok(Self {
			client: vector::http_client(cfg.timeout_ms)?,
			base_url: cfg.url.trim_end_matches('/').to_string(),
			collection: cfg.collection.clone(),
			id_field: id_field.to_string(),
			collection_id: OnceCell::new(),
		})
	}

	async fn collection_id(&self) -> Result<&str> {
		let id = self
			.collection_id
			.get_or_try_init(|| async {
				let url = format!("{}/api/v1/collections/{}", self.base_url, self.collection);
				let json =
					vector::send_json(&self.client, Method::GET, &url, HeaderMap::new(), None)
						.await?;

				json.get("id").and_then(|v| v.as_str()).map(str::to_string).ok_or_else(|| {
					Error::NotFound(format!("Chroma collection {}.", self.collection))
				})
			})
			.await?;

		Ok(id.as_str())
	}

	async fn collection_url(&self, op: &str) -> Result<String> {
		let id = self.collection_id().await?;

		Ok(format!("{}/api/v1/collections/{id}/{op}", self.base_url))
	}

	async fn query_points(&self, embedding: &[f32], limit: u64) -> Result<Vec<VectorHit>> {
		let n_results = limit.min(self.count_points().await?);

		if n_results == 0 {
			return Ok(Vec::new());
		}

		let url = self.collection_url("query").await?;
		let body = serde_json::json!({
			"query_embeddings": [embedding],
			"n_results": n_results,
			"include": ["metadatas", "distances"],
		});
		let json =
			vector::send_json(&self.client, Method::POST, &url, HeaderMap::new(), Some(&body))
				.await?;

		parse_query_response(&json, &self.id_field)
	}

	async fn count_points(&self) -> Result<u64> {
		let url = self.collection_url("count").await?;
		let json = vector::send_json(&self.client, Method::GET, &url, HeaderMap::new(), None).await?;

		json.as_u64().ok_or_else(|| Error::InvalidResponse {
			message: "Chroma count response must be an integer.".to_string(),
		})
	}

	async fn upsert_points(&self, points: &[VectorPoint]) -> Result<()> {
		if points.is_empty() {
			return Ok(());
		}

		let url = self.collection_url("upsert").await?;
		let ids: Vec<String> = points.iter().map(|point| point.id.to_string()).collect();
		let embeddings: Vec<&[f32]> = points.iter().map(|point| point.vector.as_slice()).collect();
		let metadatas: Vec<Value> = points
			.iter()
			.map(|point| {
				let mut metadata = point.payload.clone();

				metadata.insert(self.id_field.clone(), Value::from(point.id));

				Value::Object(metadata)
			})
			.collect();
		let body = serde_json::json!({
			"ids": ids,
			"embeddings": embeddings,
			"metadatas": metadatas,
		});

		vector::send_json(&self.client, Method::POST, &url, HeaderMap::new(), Some(&body)).await?;

		Ok(())
	}
}
impl VectorStore for ChromaStore {
	fn backend(&self) -> &'static str {
		"chroma"
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

fn first_row<'a>(json: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
	json.get(key)?.as_array()?.first()?.as_array()
}

fn parse_query_response(json: &Value, id_field: &str) -> Result<Vec<VectorHit>> {
	let ids = first_row(json, "ids").ok_or_else(|| Error::InvalidResponse {
		message: "Chroma query response is missing ids.".to_string(),
	})?;
	let distances = first_row(json, "distances").ok_or_else(|| Error::InvalidResponse {
		message: "Chroma query response is missing distances.".to_string(),
	})?;
	let metadatas = first_row(json, "metadatas");
	let mut hits = Vec::with_capacity(ids.len());

	for (index, raw_id) in ids.iter().enumerate() {
		let Some(distance) = distances.get(index).and_then(|v| v.as_f64()) else {
			continue;
		};
		let payload_id = metadatas
			.and_then(|rows| rows.get(index))
			.and_then(|metadata| metadata.get(id_field))
			.and_then(vector::json_record_id);
		let raw_id = raw_id.as_str().unwrap_or_default();

		match vector::resolve_record_id(payload_id, raw_id) {
			Some(id) => hits.push(VectorHit {
				id,
				similarity: vector::normalize_similarity(1.0 - distance as f32),
			}),
			None => tracing::warn!(raw_id, "Skipping Chroma hit without a numeric profile id."),
		}
	}

	Ok(hits)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn converts_distances_to_similarity() {
		let json = serde_json::json!({
			"ids": [["3", "uuid-like", "8"]],
			"distances": [[0.25, 0.1, 1.4]],
			"metadatas": [[null, { "id": 11 }, { "title": "x" }]],
		});
		let hits = parse_query_response(&json, "id").expect("parse failed");

		assert_eq!(hits, vec![
			VectorHit { id: 3, similarity: 0.75 },
			VectorHit { id: 11, similarity: 0.9 },
			VectorHit { id: 8, similarity: 0.0 },
		]);
	}

	#[test]
	fn missing_ids_is_an_error() {
		let json = serde_json::json!({ "distances": [[0.1]] });

		assert!(parse_query_response(&json, "id").is_err());
	}
}
