pub mod chroma;
pub mod pinecone;
pub mod qdrant;

pub use chroma::ChromaStore;
pub use pinecone::PineconeStore;
pub use qdrant::QdrantStore;

use std::{sync::Arc, time::Duration};

use reqwest::{Client, header::HeaderMap};
use serde_json::{Map, Value};

use reunite_config::{VectorBackend, VectorStorage};

use crate::{BoxFuture, Error, RecordId, Result};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VectorHit {
	pub id: RecordId,
	/// In `[0, 1]`, where 1 means identical direction.
	pub similarity: f32,
}

#[derive(Clone, Debug)]
pub struct VectorPoint {
	pub id: RecordId,
	pub vector: Vec<f32>,
	pub payload: Map<String, Value>,
}

/// Nearest-neighbour lookup over profile embeddings.
pub trait VectorStore: Send + Sync {
	fn backend(&self) -> &'static str;

	/// Hits in the order the backend ranks them.
	fn query<'a>(&'a self, embedding: &'a [f32], limit: u64)
	-> BoxFuture<'a, Result<Vec<VectorHit>>>;

	fn count(&self) -> BoxFuture<'_, Result<u64>>;

	fn upsert<'a>(&'a self, points: &'a [VectorPoint]) -> BoxFuture<'a, Result<()>>;
}

pub fn connect(cfg: &VectorStorage) -> Result<Arc<dyn VectorStore>> {
	let missing = || {
		Error::InvalidArgument(format!(
			"storage.vector.{} is not configured.",
			cfg.backend.as_str()
		))
	};
	let store: Arc<dyn VectorStore> = match cfg.backend {
		VectorBackend::Qdrant => {
			let qdrant = cfg.qdrant.as_ref().ok_or_else(missing)?;

			Arc::new(QdrantStore::new(qdrant, &cfg.id_field)?)
		},
		VectorBackend::Chroma => {
			let chroma = cfg.chroma.as_ref().ok_or_else(missing)?;

			Arc::new(ChromaStore::new(chroma, &cfg.id_field)?)
		},
		VectorBackend::Pinecone => {
			let pinecone = cfg.pinecone.as_ref().ok_or_else(missing)?;

			Arc::new(PineconeStore::new(pinecone, &cfg.id_field)?)
		},
	};

	tracing::info!(backend = store.backend(), "Vector store configured.");

	Ok(store)
}

/// Clamps a backend score into `[0, 1]`. Non-finite scores count as no similarity.
pub fn normalize_similarity(score: f32) -> f32 {
	if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 }
}

/// Reads an integer id from a JSON value holding an integer, an integral float or a numeric string.
pub fn json_record_id(value: &Value) -> Option<RecordId> {
	match value {
		Value::Number(number) => number
			.as_i64()
			.or_else(|| number.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64)),
		Value::String(text) => text.trim().parse().ok(),
		_ => None,
	}
}

/// The payload id wins over the store's own point id.
pub(crate) fn resolve_record_id(payload_id: Option<RecordId>, raw_id: &str) -> Option<RecordId> {
	payload_id.or_else(|| raw_id.trim().parse().ok())
}

pub(crate) fn http_client(timeout_ms: u64) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?)
}

pub(crate) async fn send_json(
	client: &Client,
	method: reqwest::Method,
	url: &str,
	headers: HeaderMap,
	body: Option<&Value>,
) -> Result<Value> {
	let mut req = client.request(method, url).headers(headers);

	if let Some(body) = body {
		req = req.json(body);
	}

	let res = req.send().await?;
	let status = res.status();

	if !status.is_success() {
		let message = res.text().await.unwrap_or_default();

		return Err(Error::Http { status: status.as_u16(), message });
	}

	Ok(res.json().await?)
}
