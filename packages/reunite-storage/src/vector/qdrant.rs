use std::collections::HashMap;

use qdrant_client::{
	Payload, Qdrant,
	qdrant::{
		CountPointsBuilder, PointId, PointStruct, Query, QueryPointsBuilder, ScoredPoint,
		UpsertPointsBuilder, Value, point_id::PointIdOptions, value::Kind,
	},
};

use crate::{
	BoxFuture, Error, RecordId, Result,
	vector::{self, VectorHit, VectorPoint, VectorStore},
};

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	id_field: String,
}
impl QdrantStore {
	pub fn new(cfg: &reunite_config::Qdrant, id_field: &str) -> Result<Self> {
		let mut builder = Qdrant::from_url(&cfg.url);

		if let Some(api_key) = cfg.api_key.as_ref() {
			builder = builder.api_key(api_key.clone());
		}

		let client = builder.build()?;

		Ok(Self { client, collection: cfg.collection.clone(), id_field: id_field.to_string() })
	}

	async fn query_points(&self, embedding: &[f32], limit: u64) -> Result<Vec<VectorHit>> {
		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(embedding.to_vec()))
			.limit(limit)
			.with_payload(true);
		let response = self.client.query(search).await?;
		let mut hits = Vec::with_capacity(response.result.len());

		for point in &response.result {
			match hit_from_point(point, &self.id_field) {
				Some(hit) => hits.push(hit),
				None => tracing::warn!(
					collection = %self.collection,
					"Skipping Qdrant hit without a numeric profile id."
				),
			}
		}

		Ok(hits)
	}

	async fn count_points(&self) -> Result<u64> {
		let response =
			self.client.count(CountPointsBuilder::new(self.collection.clone()).exact(true)).await?;

		Ok(response.result.map(|result| result.count).unwrap_or(0))
	}

	async fn upsert_points(&self, points: &[VectorPoint]) -> Result<()> {
		let mut structs = Vec::with_capacity(points.len());

		for point in points {
			let id = u64::try_from(point.id).map_err(|_| {
				Error::InvalidArgument(format!("Qdrant point id must be non-negative: {}.", point.id))
			})?;
			let mut payload_map = HashMap::new();

			for (key, value) in &point.payload {
				payload_map.insert(key.clone(), Value::from(value.clone()));
			}

			payload_map.insert(self.id_field.clone(), Value::from(point.id));

			structs.push(PointStruct::new(id, point.vector.clone(), Payload::from(payload_map)));
		}

		let upsert = UpsertPointsBuilder::new(self.collection.clone(), structs).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}
}
impl VectorStore for QdrantStore {
	fn backend(&self) -> &'static str {
		"qdrant"
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

fn hit_from_point(point: &ScoredPoint, id_field: &str) -> Option<VectorHit> {
	let raw_id = point.id.as_ref().map(point_id_to_string).unwrap_or_default();
	let id = vector::resolve_record_id(payload_record_id(&point.payload, id_field), &raw_id)?;

	Some(VectorHit { id, similarity: vector::normalize_similarity(point.score) })
}

fn point_id_to_string(point_id: &PointId) -> String {
	match &point_id.point_id_options {
		Some(PointIdOptions::Num(id)) => id.to_string(),
		Some(PointIdOptions::Uuid(id)) => id.clone(),
		None => String::new(),
	}
}

fn payload_record_id(payload: &HashMap<String, Value>, key: &str) -> Option<RecordId> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::IntegerValue(value)) => Some(*value),
		Some(Kind::DoubleValue(value)) =>
			if value.fract() == 0.0 {
				Some(*value as i64)
			} else {
				None
			},
		Some(Kind::StringValue(text)) => text.trim().parse().ok(),
		_ => None,
	}
}
