use std::sync::Arc;

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::Value;
use tower::util::ServiceExt;

use reunite_api::{routes, state::AppState};
use reunite_service::CancelSignal;
use reunite_testkit::{FakeEmbedding, FakeVectorStore, ScriptedGeneration, fixtures};

fn app_with(
	profiles: Vec<reunite_storage::Profile>,
	vectors: FakeVectorStore,
	embedding: FakeEmbedding,
	generation: ScriptedGeneration,
) -> (Router, AppState) {
	let service = reunite_testkit::test_service(
		reunite_testkit::test_config(),
		profiles,
		Arc::new(vectors),
		Arc::new(embedding),
		Arc::new(generation),
	);
	let state = AppState::from_service(service);

	(routes::router(state.clone()), state)
}

fn search_request(body: &str) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri("/v1/profiles/search")
		.header("content-type", "application/json")
		.body(Body::from(body.to_string()))
		.expect("Failed to build request.")
}

async fn read_json(response: axum::response::Response) -> Value {
	let bytes =
		body::to_bytes(response.into_body(), usize::MAX).await.expect("Failed to read body.");

	serde_json::from_slice(&bytes).expect("Body is not JSON.")
}

#[tokio::test]
async fn health_ok() {
	let (app, _) = app_with(
		Vec::new(),
		FakeVectorStore::new(Vec::new()),
		FakeEmbedding::new(vec![0.1]),
		ScriptedGeneration::new(),
	);
	let response = app
		.oneshot(Request::builder().uri("/health").body(Body::empty()).expect("Request failed."))
		.await
		.expect("Failed to call /health.");

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn search_returns_verified_profiles() {
	let (app, _) = app_with(
		fixtures::scenario_profiles(30),
		FakeVectorStore::new(vec![fixtures::hit(12, 0.8)]),
		FakeEmbedding::new(vec![0.1]),
		ScriptedGeneration::new().with_keywords("Thương, Đông Hà"),
	);
	let response = app
		.oneshot(search_request(r#"{"query":"Tìm anh Thương ở Đông Hà","top_n_final":3}"#))
		.await
		.expect("Failed to call search.");

	assert_eq!(response.status(), StatusCode::OK);

	let json = read_json(response).await;
	let results = json["results"].as_array().expect("results must be an array");
	let ids: Vec<i64> = results.iter().filter_map(|r| r["id"].as_i64()).collect();

	assert_eq!(ids, vec![12, 1, 2]);
	assert_eq!(results[1]["full_name"], "Lê Văn Thương");
	assert_eq!(results[1]["matched_keywords"], 2);
}

#[tokio::test]
async fn blank_query_is_a_bad_request() {
	let (app, _) = app_with(
		fixtures::scenario_profiles(5),
		FakeVectorStore::new(Vec::new()),
		FakeEmbedding::new(vec![0.1]),
		ScriptedGeneration::new(),
	);
	let response =
		app.oneshot(search_request(r#"{"query":"   "}"#)).await.expect("Failed to call search.");

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(read_json(response).await["error_code"], "invalid_request");
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
	for body in [r#"{"top_n_final":3}"#, r#"{"query":"#] {
		let (app, _) = app_with(
			fixtures::scenario_profiles(5),
			FakeVectorStore::new(Vec::new()),
			FakeEmbedding::new(vec![0.1]),
			ScriptedGeneration::new(),
		);
		let response = app.oneshot(search_request(body)).await.expect("Failed to call search.");

		assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");

		let json = read_json(response).await;

		assert_eq!(json["error_code"], "invalid_request");
		assert!(json["message"].as_str().is_some_and(|m| !m.is_empty()));
	}
}

#[tokio::test]
async fn empty_collection_is_not_found() {
	let (app, _) = app_with(
		Vec::new(),
		FakeVectorStore::new(Vec::new()),
		FakeEmbedding::new(vec![0.1]),
		ScriptedGeneration::new(),
	);
	let response =
		app.oneshot(search_request(r#"{"query":"Tìm bà Hoa"}"#)).await.expect("Failed to call.");

	assert_eq!(response.status(), StatusCode::NOT_FOUND);
	assert_eq!(read_json(response).await["error_code"], "no_profiles");
}

#[tokio::test(start_paused = true)]
async fn unsearchable_query_is_unprocessable() {
	let (app, _) = app_with(
		fixtures::scenario_profiles(5),
		FakeVectorStore::new(Vec::new()),
		FakeEmbedding::failing(503),
		ScriptedGeneration::new(),
	);
	let response =
		app.oneshot(search_request(r#"{"query":"Tìm bà Hoa"}"#)).await.expect("Failed to call.");

	assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
	assert_eq!(read_json(response).await["error_code"], "no_searchable_signal");
}

#[tokio::test]
async fn vector_outage_without_keywords_is_a_bad_gateway() {
	let (app, _) = app_with(
		fixtures::scenario_profiles(5),
		FakeVectorStore::failing(),
		FakeEmbedding::new(vec![0.1]),
		ScriptedGeneration::new(),
	);
	let response =
		app.oneshot(search_request(r#"{"query":"Tìm bà Hoa"}"#)).await.expect("Failed to call.");

	assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
	assert_eq!(read_json(response).await["error_code"], "vector_store_unavailable");
}

#[tokio::test(start_paused = true)]
async fn admission_timeout_is_unavailable() {
	let mut cfg = reunite_testkit::test_config();

	cfg.admission.max_wait_ms = Some(1_000);

	let service = reunite_testkit::test_service(
		cfg,
		fixtures::scenario_profiles(5),
		Arc::new(FakeVectorStore::new(Vec::new())),
		Arc::new(FakeEmbedding::new(vec![0.1])),
		Arc::new(ScriptedGeneration::new()),
	);
	let state = AppState::from_service(service);
	let _holder =
		state.service.admission.admit(&CancelSignal::new()).await.expect("Admission failed.");
	let response = routes::router(state.clone())
		.oneshot(search_request(r#"{"query":"Tìm bà Hoa"}"#))
		.await
		.expect("Failed to call.");

	assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(read_json(response).await["error_code"], "admission_timeout");
	assert_eq!(state.service.admission.len(), 1);
}
