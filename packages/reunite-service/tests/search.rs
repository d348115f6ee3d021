use std::{
	collections::HashSet,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use reunite_providers::{Error as ProviderError, generation::Generation};
use reunite_service::{CancelSignal, Error, SearchRequest, Stage};
use reunite_storage::{RecordId, vector::VectorHit};
use reunite_testkit::{
	FakeEmbedding, FakeVectorStore, PromptKind, RecordingProgress, ScriptedGeneration,
	fixtures::{self, hit},
	id_lines,
};

const KEYWORDS: &str = "Thương, Đông Hà";
const QUERY: &str = "Tìm anh Lê Văn Thương, thất lạc năm 1984 tại ga Đông Hà.";

fn close(a: f32, b: f32) -> bool {
	(a - b).abs() < 1e-5
}

/// Three of the five keyword profiles plus 47 filler ids, similarity descending from 0.9.
fn scenario_hits() -> Vec<VectorHit> {
	let mut hits = vec![hit(1, 0.9), hit(2, 0.8), hit(3, 0.7)];

	hits.extend((0..47).map(|i| hit(100 + i, 0.5 - i as f32 * 0.005)));

	hits
}

#[tokio::test(start_paused = true)]
async fn overlapping_and_keyword_only_candidates_are_fused_and_verified() {
	let vectors = Arc::new(FakeVectorStore::new(scenario_hits()));
	let generation = Arc::new(ScriptedGeneration::new().with_keywords(KEYWORDS));
	let service = reunite_testkit::test_service(
		reunite_testkit::test_config(),
		fixtures::scenario_profiles(1_000),
		vectors.clone(),
		Arc::new(FakeEmbedding::new(vec![0.1, 0.2, 0.3])),
		generation.clone(),
	);
	let response = service.search(SearchRequest::new(QUERY)).await.expect("Search failed.");
	let results = &response.results;

	assert_eq!(results.len(), 52);
	assert_eq!(results.iter().take(3).map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
	assert!(close(results[0].total_score, 1.0));
	assert!(close(results[0].keyword_score, 0.10));
	assert_eq!(results[0].matched_keywords, 2);
	assert_eq!(results[0].full_name.as_deref(), Some("Lê Văn Thương"));

	let tail: Vec<RecordId> = results.iter().rev().take(2).map(|r| r.id).collect();

	assert_eq!(tail, vec![5, 4]);

	for keyword_only in results.iter().rev().take(2) {
		assert!(close(keyword_only.total_score, 0.10));
		assert_eq!(keyword_only.vector_score, 0.0);
	}

	assert!(results.windows(2).all(|pair| pair[0].total_score >= pair[1].total_score));
	assert_eq!(vectors.queries(), vec![50]);

	let verified: HashSet<RecordId> = generation
		.calls_of(PromptKind::Verify)
		.into_iter()
		.flat_map(|call| call.batch)
		.collect();

	assert_eq!(verified.len(), 52);
}

#[tokio::test(start_paused = true)]
async fn ranked_list_is_truncated_before_verification() {
	let generation = Arc::new(ScriptedGeneration::new().with_keywords(KEYWORDS));
	let service = reunite_testkit::test_service(
		reunite_testkit::test_config(),
		fixtures::scenario_profiles(1_000),
		Arc::new(FakeVectorStore::new(scenario_hits())),
		Arc::new(FakeEmbedding::new(vec![0.1])),
		generation.clone(),
	);
	let req = SearchRequest { top_n_final: Some(4), ..SearchRequest::new(QUERY) };
	let response = service.search(req).await.expect("Search failed.");

	assert_eq!(response.results.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3, 100]);

	let req = SearchRequest { max_verify: Some(2), ..SearchRequest::new(QUERY) };
	let response = service.search(req).await.expect("Search failed.");

	assert_eq!(response.results.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn embedding_exhaustion_falls_back_to_keyword_ranking() {
	let vectors = Arc::new(FakeVectorStore::new(scenario_hits()));
	let embedding = Arc::new(FakeEmbedding::failing(503));
	let generation = Arc::new(ScriptedGeneration::new().with_keywords(KEYWORDS));
	let service = reunite_testkit::test_service(
		reunite_testkit::test_config(),
		fixtures::scenario_profiles(200),
		vectors.clone(),
		embedding.clone(),
		generation.clone(),
	);
	let response = service.search(SearchRequest::new(QUERY)).await.expect("Search failed.");

	assert_eq!(embedding.calls().len(), 15);
	assert!(vectors.queries().is_empty());
	assert_eq!(response.results.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
	assert!(response.results.iter().all(|r| r.vector_score == 0.0));
	assert!(!generation.calls_of(PromptKind::Verify).is_empty());
}

#[tokio::test(start_paused = true)]
async fn embedding_rotates_credentials_after_consecutive_failures() {
	let embedding = Arc::new(FakeEmbedding::new(vec![0.4]).with_failures([
		(503, "unavailable"),
		(503, "unavailable"),
		(503, "unavailable"),
		(429, "quota"),
	]));
	let service = reunite_testkit::test_service(
		reunite_testkit::test_config(),
		fixtures::scenario_profiles(20),
		Arc::new(FakeVectorStore::new(vec![hit(1, 0.9)])),
		embedding.clone(),
		Arc::new(ScriptedGeneration::new()),
	);
	let started = tokio::time::Instant::now();
	let response = service.search(SearchRequest::new(QUERY)).await.expect("Search failed.");

	assert_eq!(embedding.calls(), vec!["key-a", "key-a", "key-a", "key-b", "key-b"]);
	// 5 s and 10 s on the first credential, then 5 s after the fresh credential's first failure.
	assert_eq!(started.elapsed(), Duration::from_secs(20));
	assert_eq!(response.results.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn vector_failure_without_keyword_matches_is_fatal() {
	let generation = Arc::new(ScriptedGeneration::new());
	let service = reunite_testkit::test_service(
		reunite_testkit::test_config(),
		fixtures::scenario_profiles(50),
		Arc::new(FakeVectorStore::failing()),
		Arc::new(FakeEmbedding::new(vec![0.1])),
		generation.clone(),
	);
	let err = service.search(SearchRequest::new(QUERY)).await.expect_err("Expected failure.");

	assert!(matches!(err, Error::VectorStore { .. }), "Unexpected error: {err:?}");
	assert!(generation.calls_of(PromptKind::Verify).is_empty());
	assert!(service.admission.is_empty());
}

#[tokio::test(start_paused = true)]
async fn vector_failure_with_keyword_matches_degrades() {
	let service = reunite_testkit::test_service(
		reunite_testkit::test_config(),
		fixtures::scenario_profiles(50),
		Arc::new(FakeVectorStore::failing()),
		Arc::new(FakeEmbedding::new(vec![0.1])),
		Arc::new(ScriptedGeneration::new().with_keywords(KEYWORDS)),
	);
	let response = service.search(SearchRequest::new(QUERY)).await.expect("Search failed.");

	assert_eq!(response.results.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn no_keywords_and_no_embedding_is_unsearchable() {
	let service = reunite_testkit::test_service(
		reunite_testkit::test_config(),
		fixtures::scenario_profiles(50),
		Arc::new(FakeVectorStore::new(scenario_hits())),
		Arc::new(FakeEmbedding::failing(503)),
		Arc::new(ScriptedGeneration::new()),
	);
	let err = service.search(SearchRequest::new(QUERY)).await.expect_err("Expected failure.");

	assert!(matches!(err, Error::NoSearchableSignal), "Unexpected error: {err:?}");
}

#[tokio::test]
async fn empty_record_source_and_blank_query_are_rejected() {
	let service = reunite_testkit::test_service(
		reunite_testkit::test_config(),
		Vec::new(),
		Arc::new(FakeVectorStore::new(Vec::new())),
		Arc::new(FakeEmbedding::new(vec![0.1])),
		Arc::new(ScriptedGeneration::new()),
	);
	let err = service.search(SearchRequest::new(QUERY)).await.expect_err("Expected failure.");

	assert!(matches!(err, Error::NoProfiles), "Unexpected error: {err:?}");

	let err = service.search(SearchRequest::new("   ")).await.expect_err("Expected failure.");

	assert!(matches!(err, Error::InvalidRequest { .. }), "Unexpected error: {err:?}");
	assert!(service.admission.is_empty());
}

#[tokio::test(start_paused = true)]
async fn verifier_output_is_restricted_to_its_batch() {
	let generation = Arc::new(ScriptedGeneration::new().with_keywords(KEYWORDS).with_verifier(
		|batch, _| {
			let mut reply: Vec<String> =
				batch.iter().filter(|id| **id % 2 == 1).map(RecordId::to_string).collect();

			reply.push("999".to_string());

			Ok(Generation::Text(reply.join("\n")))
		},
	));
	let service = reunite_testkit::test_service(
		reunite_testkit::test_config(),
		fixtures::scenario_profiles(20),
		Arc::new(FakeVectorStore::new(Vec::new())),
		Arc::new(FakeEmbedding::new(vec![0.1])),
		generation,
	);
	let response = service.search(SearchRequest::new(QUERY)).await.expect("Search failed.");

	assert_eq!(response.results.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3, 5]);
}

#[tokio::test(start_paused = true)]
async fn verifier_replying_none_yields_no_results() {
	let generation = Arc::new(
		ScriptedGeneration::new()
			.with_keywords(KEYWORDS)
			.with_verifier(|_, _| Ok(Generation::Text(" None \n".to_string()))),
	);
	let service = reunite_testkit::test_service(
		reunite_testkit::test_config(),
		fixtures::scenario_profiles(20),
		Arc::new(FakeVectorStore::new(scenario_hits())),
		Arc::new(FakeEmbedding::new(vec![0.1])),
		generation.clone(),
	);
	let response = service.search(SearchRequest::new(QUERY)).await.expect("Search failed.");

	assert!(response.results.is_empty());
	assert!(!generation.calls_of(PromptKind::Verify).is_empty());
}

#[tokio::test(start_paused = true)]
async fn batches_use_credentials_by_global_index_and_groups_are_spaced() {
	let generation = Arc::new(ScriptedGeneration::new());
	let hits: Vec<VectorHit> = (1..=12).map(|id| hit(id, 1.0 - id as f32 * 0.01)).collect();
	let service = reunite_testkit::test_service(
		reunite_testkit::test_config(),
		fixtures::scenario_profiles(20),
		Arc::new(FakeVectorStore::new(hits)),
		Arc::new(FakeEmbedding::new(vec![0.1])),
		generation.clone(),
	);
	let response = service.search(SearchRequest::new(QUERY)).await.expect("Search failed.");

	assert_eq!(response.results.len(), 12);

	let mut calls = generation.calls_of(PromptKind::Verify);

	calls.sort_by_key(|call| call.batch[0]);

	let keys: Vec<&str> = calls.iter().map(|call| call.key.as_str()).collect();

	assert_eq!(keys, vec!["key-a", "key-b", "key-c", "key-a"]);
	assert_eq!(calls[3].batch, vec![10, 11, 12]);
	// Three credentials make a group of three batches, then the fourth after the delay.
	assert_eq!(calls[0].at, calls[2].at);
	assert_eq!(calls[3].at - calls[0].at, Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_verification_discards_partial_results() {
	let cancel = Arc::new(CancelSignal::new());
	let trigger = cancel.clone();
	let generation = Arc::new(ScriptedGeneration::new().with_verifier(move |batch, _| {
		trigger.cancel();

		Ok(Generation::Text(id_lines(batch)))
	}));
	let hits: Vec<VectorHit> = (1..=12).map(|id| hit(id, 1.0 - id as f32 * 0.01)).collect();
	let service = reunite_testkit::test_service(
		reunite_testkit::test_config(),
		fixtures::scenario_profiles(20),
		Arc::new(FakeVectorStore::new(hits)),
		Arc::new(FakeEmbedding::new(vec![0.1])),
		generation.clone(),
	);
	let started = tokio::time::Instant::now();
	let result = service.search_with_cancel(SearchRequest::new(QUERY), &cancel).await;

	assert!(matches!(result, Err(Error::Cancelled)));
	// Only the first group ran, and the delay before the second was cut short.
	assert_eq!(generation.calls_of(PromptKind::Verify).len(), 3);
	assert!(started.elapsed() < Duration::from_secs(2));
	assert!(service.admission.is_empty());
}

#[tokio::test(start_paused = true)]
async fn transient_verifier_errors_retry_and_credential_errors_abandon() {
	let attempts = Arc::new(AtomicUsize::new(0));
	let seen = attempts.clone();
	let generation = Arc::new(ScriptedGeneration::new().with_verifier(move |batch, key| {
		match key {
			"key-a" if seen.fetch_add(1, Ordering::SeqCst) < 2 =>
				Err(ProviderError::Http { status: 429, message: "quota".to_string() }),
			"key-b" => Err(ProviderError::Http {
				status: 400,
				message: "API key not valid. Please pass a valid API key.".to_string(),
			}),
			_ => Ok(Generation::Text(id_lines(batch))),
		}
	}));
	let hits: Vec<VectorHit> = (1..=9).map(|id| hit(id, 1.0 - id as f32 * 0.01)).collect();
	let service = reunite_testkit::test_service(
		reunite_testkit::test_config(),
		fixtures::scenario_profiles(20),
		Arc::new(FakeVectorStore::new(hits)),
		Arc::new(FakeEmbedding::new(vec![0.1])),
		generation.clone(),
	);
	let response = service.search(SearchRequest::new(QUERY)).await.expect("Search failed.");

	assert_eq!(
		response.results.iter().map(|r| r.id).collect::<Vec<_>>(),
		vec![1, 2, 3, 7, 8, 9]
	);

	let calls = generation.calls_of(PromptKind::Verify);

	assert_eq!(calls.iter().filter(|call| call.key == "key-a").count(), 3);
	assert_eq!(calls.iter().filter(|call| call.key == "key-b").count(), 1);
}

#[tokio::test(start_paused = true)]
async fn moderation_rejects_only_on_an_explicit_verdict() {
	let mut cfg = reunite_testkit::test_config();

	cfg.search.moderation.enabled = true;

	let rejecting = Arc::new(ScriptedGeneration::new().with_keywords(KEYWORDS).with_moderation(
		r#"Verdict: {"is_appropriate": false, "feedback": "Contains advertising."}"#,
	));
	let service = reunite_testkit::test_service(
		cfg.clone(),
		fixtures::scenario_profiles(20),
		Arc::new(FakeVectorStore::new(Vec::new())),
		Arc::new(FakeEmbedding::new(vec![0.1])),
		rejecting.clone(),
	);
	let err = service.search(SearchRequest::new(QUERY)).await.expect_err("Expected rejection.");

	assert!(
		matches!(&err, Error::InappropriateQuery { feedback } if feedback == "Contains advertising."),
		"Unexpected error: {err:?}"
	);
	assert!(rejecting.calls_of(PromptKind::Keywords).is_empty());

	let garbled = Arc::new(
		ScriptedGeneration::new().with_keywords(KEYWORDS).with_moderation("I cannot decide."),
	);
	let service = reunite_testkit::test_service(
		cfg,
		fixtures::scenario_profiles(20),
		Arc::new(FakeVectorStore::new(Vec::new())),
		Arc::new(FakeEmbedding::new(vec![0.1])),
		garbled,
	);
	let response = service.search(SearchRequest::new(QUERY)).await.expect("Search failed.");

	assert_eq!(response.results.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn progress_reports_every_stage_in_order() {
	let progress = Arc::new(RecordingProgress::default());
	let service = reunite_testkit::test_service(
		reunite_testkit::test_config(),
		fixtures::scenario_profiles(20),
		Arc::new(FakeVectorStore::new(vec![hit(1, 0.9)])),
		Arc::new(FakeEmbedding::new(vec![0.1])),
		Arc::new(ScriptedGeneration::new().with_keywords(KEYWORDS)),
	)
	.with_progress(progress.clone());

	service.search(SearchRequest::new(QUERY)).await.expect("Search failed.");

	assert_eq!(progress.stages(), vec![
		Stage::Queued,
		Stage::Admitted,
		Stage::Keywords,
		Stage::KeywordMatch,
		Stage::VectorSearch,
		Stage::Ranked,
		Stage::Verifying,
		Stage::Completed,
	]);
}
