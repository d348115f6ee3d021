use std::{
	collections::{HashMap, HashSet},
	time::Duration,
};

use serde::{Deserialize, Serialize};

use reunite_providers::embedding::TaskType;
use reunite_storage::{Profile, RecordId, vector::VectorHit};

use crate::{
	AdmissionGuard, CancelSignal, Error, RankedCandidate, ReuniteService, Result, Stage,
	embedding, keywords, matcher,
	moderation::{self, Verdict},
	ranking,
	verify::BatchVerifier,
};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SearchRequest {
	pub query: String,
	/// Ranked candidates kept after fusion. Defaults to `search.top_n_final`.
	#[serde(default)]
	pub top_n_final: Option<u32>,
	/// Ranked candidates sent to the verifier. Defaults to `search.verify.max_profiles`.
	#[serde(default)]
	pub max_verify: Option<u32>,
}
impl SearchRequest {
	pub fn new(query: impl Into<String>) -> Self {
		Self { query: query.into(), top_n_final: None, max_verify: None }
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResponse {
	pub results: Vec<SearchResult>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResult {
	pub id: RecordId,
	pub total_score: f32,
	pub vector_score: f32,
	pub keyword_score: f32,
	pub matched_keywords: u32,
	pub title: Option<String>,
	pub full_name: Option<String>,
	pub losing_year: Option<String>,
	pub born_year: Option<String>,
	pub name_of_father: Option<String>,
	pub name_of_mother: Option<String>,
	pub siblings: Option<String>,
	pub detail: Option<String>,
	pub link: Option<String>,
}
impl SearchResult {
	fn new(candidate: &RankedCandidate, profile: &Profile, keyword_bonus: f32) -> Self {
		Self {
			id: candidate.id,
			total_score: candidate.total_score,
			vector_score: candidate.vector_score,
			keyword_score: candidate.keyword_score(keyword_bonus),
			matched_keywords: candidate.keyword_matches,
			title: profile.title.clone(),
			full_name: profile.full_name.clone(),
			losing_year: profile.losing_year.clone(),
			born_year: profile.born_year.clone(),
			name_of_father: profile.name_of_father.clone(),
			name_of_mother: profile.name_of_mother.clone(),
			siblings: profile.siblings.clone(),
			detail: profile.detail.clone(),
			link: profile.link.clone(),
		}
	}
}

impl ReuniteService {
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		self.search_with_cancel(req, &CancelSignal::new()).await
	}

	/// Waits for this search's admission turn, then runs the pipeline. The slot is released on
	/// every exit path.
	pub async fn search_with_cancel(
		&self,
		req: SearchRequest,
		cancel: &CancelSignal,
	) -> Result<SearchResponse> {
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}
		if req.top_n_final == Some(0) {
			return Err(Error::InvalidRequest {
				message: "top_n_final must be greater than zero.".to_string(),
			});
		}
		if req.max_verify == Some(0) {
			return Err(Error::InvalidRequest {
				message: "max_verify must be greater than zero.".to_string(),
			});
		}

		let query_hash = crate::hash_query(query);

		self.emit(Stage::Queued, format!("{} search(es) ahead.", self.admission.len()));

		let _guard = self.wait_for_admission(cancel).await?;

		tracing::info!(query_hash = %query_hash, "Search admitted.");
		self.emit(Stage::Admitted, "Search started.");

		let response = self.run_pipeline(query, &req, cancel).await;

		match &response {
			Ok(response) => tracing::info!(
				query_hash = %query_hash,
				results = response.results.len(),
				"Search finished."
			),
			Err(err) => tracing::warn!(query_hash = %query_hash, error = %err, "Search failed."),
		}

		response
	}

	async fn wait_for_admission(&self, cancel: &CancelSignal) -> Result<AdmissionGuard> {
		match self.cfg.admission.max_wait_ms {
			Some(max_wait_ms) => tokio::time::timeout(
				Duration::from_millis(max_wait_ms),
				self.admission.admit(cancel),
			)
			.await
			.map_err(|_| Error::AdmissionTimeout { waited_ms: max_wait_ms })?,
			None => self.admission.admit(cancel).await,
		}
	}

	async fn run_pipeline(
		&self,
		query: &str,
		req: &SearchRequest,
		cancel: &CancelSignal,
	) -> Result<SearchResponse> {
		let cfg = &self.cfg;
		let keys = &cfg.providers.api_keys;

		if cfg.search.moderation.enabled {
			let verdict = moderation::check_query(
				self.providers.generation.as_ref(),
				&cfg.providers.llm,
				&cfg.search.moderation,
				&cfg.search.verify,
				keys,
				query,
			)
			.await;

			if let Verdict::Rejected { feedback } = verdict {
				return Err(Error::InappropriateQuery { feedback });
			}
		}

		let profiles = self.records.load_all().await?;

		if profiles.is_empty() {
			return Err(Error::NoProfiles);
		}

		let primary_key = keys.first().map(String::as_str).unwrap_or_default();
		let (keywords, embedding) = tokio::join!(
			keywords::extract_keywords(
				self.providers.generation.as_ref(),
				&cfg.providers.llm,
				&cfg.search.keywords,
				primary_key,
				query,
			),
			embedding::embed_text(
				self.providers.embedding.as_ref(),
				&cfg.providers.embedding,
				&cfg.search.embedding,
				keys,
				query,
				TaskType::RetrievalQuery,
			),
		);

		self.emit(Stage::Keywords, format!("{} keyword(s) extracted.", keywords.len()));

		let matches = matcher::match_counts(&keywords, &profiles);

		self.emit(Stage::KeywordMatch, format!("{} profile(s) matched a keyword.", matches.len()));

		let similarity = match embedding {
			Ok(vector) => match self.vectors.query(&vector, cfg.storage.vector.query_limit).await {
				Ok(hits) => similarity_map(&hits),
				Err(err) if matches.is_empty() => {
					return Err(Error::VectorStore { message: err.to_string() });
				},
				Err(err) => {
					tracing::warn!(
						error = %err,
						backend = self.vectors.backend(),
						"Vector search failed. Ranking by keywords only."
					);

					HashMap::new()
				},
			},
			Err(err) if matches.is_empty() => {
				tracing::warn!(error = %err, "Query embedding failed and no keyword matched.");

				return Err(Error::NoSearchableSignal);
			},
			Err(err) => {
				tracing::warn!(error = %err, "Query embedding failed. Ranking by keywords only.");

				HashMap::new()
			},
		};

		self.emit(Stage::VectorSearch, format!("{} vector hit(s).", similarity.len()));

		let top_n = req.top_n_final.unwrap_or(cfg.search.top_n_final) as usize;
		let ranked = ranking::rank_candidates(
			profiles.iter().map(|profile| profile.id),
			&matches,
			&similarity,
			cfg.search.keyword_bonus,
			top_n,
		);

		tracing::info!(
			keywords = keywords.len(),
			keyword_matches = matches.len(),
			vector_hits = similarity.len(),
			ranked = ranked.len(),
			"Candidates ranked."
		);
		self.emit(Stage::Ranked, format!("{} candidate(s) ranked.", ranked.len()));

		let by_id: HashMap<RecordId, &Profile> =
			profiles.iter().map(|profile| (profile.id, profile)).collect();
		let max_verify = req.max_verify.unwrap_or(cfg.search.verify.max_profiles) as usize;
		let to_verify: Vec<Profile> = ranked
			.iter()
			.take(max_verify)
			.filter_map(|candidate| by_id.get(&candidate.id).map(|profile| (*profile).clone()))
			.collect();

		self.emit(Stage::Verifying, format!("Verifying {} candidate(s).", to_verify.len()));

		let verified: HashSet<RecordId> = if to_verify.is_empty() {
			HashSet::new()
		} else {
			BatchVerifier::new(
				self.providers.generation.clone(),
				cfg.providers.llm.clone(),
				cfg.search.verify.clone(),
				keys.clone(),
			)
			.verify(query, &to_verify, cancel)
			.await
		};

		if cancel.is_cancelled() {
			return Err(Error::Cancelled);
		}

		let results: Vec<SearchResult> = ranked
			.iter()
			.filter(|candidate| verified.contains(&candidate.id))
			.filter_map(|candidate| {
				by_id.get(&candidate.id).map(|profile| {
					SearchResult::new(candidate, profile, cfg.search.keyword_bonus)
				})
			})
			.collect();

		self.emit(Stage::Completed, format!("{} profile(s) confirmed.", results.len()));

		Ok(SearchResponse { results })
	}
}

/// Keeps the best similarity per id when a backend returns duplicates.
fn similarity_map(hits: &[VectorHit]) -> HashMap<RecordId, f32> {
	let mut map = HashMap::with_capacity(hits.len());

	for hit in hits {
		let entry = map.entry(hit.id).or_insert(hit.similarity);

		if hit.similarity > *entry {
			*entry = hit.similarity;
		}
	}

	map
}
