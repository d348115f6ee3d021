use std::{collections::HashSet, sync::Arc, time::Duration};

use tokio::task::JoinSet;

use reunite_config::{LlmProviderConfig, SearchVerify};
use reunite_providers::{
	Error as ProviderError,
	generation::{GenerateRequest, Generation},
};
use reunite_storage::{Profile, RecordId};

use crate::{
	CancelSignal, GenerationProvider, prompts,
	retry::{RetryDecision, RetryError, RetryPolicy},
};

/// Confirms ranked candidates with batched, concurrent LLM calls.
#[derive(Clone)]
pub struct BatchVerifier {
	provider: Arc<dyn GenerationProvider>,
	llm: Arc<LlmProviderConfig>,
	cfg: SearchVerify,
	keys: Arc<[String]>,
}
impl BatchVerifier {
	pub fn new(
		provider: Arc<dyn GenerationProvider>,
		llm: LlmProviderConfig,
		cfg: SearchVerify,
		keys: Vec<String>,
	) -> Self {
		Self { provider, llm: Arc::new(llm), cfg, keys: keys.into() }
	}

	/// Batches dispatched together before the group barrier.
	pub fn group_size(&self) -> usize {
		match self.cfg.max_concurrent_requests {
			Some(limit) => limit as usize,
			None => self.keys.len(),
		}
		.max(1)
	}

	/// Returns the ids among `candidates` the LLM confirmed. Failed batches contribute nothing.
	/// Cancellation is observed between groups and cuts the group delay short; the caller must
	/// treat the set as partial once `cancel` has fired.
	pub async fn verify(
		&self,
		query: &str,
		candidates: &[Profile],
		cancel: &CancelSignal,
	) -> HashSet<RecordId> {
		let batch_size = (self.cfg.batch_size as usize).max(1);
		let batches: Vec<&[Profile]> = candidates.chunks(batch_size).collect();
		let groups: Vec<&[&[Profile]]> = batches.chunks(self.group_size()).collect();
		let group_delay = Duration::from_millis(self.cfg.group_delay_ms);
		let mut verified = HashSet::new();

		tracing::info!(
			candidates = candidates.len(),
			batches = batches.len(),
			groups = groups.len(),
			"Verifying candidates."
		);

		for (group_index, group) in groups.iter().enumerate() {
			if cancel.is_cancelled() {
				tracing::info!(group = group_index, "Verification cancelled.");

				break;
			}

			let first_batch = group_index * self.group_size();
			let mut tasks = JoinSet::new();

			for (offset, batch) in group.iter().enumerate() {
				let batch_index = first_batch + offset;
				let ids: Vec<RecordId> = batch.iter().map(|profile| profile.id).collect();
				let refs: Vec<&Profile> = batch.iter().collect();
				let prompt = prompts::verify_prompt(query, &refs, self.cfg.detail_max_chars);

				tasks.spawn(self.clone().verify_batch(batch_index, prompt, ids));
			}

			let mut confirmed = 0_usize;

			while let Some(joined) = tasks.join_next().await {
				match joined {
					Ok(ids) => {
						confirmed += ids.len();
						verified.extend(ids);
					},
					Err(err) => tracing::error!(error = %err, "Verification task failed."),
				}
			}

			tracing::info!(
				group = group_index,
				batches = group.len(),
				confirmed,
				total_confirmed = verified.len(),
				"Verification group finished."
			);

			if group_index + 1 < groups.len() && !group_delay.is_zero() {
				tokio::select! {
					_ = tokio::time::sleep(group_delay) => {},
					_ = cancel.cancelled() => {},
				}
			}
		}

		verified
	}

	async fn verify_batch(
		self,
		batch_index: usize,
		prompt: String,
		ids: Vec<RecordId>,
	) -> Vec<RecordId> {
		let req = GenerateRequest {
			prompt,
			temperature: self.cfg.temperature,
			max_output_tokens: self.cfg.max_output_tokens,
		};
		let policy = RetryPolicy::for_generation(&self.cfg);
		let result = policy
			.run(
				&self.keys,
				batch_index,
				|key| self.provider.generate(&self.llm, &req, key),
				classify,
			)
			.await;

		match result {
			Ok(Generation::Text(text)) => {
				let allowed: HashSet<RecordId> = ids.iter().copied().collect();

				parse_verified_ids(&text).into_iter().filter(|id| allowed.contains(id)).collect()
			},
			Ok(Generation::Blocked(reason)) => {
				tracing::warn!(
					batch = batch_index,
					reason = %reason,
					"Verification batch was blocked."
				);

				Vec::new()
			},
			Err(RetryError::Stopped { attempts, source }) if source.is_credential_error() => {
				tracing::warn!(
					batch = batch_index,
					attempts,
					error = %source,
					"Credential rejected. Abandoning verification batch."
				);

				Vec::new()
			},
			Err(err) => {
				tracing::warn!(batch = batch_index, error = %err, "Verification batch failed.");

				Vec::new()
			},
		}
	}
}

/// `none` means no match. Otherwise every line made only of ASCII digits is an id.
pub fn parse_verified_ids(text: &str) -> Vec<RecordId> {
	if text.trim().eq_ignore_ascii_case("none") {
		return Vec::new();
	}

	text.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit()))
		.filter_map(|line| line.parse().ok())
		.collect()
}

fn classify(err: &ProviderError) -> RetryDecision {
	if err.is_transient() { RetryDecision::Retry } else { RetryDecision::Stop }
}
