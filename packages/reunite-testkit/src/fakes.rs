use std::{
	collections::VecDeque,
	sync::{Mutex, MutexGuard},
};

use tokio::time::Instant;

use reunite_config::{EmbeddingProviderConfig, LlmProviderConfig};
use reunite_providers::{
	Error as ProviderError,
	embedding::TaskType,
	generation::{GenerateRequest, Generation},
};
use reunite_service::{
	BoxFuture, EmbeddingProvider, GenerationProvider, ProgressEvent, ProgressSink, Stage,
};
use reunite_storage::{
	Error as StorageError, RecordId,
	vector::{VectorHit, VectorPoint, VectorStore},
};

/// Embedding double that replays scripted HTTP failures before returning a fixed vector.
pub struct FakeEmbedding {
	vector: Vec<f32>,
	failures: Mutex<VecDeque<(u16, String)>>,
	always_fail: Option<u16>,
	calls: Mutex<Vec<String>>,
}
impl FakeEmbedding {
	pub fn new(vector: Vec<f32>) -> Self {
		Self {
			vector,
			failures: Mutex::new(VecDeque::new()),
			always_fail: None,
			calls: Mutex::new(Vec::new()),
		}
	}

	/// Every call fails with `status`.
	pub fn failing(status: u16) -> Self {
		Self { always_fail: Some(status), ..Self::new(Vec::new()) }
	}

	/// Queues failures consumed by the next calls, in order.
	pub fn with_failures<I, S>(self, failures: I) -> Self
	where
		I: IntoIterator<Item = (u16, S)>,
		S: Into<String>,
	{
		lock(&self.failures)
			.extend(failures.into_iter().map(|(status, message)| (status, message.into())));

		self
	}

	/// Credentials used, one entry per call.
	pub fn calls(&self) -> Vec<String> {
		lock(&self.calls).clone()
	}
}
impl EmbeddingProvider for FakeEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_text: &'a str,
		_task_type: TaskType,
		api_key: &'a str,
	) -> BoxFuture<'a, reunite_providers::Result<Vec<f32>>> {
		lock(&self.calls).push(api_key.to_string());

		let scripted = lock(&self.failures).pop_front();
		let result = match (scripted, self.always_fail) {
			(Some((status, message)), _) => Err(ProviderError::Http { status, message }),
			(None, Some(status)) =>
				Err(ProviderError::Http { status, message: "unavailable".to_string() }),
			(None, None) => Ok(self.vector.clone()),
		};

		Box::pin(async move { result })
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptKind {
	Keywords,
	Verify,
	Moderation,
}

#[derive(Clone, Debug)]
pub struct GenerationCall {
	pub kind: PromptKind,
	pub key: String,
	/// Ids listed in a verification prompt. Empty for other prompts.
	pub batch: Vec<RecordId>,
	pub at: Instant,
}

type Verifier = dyn Fn(&[RecordId], &str) -> reunite_providers::Result<Generation> + Send + Sync;

/// LLM double that answers keyword, moderation and verification prompts separately.
pub struct ScriptedGeneration {
	keywords: Option<String>,
	moderation: String,
	verifier: Box<Verifier>,
	calls: Mutex<Vec<GenerationCall>>,
}
impl ScriptedGeneration {
	/// Keyword extraction fails, moderation allows, verification confirms every id.
	pub fn new() -> Self {
		Self {
			keywords: None,
			moderation: r#"{"is_appropriate": true, "feedback": "ok"}"#.to_string(),
			verifier: Box::new(|batch, _| Ok(Generation::Text(id_lines(batch)))),
			calls: Mutex::new(Vec::new()),
		}
	}

	pub fn with_keywords(mut self, reply: impl Into<String>) -> Self {
		self.keywords = Some(reply.into());

		self
	}

	pub fn with_moderation(mut self, reply: impl Into<String>) -> Self {
		self.moderation = reply.into();

		self
	}

	/// `verifier` receives the batch ids and the credential for each verification call.
	pub fn with_verifier<F>(mut self, verifier: F) -> Self
	where
		F: Fn(&[RecordId], &str) -> reunite_providers::Result<Generation> + Send + Sync + 'static,
	{
		self.verifier = Box::new(verifier);

		self
	}

	pub fn calls(&self) -> Vec<GenerationCall> {
		lock(&self.calls).clone()
	}

	pub fn calls_of(&self, kind: PromptKind) -> Vec<GenerationCall> {
		lock(&self.calls).iter().filter(|call| call.kind == kind).cloned().collect()
	}
}
impl Default for ScriptedGeneration {
	fn default() -> Self {
		Self::new()
	}
}
impl GenerationProvider for ScriptedGeneration {
	fn generate<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		req: &'a GenerateRequest,
		api_key: &'a str,
	) -> BoxFuture<'a, reunite_providers::Result<Generation>> {
		let kind = prompt_kind(&req.prompt);
		let batch = if kind == PromptKind::Verify { prompt_ids(&req.prompt) } else { Vec::new() };
		let result = match kind {
			PromptKind::Keywords => match self.keywords.as_ref() {
				Some(reply) => Ok(Generation::Text(reply.clone())),
				None => Err(ProviderError::Http {
					status: 500,
					message: "keyword extraction unavailable".to_string(),
				}),
			},
			PromptKind::Moderation => Ok(Generation::Text(self.moderation.clone())),
			PromptKind::Verify => (self.verifier)(&batch, api_key),
		};

		lock(&self.calls).push(GenerationCall {
			kind,
			key: api_key.to_string(),
			batch,
			at: Instant::now(),
		});

		Box::pin(async move { result })
	}
}

/// Vector store double returning fixed hits, or failing every query.
pub struct FakeVectorStore {
	hits: Vec<VectorHit>,
	fail: bool,
	queries: Mutex<Vec<u64>>,
	upserted: Mutex<Vec<VectorPoint>>,
}
impl FakeVectorStore {
	pub fn new(hits: Vec<VectorHit>) -> Self {
		Self { hits, fail: false, queries: Mutex::new(Vec::new()), upserted: Mutex::new(Vec::new()) }
	}

	pub fn failing() -> Self {
		Self { fail: true, ..Self::new(Vec::new()) }
	}

	/// Limits passed to `query`, one entry per call.
	pub fn queries(&self) -> Vec<u64> {
		lock(&self.queries).clone()
	}

	pub fn upserted(&self) -> Vec<VectorPoint> {
		lock(&self.upserted).clone()
	}
}
impl VectorStore for FakeVectorStore {
	fn backend(&self) -> &'static str {
		"fake"
	}

	fn query<'a>(
		&'a self,
		_embedding: &'a [f32],
		limit: u64,
	) -> BoxFuture<'a, reunite_storage::Result<Vec<VectorHit>>> {
		lock(&self.queries).push(limit);

		let result = if self.fail {
			Err(StorageError::Http { status: 503, message: "vector store unreachable".to_string() })
		} else {
			Ok(self.hits.iter().take(limit as usize).copied().collect())
		};

		Box::pin(async move { result })
	}

	fn count(&self) -> BoxFuture<'_, reunite_storage::Result<u64>> {
		let count = self.hits.len() as u64;

		Box::pin(async move { Ok(count) })
	}

	fn upsert<'a>(&'a self, points: &'a [VectorPoint]) -> BoxFuture<'a, reunite_storage::Result<()>> {
		lock(&self.upserted).extend_from_slice(points);

		Box::pin(async { Ok(()) })
	}
}

/// Collects progress events for assertions.
#[derive(Default)]
pub struct RecordingProgress {
	events: Mutex<Vec<ProgressEvent>>,
}
impl RecordingProgress {
	pub fn events(&self) -> Vec<ProgressEvent> {
		lock(&self.events).clone()
	}

	pub fn stages(&self) -> Vec<Stage> {
		lock(&self.events).iter().map(|event| event.stage).collect()
	}
}
impl ProgressSink for RecordingProgress {
	fn emit(&self, event: ProgressEvent) {
		lock(&self.events).push(event);
	}
}

/// A verification reply confirming every id in `ids`.
pub fn id_lines(ids: &[RecordId]) -> String {
	if ids.is_empty() {
		return "none".to_string();
	}

	ids.iter().map(RecordId::to_string).collect::<Vec<_>>().join("\n")
}

fn prompt_kind(prompt: &str) -> PromptKind {
	if prompt.contains("Profiles to check:") {
		PromptKind::Verify
	} else if prompt.contains("Request to moderate:") {
		PromptKind::Moderation
	} else {
		PromptKind::Keywords
	}
}

fn prompt_ids(prompt: &str) -> Vec<RecordId> {
	prompt
		.lines()
		.filter_map(|line| line.strip_prefix("Index: "))
		.filter_map(|id| id.trim().parse().ok())
		.collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}
