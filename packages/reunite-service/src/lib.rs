pub mod admission;
pub mod embedding;
pub mod keywords;
pub mod matcher;
pub mod moderation;
pub mod progress;
pub mod prompts;
pub mod ranking;
pub mod retry;
pub mod search;
pub mod verify;

mod error;

pub use admission::{AdmissionGuard, AdmissionQueue, CancelSignal, Ticket};
pub use error::{Error, Result};
pub use progress::{ProgressEvent, ProgressSink, Stage, TracingProgress};
pub use ranking::RankedCandidate;
pub use reunite_storage::BoxFuture;
pub use search::{SearchRequest, SearchResponse, SearchResult};

use std::{sync::Arc, time::Duration};

use reunite_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use reunite_providers::{
	embedding::TaskType,
	generation::{self, GenerateRequest, Generation},
};
use reunite_storage::{records::RecordSource, vector::VectorStore};

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
		task_type: TaskType,
		api_key: &'a str,
	) -> BoxFuture<'a, reunite_providers::Result<Vec<f32>>>;
}

pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		req: &'a GenerateRequest,
		api_key: &'a str,
	) -> BoxFuture<'a, reunite_providers::Result<Generation>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub generation: Arc<dyn GenerationProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		generation: Arc<dyn GenerationProvider>,
	) -> Self {
		Self { embedding, generation }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), generation: provider }
	}
}

pub struct ReuniteService {
	pub cfg: Config,
	pub records: Arc<dyn RecordSource>,
	pub vectors: Arc<dyn VectorStore>,
	pub providers: Providers,
	pub admission: Arc<AdmissionQueue>,
	pub progress: Option<Arc<dyn ProgressSink>>,
}
impl ReuniteService {
	pub fn new(cfg: Config, records: Arc<dyn RecordSource>, vectors: Arc<dyn VectorStore>) -> Self {
		Self::with_providers(cfg, records, vectors, Providers::default())
	}

	pub fn with_providers(
		cfg: Config,
		records: Arc<dyn RecordSource>,
		vectors: Arc<dyn VectorStore>,
		providers: Providers,
	) -> Self {
		let admission =
			Arc::new(AdmissionQueue::new(Duration::from_millis(cfg.admission.poll_interval_ms)));

		Self { cfg, records, vectors, providers, admission, progress: None }
	}

	pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
		self.progress = Some(sink);

		self
	}

	/// Shares one admission queue between services that must not run concurrently.
	pub fn with_admission(mut self, admission: Arc<AdmissionQueue>) -> Self {
		self.admission = admission;

		self
	}

	pub(crate) fn emit(&self, stage: Stage, message: impl Into<String>) {
		if let Some(sink) = self.progress.as_ref() {
			sink.emit(ProgressEvent { stage, message: message.into() });
		}
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
		task_type: TaskType,
		api_key: &'a str,
	) -> BoxFuture<'a, reunite_providers::Result<Vec<f32>>> {
		Box::pin(reunite_providers::embedding::embed(cfg, text, task_type, api_key))
	}
}

impl GenerationProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		req: &'a GenerateRequest,
		api_key: &'a str,
	) -> BoxFuture<'a, reunite_providers::Result<Generation>> {
		Box::pin(generation::generate(cfg, req, api_key))
	}
}

/// Short, stable fingerprint for logging a query without its content.
pub(crate) fn hash_query(query: &str) -> String {
	let hash = blake3::hash(query.as_bytes()).to_hex();

	hash.as_str()[..16].to_string()
}
