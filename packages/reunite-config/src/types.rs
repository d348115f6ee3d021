use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub admission: Admission,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub vector: VectorStorage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorStorage {
	pub backend: VectorBackend,
	/// Payload/metadata field holding the logical profile id when it differs from the store id.
	#[serde(default = "default_id_field")]
	pub id_field: String,
	/// Upper bound on hits requested per query. Chroma is additionally capped by its count.
	#[serde(default = "default_query_limit")]
	pub query_limit: u64,
	pub qdrant: Option<Qdrant>,
	pub chroma: Option<Chroma>,
	pub pinecone: Option<Pinecone>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorBackend {
	Qdrant,
	Chroma,
	Pinecone,
}
impl VectorBackend {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Qdrant => "qdrant",
			Self::Chroma => "chroma",
			Self::Pinecone => "pinecone",
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chroma {
	pub url: String,
	pub collection: String,
	#[serde(default = "default_store_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pinecone {
	/// Index host, e.g. `https://profiles-abc123.svc.us-east1-gcp.pinecone.io`.
	pub host: String,
	pub api_key: String,
	pub namespace: Option<String>,
	#[serde(default = "default_store_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	/// Credential pool shared by the embedding client, the keyword extractor and the verifier.
	#[serde(default)]
	pub api_keys: Vec<String>,
	/// Optional. When set, `<NAME>` and `<NAME>_1` through `<NAME>_50` are read from the
	/// environment and appended to `api_keys`.
	pub api_key_env: Option<String>,
	pub embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	/// Request path. `{model}` is replaced with `model`.
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default = "default_api_key_header")]
	pub api_key_header: String,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	/// Request path. `{model}` is replaced with `model`.
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default = "default_api_key_header")]
	pub api_key_header: String,
	#[serde(default = "default_safety_threshold")]
	pub safety_threshold: String,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	pub top_n_final: u32,
	pub keyword_bonus: f32,
	pub keywords: SearchKeywords,
	pub embedding: SearchEmbedding,
	pub verify: SearchVerify,
	pub moderation: SearchModeration,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			top_n_final: 100,
			keyword_bonus: 0.05,
			keywords: SearchKeywords::default(),
			embedding: SearchEmbedding::default(),
			verify: SearchVerify::default(),
			moderation: SearchModeration::default(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchKeywords {
	pub temperature: f32,
	pub max_output_tokens: u32,
}
impl Default for SearchKeywords {
	fn default() -> Self {
		Self { temperature: 0.2, max_output_tokens: 512 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchEmbedding {
	pub max_chars: usize,
	pub initial_wait_ms: u64,
	pub max_wait_ms: u64,
	pub max_consecutive_failures_per_key: u32,
	pub max_total_attempts: u32,
}
impl Default for SearchEmbedding {
	fn default() -> Self {
		Self {
			max_chars: 8_000,
			initial_wait_ms: 5_000,
			max_wait_ms: 120_000,
			max_consecutive_failures_per_key: 3,
			max_total_attempts: 15,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchVerify {
	pub max_profiles: u32,
	pub batch_size: u32,
	/// Batches dispatched concurrently per group. Defaults to the credential pool size.
	pub max_concurrent_requests: Option<u32>,
	pub max_retries: u32,
	pub initial_retry_delay_ms: u64,
	pub group_delay_ms: u64,
	pub temperature: f32,
	pub max_output_tokens: u32,
	pub detail_max_chars: usize,
}
impl Default for SearchVerify {
	fn default() -> Self {
		Self {
			max_profiles: 300,
			batch_size: 3,
			max_concurrent_requests: None,
			max_retries: 5,
			initial_retry_delay_ms: 5_000,
			group_delay_ms: 2_000,
			temperature: 0.2,
			max_output_tokens: 256,
			detail_max_chars: 1_000,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchModeration {
	pub enabled: bool,
	pub temperature: f32,
	pub max_output_tokens: u32,
}
impl Default for SearchModeration {
	fn default() -> Self {
		Self { enabled: false, temperature: 0.5, max_output_tokens: 1_024 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Admission {
	/// Fallback re-check interval while waiting for a turn.
	pub poll_interval_ms: u64,
	/// Optional. Requests still queued after this long give up their slot.
	pub max_wait_ms: Option<u64>,
}
impl Default for Admission {
	fn default() -> Self {
		Self { poll_interval_ms: 100, max_wait_ms: None }
	}
}

fn default_id_field() -> String {
	"id".to_string()
}

fn default_query_limit() -> u64 {
	10_000
}

fn default_store_timeout_ms() -> u64 {
	30_000
}

fn default_api_key_header() -> String {
	"x-goog-api-key".to_string()
}

fn default_safety_threshold() -> String {
	"BLOCK_MEDIUM_AND_ABOVE".to_string()
}
