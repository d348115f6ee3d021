mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Admission, Chroma, Config, EmbeddingProviderConfig, LlmProviderConfig, Pinecone, Postgres,
	Providers, Qdrant, Search, SearchEmbedding, SearchKeywords, SearchModeration, SearchVerify,
	Service, Storage, VectorBackend, VectorStorage,
};

use std::{collections::HashSet, env, fs, path::Path};

/// Highest numbered suffix probed by the `providers.api_key_env` overlay.
pub const MAX_ENV_KEY_INDEX: usize = 50;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg, |name| env::var(name).ok());

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.providers.api_keys.is_empty() {
		return Err(Error::Validation {
			message: "providers.api_keys must contain at least one key.".to_string(),
		});
	}

	for (label, value) in [
		("providers.embedding.api_base", &cfg.providers.embedding.api_base),
		("providers.embedding.model", &cfg.providers.embedding.model),
		("providers.llm.api_base", &cfg.providers.llm.api_base),
		("providers.llm.model", &cfg.providers.llm.model),
		("storage.vector.id_field", &cfg.storage.vector.id_field),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	validate_vector_backend(&cfg.storage.vector)?;

	if cfg.storage.vector.query_limit == 0 {
		return Err(Error::Validation {
			message: "storage.vector.query_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.search.top_n_final == 0 {
		return Err(Error::Validation {
			message: "search.top_n_final must be greater than zero.".to_string(),
		});
	}
	if !cfg.search.keyword_bonus.is_finite() {
		return Err(Error::Validation {
			message: "search.keyword_bonus must be a finite number.".to_string(),
		});
	}
	if cfg.search.keyword_bonus <= 0.0 {
		return Err(Error::Validation {
			message: "search.keyword_bonus must be greater than zero.".to_string(),
		});
	}

	let embedding = &cfg.search.embedding;

	if embedding.max_chars == 0 {
		return Err(Error::Validation {
			message: "search.embedding.max_chars must be greater than zero.".to_string(),
		});
	}
	if embedding.max_total_attempts == 0 {
		return Err(Error::Validation {
			message: "search.embedding.max_total_attempts must be greater than zero.".to_string(),
		});
	}
	if embedding.max_consecutive_failures_per_key == 0 {
		return Err(Error::Validation {
			message: "search.embedding.max_consecutive_failures_per_key must be greater than zero."
				.to_string(),
		});
	}
	if embedding.initial_wait_ms > embedding.max_wait_ms {
		return Err(Error::Validation {
			message: "search.embedding.initial_wait_ms must not exceed max_wait_ms.".to_string(),
		});
	}

	let verify = &cfg.search.verify;

	if verify.max_profiles == 0 {
		return Err(Error::Validation {
			message: "search.verify.max_profiles must be greater than zero.".to_string(),
		});
	}
	if verify.batch_size == 0 {
		return Err(Error::Validation {
			message: "search.verify.batch_size must be greater than zero.".to_string(),
		});
	}
	if verify.max_concurrent_requests == Some(0) {
		return Err(Error::Validation {
			message: "search.verify.max_concurrent_requests must be greater than zero.".to_string(),
		});
	}
	if verify.max_retries == 0 {
		return Err(Error::Validation {
			message: "search.verify.max_retries must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("search.keywords.temperature", cfg.search.keywords.temperature),
		("search.verify.temperature", verify.temperature),
		("search.moderation.temperature", cfg.search.moderation.temperature),
	] {
		if !value.is_finite() || !(0.0..=2.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-2.0."),
			});
		}
	}

	if cfg.admission.poll_interval_ms == 0 {
		return Err(Error::Validation {
			message: "admission.poll_interval_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.admission.max_wait_ms == Some(0) {
		return Err(Error::Validation {
			message: "admission.max_wait_ms must be greater than zero when set.".to_string(),
		});
	}

	Ok(())
}

/// Builds the credential pool from explicit keys followed by environment keys, dropping blanks
/// and duplicates while keeping first-seen order.
pub fn resolve_api_keys<F>(explicit: &[String], env_name: Option<&str>, lookup: F) -> Vec<String>
where
	F: Fn(&str) -> Option<String>,
{
	let mut names = Vec::new();

	if let Some(name) = env_name.map(str::trim).filter(|name| !name.is_empty()) {
		names.push(name.to_string());

		for index in 1..=MAX_ENV_KEY_INDEX {
			names.push(format!("{name}_{index}"));
		}
	}

	let from_env = names.iter().filter_map(|name| lookup(name));
	let mut seen = HashSet::new();
	let mut keys = Vec::new();

	for key in explicit.iter().cloned().chain(from_env) {
		let key = key.trim().to_string();

		if key.is_empty() || !seen.insert(key.clone()) {
			continue;
		}

		keys.push(key);
	}

	keys
}

fn validate_vector_backend(cfg: &VectorStorage) -> Result<()> {
	let present = match cfg.backend {
		VectorBackend::Qdrant => cfg.qdrant.is_some(),
		VectorBackend::Chroma => cfg.chroma.is_some(),
		VectorBackend::Pinecone => cfg.pinecone.is_some(),
	};

	if !present {
		let backend = cfg.backend.as_str();

		return Err(Error::Validation {
			message: format!(
				"storage.vector.{backend} must be configured when storage.vector.backend is {backend}."
			),
		});
	}
	if let Some(pinecone) = cfg.pinecone.as_ref()
		&& cfg.backend == VectorBackend::Pinecone
		&& pinecone.api_key.trim().is_empty()
	{
		return Err(Error::Validation {
			message: "storage.vector.pinecone.api_key must be non-empty.".to_string(),
		});
	}

	Ok(())
}

fn normalize<F>(cfg: &mut Config, lookup: F)
where
	F: Fn(&str) -> Option<String>,
{
	cfg.providers.api_keys = resolve_api_keys(
		&cfg.providers.api_keys,
		cfg.providers.api_key_env.as_deref(),
		lookup,
	);

	if let Some(qdrant) = cfg.storage.vector.qdrant.as_mut()
		&& qdrant.api_key.as_deref().is_some_and(|key| key.trim().is_empty())
	{
		qdrant.api_key = None;
	}
	if let Some(pinecone) = cfg.storage.vector.pinecone.as_mut()
		&& pinecone.namespace.as_deref().is_some_and(|ns| ns.trim().is_empty())
	{
		pinecone.namespace = None;
	}
}
