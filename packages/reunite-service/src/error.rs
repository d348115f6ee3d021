pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Query was rejected by moderation: {feedback}")]
	InappropriateQuery { feedback: String },
	#[error("No profiles are available to search.")]
	NoProfiles,
	#[error("Query produced neither keyword matches nor a usable embedding.")]
	NoSearchableSignal,
	#[error("Vector store error: {message}")]
	VectorStore { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Search was cancelled before it completed.")]
	Cancelled,
	#[error("Search waited {waited_ms} ms without being admitted.")]
	AdmissionTimeout { waited_ms: u64 },
}
impl From<reunite_storage::Error> for Error {
	fn from(err: reunite_storage::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<reunite_providers::Error> for Error {
	fn from(err: reunite_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
