pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Provider returned HTTP {status}: {message}")]
	Http { status: u16, message: String },
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
}
impl Error {
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Http { status, .. } => Some(*status),
			Self::Reqwest(err) => err.status().map(|status| status.as_u16()),
			_ => None,
		}
	}

	/// The credential itself was rejected. Retrying with the same key cannot succeed.
	pub fn is_credential_error(&self) -> bool {
		match self {
			Self::Http { status, message } =>
				matches!(status, 401 | 403) || message.contains("API key not valid"),
			_ => false,
		}
	}

	/// Rate limiting, server-side failures and transport errors.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Http { status, .. } => *status == 429 || (500..600).contains(status),
			Self::Reqwest(err) => match err.status() {
				Some(status) => status.as_u16() == 429 || status.is_server_error(),
				None => !err.is_builder() && !err.is_decode(),
			},
			_ => false,
		}
	}
}
