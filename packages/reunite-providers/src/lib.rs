pub mod embedding;
pub mod error;
pub mod generation;

pub use error::{Error, Result};

use std::time::Duration;

use reqwest::{
	Client,
	header::{HeaderMap, HeaderName, HeaderValue},
};
use serde_json::{Map, Value};

pub fn auth_headers(
	header_name: &str,
	api_key: &str,
	default_headers: &Map<String, Value>,
) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();
	let mut value = HeaderValue::from_str(api_key)?;

	value.set_sensitive(true);
	headers.insert(HeaderName::from_bytes(header_name.as_bytes())?, value);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

pub(crate) fn endpoint(api_base: &str, path: &str, model: &str) -> String {
	format!("{}{}", api_base.trim_end_matches('/'), path.replace("{model}", model))
}

/// Posts `body` and returns the decoded JSON body. Non-success statuses keep the response text so
/// callers can tell credential failures apart from other client errors.
pub(crate) async fn post_json(
	timeout_ms: u64,
	url: &str,
	headers: HeaderMap,
	body: &Value,
) -> Result<Value> {
	let client = Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?;
	let res = client.post(url).headers(headers).json(body).send().await?;
	let status = res.status();

	if !status.is_success() {
		let message = res.text().await.unwrap_or_default();

		return Err(Error::Http { status: status.as_u16(), message });
	}

	Ok(res.json().await?)
}
