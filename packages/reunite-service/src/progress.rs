use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
	Queued,
	Admitted,
	Keywords,
	KeywordMatch,
	VectorSearch,
	Ranked,
	Verifying,
	Completed,
}
impl Stage {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Queued => "queued",
			Self::Admitted => "admitted",
			Self::Keywords => "keywords",
			Self::KeywordMatch => "keyword_match",
			Self::VectorSearch => "vector_search",
			Self::Ranked => "ranked",
			Self::Verifying => "verifying",
			Self::Completed => "completed",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
	pub stage: Stage,
	pub message: String,
}

/// Receives stage events while a search runs. Implementations must not block.
pub trait ProgressSink
where
	Self: Send + Sync,
{
	fn emit(&self, event: ProgressEvent);
}

pub struct TracingProgress;
impl ProgressSink for TracingProgress {
	fn emit(&self, event: ProgressEvent) {
		tracing::info!(stage = event.stage.as_str(), message = %event.message, "Search progress.");
	}
}
