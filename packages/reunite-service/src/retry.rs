use std::{fmt::Display, future::Future, time::Duration};

use reunite_config::{SearchEmbedding, SearchVerify};

/// How a failed attempt should be handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
	/// Count the failure against the current credential and try again.
	Retry,
	/// The current credential is unusable. Behaves like `Stop` when rotation is disabled.
	Rotate,
	/// Give up immediately.
	Stop,
}

#[derive(Debug)]
pub enum RetryError<E> {
	NoCredentials,
	Stopped { attempts: u32, source: E },
	Exhausted { attempts: u32, source: E },
}
impl<E> RetryError<E> {
	pub fn attempts(&self) -> u32 {
		match self {
			Self::NoCredentials => 0,
			Self::Stopped { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
		}
	}
}

impl<E> Display for RetryError<E>
where
	E: Display,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::NoCredentials => write!(f, "No credentials are configured."),
			Self::Stopped { attempts, source } =>
				write!(f, "Gave up after {attempts} attempt(s): {source}"),
			Self::Exhausted { attempts, source } =>
				write!(f, "Exhausted {attempts} attempt(s): {source}"),
		}
	}
}

/// Backoff, credential rotation and attempt budget shared by every outbound provider call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total attempts across all credentials, including the first.
	pub max_attempts: u32,
	pub initial_delay: Duration,
	pub max_delay: Option<Duration>,
	/// Consecutive failures on one credential before moving to the next. `None` pins the
	/// starting credential.
	pub rotate_after: Option<u32>,
}
impl RetryPolicy {
	pub fn for_embedding(cfg: &SearchEmbedding) -> Self {
		Self {
			max_attempts: cfg.max_total_attempts,
			initial_delay: Duration::from_millis(cfg.initial_wait_ms),
			max_delay: Some(Duration::from_millis(cfg.max_wait_ms)),
			rotate_after: Some(cfg.max_consecutive_failures_per_key),
		}
	}

	pub fn for_generation(cfg: &SearchVerify) -> Self {
		Self {
			max_attempts: cfg.max_retries,
			initial_delay: Duration::from_millis(cfg.initial_retry_delay_ms),
			max_delay: None,
			rotate_after: None,
		}
	}

	/// Wait before the next try after `failures` consecutive failures on the current credential.
	pub fn delay_for_attempt(&self, failures: u32) -> Duration {
		let exp = failures.saturating_sub(1).min(31);
		let delay = self.initial_delay.saturating_mul(1_u32 << exp);

		match self.max_delay {
			Some(max) => delay.min(max),
			None => delay,
		}
	}

	/// Runs `op` with credentials from `keys`, starting at `start_key`, until it succeeds, the
	/// classifier stops it, or the attempt budget is spent. Rotation to a fresh credential resets
	/// the backoff and retries without waiting.
	pub async fn run<'k, T, E, F, Fut, C>(
		&self,
		keys: &'k [String],
		start_key: usize,
		mut op: F,
		classify: C,
	) -> Result<T, RetryError<E>>
	where
		F: FnMut(&'k str) -> Fut,
		Fut: Future<Output = Result<T, E>>,
		C: Fn(&E) -> RetryDecision,
		E: Display,
	{
		if keys.is_empty() {
			return Err(RetryError::NoCredentials);
		}

		let mut key_index = start_key % keys.len();
		let mut failures = 0_u32;
		let mut attempts = 0_u32;

		loop {
			attempts += 1;

			let err = match op(keys[key_index].as_str()).await {
				Ok(value) => return Ok(value),
				Err(err) => err,
			};
			let decision = match classify(&err) {
				RetryDecision::Rotate if self.rotate_after.is_none() => RetryDecision::Stop,
				decision => decision,
			};

			if decision == RetryDecision::Stop {
				return Err(RetryError::Stopped { attempts, source: err });
			}
			if attempts >= self.max_attempts {
				return Err(RetryError::Exhausted { attempts, source: err });
			}

			failures += 1;

			let rotate = decision == RetryDecision::Rotate
				|| self.rotate_after.is_some_and(|limit| failures >= limit);

			if rotate {
				let previous = key_index;

				key_index = (key_index + 1) % keys.len();
				failures = 0;

				tracing::warn!(
					error = %err,
					attempts,
					from_key = previous,
					to_key = key_index,
					"Rotating provider credential."
				);

				continue;
			}

			let delay = self.delay_for_attempt(failures);

			tracing::warn!(
				error = %err,
				attempts,
				max_attempts = self.max_attempts,
				key = key_index,
				delay_ms = delay.as_millis() as u64,
				"Provider call failed. Retrying."
			);

			tokio::time::sleep(delay).await;
		}
	}
}
