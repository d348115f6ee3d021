use std::sync::Arc;

use sqlx::PgPool;

use crate::{BoxFuture, Profile, Result};

const SELECT_PROFILES: &str = "\
SELECT
	id,
	title,
	full_name,
	born_year,
	losing_year,
	name_of_father,
	name_of_mother,
	siblings,
	detail,
	link
FROM profiles
ORDER BY id";

/// Read-only access to the full profile collection searched by one request.
pub trait RecordSource: Send + Sync {
	fn load_all(&self) -> BoxFuture<'_, Result<Vec<Profile>>>;
}

pub struct PgProfileSource {
	pool: PgPool,
}
impl PgProfileSource {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}
impl RecordSource for PgProfileSource {
	fn load_all(&self) -> BoxFuture<'_, Result<Vec<Profile>>> {
		Box::pin(async move {
			let profiles =
				sqlx::query_as::<_, Profile>(SELECT_PROFILES).fetch_all(&self.pool).await?;

			Ok(profiles)
		})
	}
}

#[derive(Clone, Default)]
pub struct InMemoryProfiles {
	profiles: Arc<Vec<Profile>>,
}
impl InMemoryProfiles {
	pub fn new(profiles: Vec<Profile>) -> Self {
		Self { profiles: Arc::new(profiles) }
	}
}
impl RecordSource for InMemoryProfiles {
	fn load_all(&self) -> BoxFuture<'_, Result<Vec<Profile>>> {
		let profiles = self.profiles.as_ref().clone();

		Box::pin(async move { Ok(profiles) })
	}
}
