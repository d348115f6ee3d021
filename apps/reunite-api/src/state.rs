use std::sync::Arc;

use reunite_service::{ReuniteService, TracingProgress};
use reunite_storage::{db::Db, records::PgProfileSource, vector};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<ReuniteService>,
}
impl AppState {
	pub async fn new(config: reunite_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;
		let records = Arc::new(PgProfileSource::new(db.pool));
		let vectors = vector::connect(&config.storage.vector)?;
		let service =
			ReuniteService::new(config, records, vectors).with_progress(Arc::new(TracingProgress));

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: ReuniteService) -> Self {
		Self { service: Arc::new(service) }
	}
}
