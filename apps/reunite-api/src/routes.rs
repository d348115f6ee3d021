use axum::{
	Json, Router,
	extract::{State, rejection::JsonRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use reunite_service::{Error as ServiceError, SearchRequest, SearchResponse};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/profiles/search", post(search))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<AppState>,
	payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.search(payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let message = err.to_string();

		match err {
			ServiceError::InvalidRequest { .. } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message),
			ServiceError::InappropriateQuery { feedback } =>
				json_error(StatusCode::BAD_REQUEST, "inappropriate_query", feedback),
			ServiceError::NoProfiles => json_error(StatusCode::NOT_FOUND, "no_profiles", message),
			ServiceError::NoSearchableSignal =>
				json_error(StatusCode::UNPROCESSABLE_ENTITY, "no_searchable_signal", message),
			ServiceError::VectorStore { .. } =>
				json_error(StatusCode::BAD_GATEWAY, "vector_store_unavailable", message),
			ServiceError::Provider { .. } =>
				json_error(StatusCode::BAD_GATEWAY, "provider_unavailable", message),
			ServiceError::AdmissionTimeout { .. } =>
				json_error(StatusCode::SERVICE_UNAVAILABLE, "admission_timeout", message),
			ServiceError::Cancelled =>
				json_error(StatusCode::SERVICE_UNAVAILABLE, "cancelled", message),
			ServiceError::Storage { .. } => {
				tracing::error!(error = %message, "Record source failed.");

				json_error(
					StatusCode::INTERNAL_SERVER_ERROR,
					"storage_error",
					"Profiles could not be loaded.",
				)
			},
		}
	}
}

impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text())
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}
