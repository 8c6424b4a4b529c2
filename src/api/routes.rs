//! API routes

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::{error, warn};

use crate::api::error::{ApiError, Result};
use crate::api::state::ApiState;
use crate::api::types::{DataResponse, HealthResponse, SampleView, TriggerResponse};
use crate::application::trigger_gate::{TriggerError, TriggerReceipt};

/// Build the complete API router
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/scrap", get(trigger).post(trigger))
        .route("/api/samples", get(list_samples))
        // Older clients read the history from here
        .route("/api/data", get(list_samples))
        .with_state(state)
}

/// Credential from an `Authorization: Bearer <secret>` header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn trigger(State(state): State<ApiState>, headers: HeaderMap) -> Result<Response> {
    let receipt = state.gate.handle(bearer_token(&headers)).await.map_err(|e| {
        if let TriggerError::RunFailed(cause) = &e {
            warn!(error = %cause, category = cause.category(), "Triggered scrape run failed");
        }
        ApiError::from(e)
    })?;

    let response = match receipt {
        TriggerReceipt::Completed(outcome) => (
            StatusCode::OK,
            Json(TriggerResponse {
                message: "success",
                outcome: Some(outcome.as_str()),
            }),
        ),
        TriggerReceipt::Accepted => (
            StatusCode::ACCEPTED,
            Json(TriggerResponse {
                message: "accepted",
                outcome: None,
            }),
        ),
    };
    Ok(response.into_response())
}

async fn list_samples(State(state): State<ApiState>) -> Result<Json<DataResponse<Vec<SampleView>>>> {
    let samples = state.samples.all(&state.country).await.map_err(|e| {
        error!(error = %e, "Failed to read sample history");
        ApiError::from(e)
    })?;

    Ok(Json(DataResponse {
        data: samples.iter().map(SampleView::from).collect(),
    }))
}
