use axum::{extract::State, routing::post, Json, Router};
use serde_json::Value;
use tracing::{error, instrument};

use crate::{
    assistant::{
        dto::{ConverseRequest, PredictRequest},
        services::{converse, ConverseOutcome},
    },
    error::{ApiError, JsonBody},
    state::AppState,
};

pub fn assistant_routes() -> Router<AppState> {
    Router::new()
        .route("/predictDisease", post(predict_disease))
        .route("/converse", post(converse_route))
}

#[instrument(skip(state, payload))]
pub async fn predict_disease(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<PredictRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.text.trim().is_empty() {
        return Err(ApiError::BadRequest("Text is required".into()));
    }

    state
        .predictor
        .predict(&payload.text)
        .await
        .map(Json)
        .map_err(|e| {
            error!(error = %e, "disease prediction failed");
            ApiError::Internal("Error predicting disease".into())
        })
}

#[instrument(skip(state, payload))]
pub async fn converse_route(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ConverseRequest>,
) -> Result<Json<ConverseOutcome>, ApiError> {
    if payload.new_message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message is required".into()));
    }

    converse(
        state.chat.as_ref(),
        state.predictor.as_ref(),
        &payload.new_message,
        payload.messages,
    )
    .await
    .map(Json)
    .map_err(|e| {
        error!(error = %e, "conversation failed");
        ApiError::Internal("Error conversing".into())
    })
}
