use axum::{extract::State, routing::post, Json, Router};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    auth::services::{is_valid_email, normalize_email},
    error::{ApiError, JsonBody, Message},
    otp::dto::{CheckOtpRequest, SendOtpRequest, SendOtpResponse},
    state::AppState,
};

const OTP_REJECTED: &str = "Otp did not match or has expired.";

pub fn otp_routes() -> Router<AppState> {
    Router::new().route("/check-otp", post(check_otp))
}

/// Returns the code in the response body; only mounted when debug routes are on.
pub fn debug_routes() -> Router<AppState> {
    Router::new().route("/send-otp", post(send_otp))
}

#[instrument(skip(state, payload))]
pub async fn check_otp(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<CheckOtpRequest>,
) -> Result<Json<Message>, ApiError> {
    let email = normalize_email(&payload.email);
    let Some(code) = payload.otp.as_ref().and_then(|v| v.as_code()) else {
        warn!(%email, "otp missing or not numeric");
        return Err(ApiError::BadRequest(OTP_REJECTED.into()));
    };
    if email.is_empty() {
        return Err(ApiError::BadRequest(OTP_REJECTED.into()));
    }

    match state.otp.verify(&email, code).await {
        Ok(outcome) if outcome.is_valid() => {
            info!(%email, "otp verified");
            Ok(Message::new("otp verified"))
        }
        Ok(outcome) => {
            debug!(%email, ?outcome, "otp rejected");
            Err(ApiError::BadRequest(OTP_REJECTED.into()))
        }
        Err(e) => {
            error!(error = %e, %email, "otp verification failed");
            Err(ApiError::Internal("Error checking for otp".into()))
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn send_otp(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SendOtpRequest>,
) -> Result<Json<SendOtpResponse>, ApiError> {
    let email = normalize_email(&payload.email);
    if email.is_empty() {
        return Err(ApiError::BadRequest("Email is required".into()));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::BadRequest("Invalid email".into()));
    }

    let otp = state.otp.issue(&email).await.map_err(|e| {
        error!(error = %e, %email, "otp issue failed");
        ApiError::Internal("Internal server error".into())
    })?;

    Ok(Json(SendOtpResponse {
        message: "OTP sent successfully".into(),
        otp,
    }))
}
