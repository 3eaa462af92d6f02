use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, PublicUser, SendSignupOtpRequest, SignupRequest},
        jwt::{AuthUser, JwtKeys},
        password::{hash_password, verify_password},
        repo::is_unique_violation,
        repo_types::User,
        services::{is_valid_email, normalize_email, MIN_PASSWORD_LEN},
    },
    error::{ApiError, JsonBody, Message},
    otp::services::OtpService,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/sendOtp", post(send_signup_otp))
        .route("/signup", post(signup))
        .route("/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn validate_new_account(name: &str, email: &str, password: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() || email.is_empty() || password.is_empty() {
        return Err(ApiError::BadRequest("All fields are required".into()));
    }
    if !is_valid_email(email) {
        warn!(%email, "invalid email");
        return Err(ApiError::BadRequest("Invalid email".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn validate_signup_otp_request(req: &SendSignupOtpRequest, email: &str) -> Result<(), ApiError> {
    if req.confirm_password.is_empty() {
        return Err(ApiError::BadRequest("All fields are required".into()));
    }
    validate_new_account(&req.name, email, &req.password)?;
    if req.password != req.confirm_password {
        return Err(ApiError::BadRequest("The passwords does not match!".into()));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn send_signup_otp(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SendSignupOtpRequest>,
) -> Result<Json<Message>, ApiError> {
    let email = normalize_email(&payload.email);
    validate_signup_otp_request(&payload, &email)?;

    match User::find_by_email(&state.db, &email).await {
        Ok(Some(_)) => {
            warn!(%email, "email already registered");
            return Err(ApiError::BadRequest(
                "User with the same email already exists".into(),
            ));
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(ApiError::Internal("Error checking for user".into()));
        }
    }

    issue_signup_otp(&state.otp, &email).await
}

async fn issue_signup_otp(otp: &OtpService, email: &str) -> Result<Json<Message>, ApiError> {
    otp.issue(email).await.map_err(|e| {
        error!(error = %e, %email, "otp issue failed");
        ApiError::Internal("Internal server error".into())
    })?;

    info!(%email, "signup otp issued");
    Ok(Message::new("OTP sent and saved successfully"))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<SignupRequest>,
) -> Result<Json<Message>, ApiError> {
    let email = normalize_email(&payload.email);
    validate_new_account(&payload.name, &email, &payload.password)?;
    let name = payload.name.trim();

    let hash = hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        ApiError::Internal("Error creating user".into())
    })?;

    match User::create(&state.db, name, &email, &hash).await {
        Ok(user) => {
            info!(user_id = %user.id, email = %user.email, "user registered");
            Ok(Message::new("User created successfully"))
        }
        Err(e) if is_unique_violation(&e) => {
            warn!(%email, "email already registered");
            Err(ApiError::Conflict("Email already registered".into()))
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            Err(ApiError::Internal("Error creating user".into()))
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let user = match User::find_by_email(&state.db, &email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(%email, "login unknown email");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
        Err(e) => {
            error!(error = %e, "find_by_email failed");
            return Err(ApiError::Internal("Error checking for user".into()));
        }
    };

    let ok = verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!(error = %e, user_id = %user.id, "verify_password failed");
        ApiError::Internal("Error checking for user".into())
    })?;
    if !ok {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let token = JwtKeys::from_ref(&state)
        .sign(user.id, &user.name)
        .map_err(|e| {
            error!(error = %e, "jwt sign failed");
            ApiError::Internal("Error checking for user".into())
        })?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        name: user.name,
        token,
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await
        .map_err(|e| {
            error!(error = %e, %user_id, "find_by_id failed");
            ApiError::Internal("Error checking for user".into())
        })?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    Ok(Json(PublicUser {
        id: user.id,
        name: user.name,
        email: user.email,
    }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use axum::response::IntoResponse;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;

    fn otp_request(name: &str, email: &str, pw: &str, confirm: &str) -> SendSignupOtpRequest {
        SendSignupOtpRequest {
            name: name.into(),
            email: email.into(),
            password: pw.into(),
            confirm_password: confirm.into(),
        }
    }

    fn error_of(res: Result<(), ApiError>) -> String {
        res.unwrap_err().to_string()
    }

    #[test]
    fn signup_otp_requires_every_field() {
        let req = otp_request("Asha", "a@x.com", "secret1", "");
        assert_eq!(
            error_of(validate_signup_otp_request(&req, "a@x.com")),
            "All fields are required"
        );
        let req = otp_request(" ", "a@x.com", "secret1", "secret1");
        assert_eq!(
            error_of(validate_signup_otp_request(&req, "a@x.com")),
            "All fields are required"
        );
    }

    #[test]
    fn signup_otp_rejects_bad_email_short_password_and_mismatch() {
        let req = otp_request("Asha", "nope", "secret1", "secret1");
        assert_eq!(
            error_of(validate_signup_otp_request(&req, "nope")),
            "Invalid email"
        );

        let req = otp_request("Asha", "a@x.com", "abc", "abc");
        assert_eq!(
            error_of(validate_signup_otp_request(&req, "a@x.com")),
            "Password must be at least 6 characters long"
        );

        let req = otp_request("Asha", "a@x.com", "secret1", "secret2");
        assert_eq!(
            error_of(validate_signup_otp_request(&req, "a@x.com")),
            "The passwords does not match!"
        );
    }

    #[test]
    fn signup_otp_accepts_good_details() {
        let req = otp_request("Asha", "a@x.com", "secret1", "secret1");
        assert!(validate_signup_otp_request(&req, "a@x.com").is_ok());
    }

    #[tokio::test]
    async fn send_otp_route_rejects_mismatched_passwords() {
        let app = auth_routes().with_state(AppState::fake());
        let body = json!({
            "name": "Asha",
            "email": "a@x.com",
            "password": "secret1",
            "confirmPassword": "secret2"
        });
        let res = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sendOtp")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "The passwords does not match!");
    }

    #[tokio::test]
    async fn signup_otp_storage_failure_is_internal_error() {
        use std::sync::Arc;

        use crate::otp::{
            mailer::testing::RecordingMailer,
            repo::testing::BrokenStore,
            services::OtpPolicy,
        };

        let mailer = Arc::new(RecordingMailer::default());
        let otp = OtpService::new(Arc::new(BrokenStore), mailer.clone(), OtpPolicy::default());

        let res = issue_signup_otp(&otp, "a@x.com").await.into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({ "error": "Internal server error" }));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn login_without_content_type_is_json_bad_request() {
        let app = auth_routes().with_state(AppState::fake());
        let res = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .body(Body::from(r#"{"email":"a@x.com","password":"secret1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn me_requires_bearer_token() {
        let app = me_routes().with_state(AppState::fake());
        let res = app
            .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_rejects_forged_token() {
        let app = me_routes().with_state(AppState::fake());
        let res = app
            .oneshot(
                Request::builder()
                    .uri("/me")
                    .header("authorization", "Bearer not.a.token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn public_user_serialization() {
        let user = PublicUser {
            id: uuid::Uuid::new_v4(),
            name: "Asha".into(),
            email: "a@x.com".into(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("a@x.com"));
        assert!(!json.contains("password"));
    }
}
