use axum::{
    extract::{FromRef, Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{delete, get, patch, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::instrument;

use crate::auth::{
    cookies::{clear_session_cookies, set_session_cookies, REFRESH_TOKEN_COOKIE},
    dto::{
        AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, GoogleSignInRequest,
        LoginRequest, MessageResponse, PublicUser, RefreshRequest, RefreshResponse,
        RegisterRequest, ResendVerificationRequest, ResetPasswordRequest,
    },
    extractors::CurrentUser,
    jwt::JwtKeys,
    repo_types::User,
    services,
};
use crate::error::ApiError;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/google", post(google_sign_in))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", patch(reset_password))
        .route("/auth/resend-verification-email", post(resend_verification_email))
        .route("/auth/verify-email/:token", get(verify_email))
        .route("/auth/change-password", patch(change_password))
        .route("/auth/logout", delete(logout))
}

#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    let user = services::register(
        &state,
        &payload.email,
        &payload.password,
        &payload.password_confirm,
        &verify_url_base(&headers),
    )
    .await?;
    issue_session(&state, &headers, jar, user, StatusCode::CREATED)
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(mut payload): Json<LoginRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    let user = services::login(&state, &payload.email, &payload.password).await?;
    issue_session(&state, &headers, jar, user, StatusCode::OK)
}

#[instrument(skip(state, jar, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Option<Json<RefreshRequest>>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let token = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_owned())
        .or_else(|| payload.and_then(|Json(p)| p.refresh_token))
        .ok_or_else(|| ApiError::Unauthorized("Log in again".into()))?;
    let access_token = services::refresh_access_token(&state, &token).await?;
    Ok(Json(RefreshResponse {
        status: "success",
        access_token,
    }))
}

#[instrument(skip(state, jar, payload))]
pub async fn google_sign_in(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<GoogleSignInRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), ApiError> {
    let user = services::google_sign_in(&state, &payload.id_token).await?;
    issue_session(&state, &headers, jar, user, StatusCode::OK)
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    services::forgot_password(&state, &payload.email).await?;
    Ok(Json(MessageResponse {
        status: "success",
        message: "OTP sent to email!",
    }))
}

#[instrument(skip(state, jar, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), ApiError> {
    let user = services::reset_password(&state, &payload.otp, &payload.new_password).await?;
    issue_session(&state, &headers, jar, user, StatusCode::CREATED)
}

#[instrument(skip(state, payload))]
pub async fn resend_verification_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut payload): Json<ResendVerificationRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    services::send_verification_email(&state, &payload.email, &verify_url_base(&headers)).await?;
    Ok(Json(MessageResponse {
        status: "success",
        message: "Token resent to email!",
    }))
}

#[instrument(skip(state, token))]
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::verify_email(&state, &token).await?;
    Ok(Json(MessageResponse {
        status: "success",
        message: "Email verified",
    }))
}

#[instrument(skip(state, current, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    services::change_password(
        &state,
        current.id,
        &payload.current_password,
        &payload.new_password,
        &payload.confirm_password,
    )
    .await?;
    Ok(Json(MessageResponse {
        status: "success",
        message: "Password updated successfully",
    }))
}

#[instrument(skip(jar, _current))]
pub async fn logout(
    _current: CurrentUser,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    (
        clear_session_cookies(jar),
        Json(MessageResponse {
            status: "success",
            message: "Successfully logged out",
        }),
    )
}

/// Mint both tokens, attach the session cookies and build the response
/// envelope.
fn issue_session(
    state: &AppState,
    headers: &HeaderMap,
    jar: CookieJar,
    user: User,
    status: StatusCode,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), ApiError> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(user.id).map_err(ApiError::Internal)?;
    let refresh_token = keys.sign_refresh(user.id).map_err(ApiError::Internal)?;

    let secure = state.config.production && is_https(headers);
    let jar = set_session_cookies(jar, &state.config.cookies, &access_token, &refresh_token, secure);

    Ok((
        status,
        jar,
        Json(AuthResponse {
            status: "success",
            access_token,
            refresh_token,
            user: PublicUser::from(user),
        }),
    ))
}

fn is_https(headers: &HeaderMap) -> bool {
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

/// Verification links point back at this deployment, derived from the
/// request the way a reverse proxy presents it.
fn verify_url_base(headers: &HeaderMap) -> String {
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{proto}://{host}/api/v1/auth/verify-email/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn https_detection_reads_the_forwarded_proto() {
        let mut headers = HeaderMap::new();
        assert!(!is_https(&headers));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert!(is_https(&headers));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
        assert!(!is_https(&headers));
    }

    #[test]
    fn verify_url_base_uses_request_host() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("api.example.com"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(
            verify_url_base(&headers),
            "https://api.example.com/api/v1/auth/verify-email/"
        );
    }
}
