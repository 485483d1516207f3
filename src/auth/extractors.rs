use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use crate::auth::cookies::ACCESS_TOKEN_COOKIE;
use crate::auth::jwt::JwtKeys;
use crate::auth::repo_types::{User, UserRole};
use crate::error::ApiError;
use crate::state::AppState;

/// Route guard: resolves the bearer of a valid access token to a live user
/// and attaches the record to the request. A token whose user is gone or
/// deactivated is rejected, as is one issued before the last password
/// change.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .or_else(|| cookie_token(&parts.headers))
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized, please log in".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_access(&token).map_err(|err| {
            warn!(error = %err, "access token rejected");
            ApiError::Unauthorized("Invalid or expired token".into())
        })?;

        let Some(user) = User::find_by_id(&state.db, claims.sub).await? else {
            return Err(ApiError::Unauthorized(
                "The user belonging to this token no longer exists".into(),
            ));
        };
        if !user.active {
            return Err(ApiError::Unauthorized(
                "The user belonging to this token no longer exists".into(),
            ));
        }
        if user.was_password_changed(claims.iat) {
            return Err(ApiError::Unauthorized(
                "Password was recently changed, please log in again".into(),
            ));
        }

        Ok(CurrentUser(user))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::to_owned)
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().to_owned())
}

/// Second guard: the attached user's role must be in the allowed set.
pub fn restricted_to(user: &User, allowed: &[UserRole]) -> Result<(), ApiError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Not allowed to access this resource".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::fake_user;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_is_extracted_from_the_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn non_bearer_schemes_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn cookie_token_falls_back_to_the_access_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("accessToken=tok; other=x"),
        );
        assert_eq!(cookie_token(&headers).as_deref(), Some("tok"));
    }

    #[test]
    fn role_guard_matrix() {
        let mut user = fake_user();

        user.role = UserRole::User;
        assert!(restricted_to(&user, &[UserRole::Admin]).is_err());
        assert!(restricted_to(&user, &[UserRole::User]).is_ok());

        user.role = UserRole::Admin;
        assert!(restricted_to(&user, &[UserRole::Admin]).is_ok());
        assert!(restricted_to(&user, &[UserRole::Admin, UserRole::Author]).is_ok());

        user.role = UserRole::Author;
        assert!(restricted_to(&user, &[UserRole::Admin]).is_err());
    }

    #[test]
    fn forbidden_role_maps_to_403() {
        let user = fake_user();
        let err = restricted_to(&user, &[UserRole::Admin]).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }
}
