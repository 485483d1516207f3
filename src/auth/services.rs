use axum::extract::FromRef;
use serde_json::json;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, warn};

use crate::auth::jwt::JwtKeys;
use crate::auth::password::{
    check_password_policy, digest, generate_otp, generate_verify_token, hash_password,
    is_valid_email, verify_password,
};
use crate::auth::repo_types::User;
use crate::error::ApiError;
use crate::state::AppState;

const RESET_OTP_TTL: Duration = Duration::minutes(10);
const VERIFY_TOKEN_TTL: Duration = Duration::hours(24);

/// Unknown email and wrong password collapse into this one answer, and
/// deactivated accounts get it too; the response never reveals which
/// precondition failed.
const BAD_CREDENTIALS: &str = "Incorrect email or password";

const EMAIL_SEND_FAILED: &str = "There was an error sending the email. Try again later!";

pub async fn register(
    state: &AppState,
    email: &str,
    password: &str,
    password_confirm: &str,
    verify_url_base: &str,
) -> Result<User, ApiError> {
    if !is_valid_email(email) {
        return Err(ApiError::Validation("Invalid email address".into()));
    }
    check_password_policy(password).map_err(ApiError::Validation)?;
    if password != password_confirm {
        return Err(ApiError::Validation(
            "Password confirmation does not match".into(),
        ));
    }

    // The write path hashes before persisting; a duplicate email surfaces
    // as Conflict through the error translation.
    let hash =
        hash_password(password, state.config.password_hash_cost).map_err(ApiError::Internal)?;
    let user = User::create(&state.db, email, &hash).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");

    if let Err(err) = state
        .mailer
        .send_templated(
            &user.email,
            "welcome",
            "Welcome aboard!",
            json!({ "firstName": user.first_name }),
        )
        .await
    {
        warn!(error = %err, user_id = %user.id, "welcome email failed");
    }

    // Registration survives a failed verification dispatch; the rollback
    // inside issue_verification guarantees no orphaned token stays
    // redeemable, and the user can request a resend.
    if let Err(err) = issue_verification(state, &user, verify_url_base).await {
        error!(error = %err, user_id = %user.id, "verification email failed during register");
    }

    Ok(user)
}

pub async fn login(state: &AppState, email: &str, password: &str) -> Result<User, ApiError> {
    let Some(user) = User::find_by_email(&state.db, email).await? else {
        warn!(%email, "login with unknown email");
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.into()));
    };
    if !verify_password(password, &user.password_hash).map_err(ApiError::Internal)? {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.into()));
    }
    if !user.active {
        warn!(user_id = %user.id, "login to deactivated account");
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.into()));
    }
    info!(user_id = %user.id, "user logged in");
    Ok(user)
}

/// Mint a fresh access token off a valid refresh token. The refresh token
/// itself is not rotated.
pub async fn refresh_access_token(state: &AppState, refresh_token: &str) -> Result<String, ApiError> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys
        .verify_refresh(refresh_token)
        .map_err(|_| ApiError::Forbidden("Invalid refresh token".into()))?;
    let Some(user) = User::find_by_id(&state.db, claims.sub).await? else {
        return Err(ApiError::Unauthorized("User not found".into()));
    };
    if !user.active {
        return Err(ApiError::Unauthorized("User not found".into()));
    }
    keys.sign_access(user.id).map_err(ApiError::Internal)
}

pub async fn forgot_password(state: &AppState, email: &str) -> Result<(), ApiError> {
    let Some(user) = User::find_by_email(&state.db, email).await? else {
        return Err(ApiError::NotFound(format!(
            "No user exists with email address {email}"
        )));
    };

    let otp = generate_otp();
    let expires_at = OffsetDateTime::now_utc() + RESET_OTP_TTL;
    User::store_reset_digest(&state.db, user.id, &digest(&otp), expires_at).await?;

    if let Err(err) = state
        .mailer
        .send_templated(
            &user.email,
            "password_reset",
            "Your password reset OTP (valid for 10 min)",
            json!({ "otp": otp }),
        )
        .await
    {
        // The code must not stay redeemable if the user never received it.
        User::clear_reset_digest(&state.db, user.id).await?;
        warn!(error = %err, user_id = %user.id, "password reset email failed");
        return Err(ApiError::Delivery(EMAIL_SEND_FAILED.into()));
    }
    info!(user_id = %user.id, "password reset OTP issued");
    Ok(())
}

pub async fn reset_password(
    state: &AppState,
    otp: &str,
    new_password: &str,
) -> Result<User, ApiError> {
    check_password_policy(new_password).map_err(ApiError::Validation)?;
    let Some(user) = User::find_by_reset_digest(&state.db, &digest(otp)).await? else {
        return Err(ApiError::Validation(
            "Reset code is invalid or has expired".into(),
        ));
    };
    let hash =
        hash_password(new_password, state.config.password_hash_cost).map_err(ApiError::Internal)?;
    // set_password stamps password_changed_at and consumes the reset digest,
    // so the same code cannot be redeemed twice.
    let user = User::set_password(&state.db, user.id, &hash).await?;
    info!(user_id = %user.id, "password reset");
    Ok(user)
}

pub async fn change_password(
    state: &AppState,
    user_id: uuid::Uuid,
    current_password: &str,
    new_password: &str,
    confirm_password: &str,
) -> Result<User, ApiError> {
    if new_password != confirm_password {
        return Err(ApiError::Validation(
            "Password confirmation does not match".into(),
        ));
    }
    check_password_policy(new_password).map_err(ApiError::Validation)?;

    let Some(user) = User::find_by_id(&state.db, user_id).await? else {
        return Err(ApiError::NotFound("User not found".into()));
    };
    if !verify_password(current_password, &user.password_hash).map_err(ApiError::Internal)? {
        return Err(ApiError::Unauthorized("Current password is incorrect".into()));
    }

    let hash =
        hash_password(new_password, state.config.password_hash_cost).map_err(ApiError::Internal)?;
    let user = User::set_password(&state.db, user.id, &hash).await?;
    info!(user_id = %user.id, "password changed");
    Ok(user)
}

pub async fn send_verification_email(
    state: &AppState,
    email: &str,
    verify_url_base: &str,
) -> Result<(), ApiError> {
    let Some(user) = User::find_by_email(&state.db, email).await? else {
        return Err(ApiError::NotFound(format!(
            "No user exists with email address {email}"
        )));
    };
    issue_verification(state, &user, verify_url_base).await
}

pub async fn verify_email(state: &AppState, token: &str) -> Result<User, ApiError> {
    let Some(user) = User::find_by_verify_digest(&state.db, &digest(token)).await? else {
        return Err(ApiError::Validation(
            "Verification token is invalid or has expired".into(),
        ));
    };
    let user = User::mark_email_verified(&state.db, user.id).await?;
    info!(user_id = %user.id, "email verified");
    Ok(user)
}

pub async fn google_sign_in(state: &AppState, id_token: &str) -> Result<User, ApiError> {
    let Some(google) = state.google.as_ref() else {
        return Err(ApiError::Validation("Google sign-in is not configured".into()));
    };
    let profile = google.verify_id_token(id_token).await.map_err(|err| {
        warn!(error = %err, "google id token rejected");
        ApiError::Unauthorized("Invalid Google token".into())
    })?;

    let user = match User::find_by_google_id(&state.db, &profile.sub).await? {
        Some(user) => user,
        None => match User::find_by_email(&state.db, &profile.email).await? {
            Some(user) => {
                User::link_google_id(&state.db, user.id, &profile.sub).await?;
                User {
                    google_id: Some(profile.sub.clone()),
                    ..user
                }
            }
            None => {
                // The password slot gets a hash of a throwaway high-entropy
                // secret; these accounts authenticate through Google.
                let hash = hash_password(&generate_verify_token(), state.config.password_hash_cost)
                    .map_err(ApiError::Internal)?;
                let user = User::create_from_google(&state.db, &profile, &hash).await?;
                info!(user_id = %user.id, "user created from google sign-in");
                user
            }
        },
    };

    if !user.active {
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.into()));
    }
    Ok(user)
}

/// Store a fresh verification digest, then send the plaintext token. On
/// dispatch failure the digest is cleared before the error is reported.
async fn issue_verification(
    state: &AppState,
    user: &User,
    verify_url_base: &str,
) -> Result<(), ApiError> {
    let token = generate_verify_token();
    let expires_at = OffsetDateTime::now_utc() + VERIFY_TOKEN_TTL;
    User::store_verify_digest(&state.db, user.id, &digest(&token), expires_at).await?;

    let link = format!("{verify_url_base}{token}");
    if let Err(err) = state
        .mailer
        .send_templated(
            &user.email,
            "verify_email",
            "Email verification",
            json!({ "verificationLink": link }),
        )
        .await
    {
        User::clear_verify_digest(&state.db, user.id).await?;
        warn!(error = %err, user_id = %user.id, "verification email failed");
        return Err(ApiError::Delivery(EMAIL_SEND_FAILED.into()));
    }
    info!(user_id = %user.id, "verification email issued");
    Ok(())
}
