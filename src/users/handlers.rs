use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::extractors::{restricted_to, CurrentUser};
use crate::auth::password::is_valid_phone_number;
use crate::auth::repo_types::{User, UserRole};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::dto::{Pagination, UpdateMeRequest, UserProfile};
use crate::users::repo;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me).patch(update_me).delete(delete_me))
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user).delete(delete_user))
}

#[instrument(skip(current))]
pub async fn get_me(CurrentUser(current): CurrentUser) -> Json<UserProfile> {
    Json(UserProfile::from(current))
}

#[instrument(skip(state, current, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    Json(payload): Json<UpdateMeRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    if let Some(phone) = payload.phone_number.as_deref() {
        if !is_valid_phone_number(phone) {
            return Err(ApiError::Validation("Invalid phone number".into()));
        }
    }
    let user = repo::update_profile(&state.db, current.id, &payload).await?;
    Ok(Json(UserProfile::from(user)))
}

#[instrument(skip(state, current))]
pub async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
) -> Result<StatusCode, ApiError> {
    repo::deactivate(&state.db, current.id).await?;
    info!(user_id = %current.id, "user deactivated their account");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, current))]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    restricted_to(&current, &[UserRole::Admin])?;
    let users = repo::list(&state.db, p.limit, p.offset).await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

#[instrument(skip(state, current))]
pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserProfile>, ApiError> {
    restricted_to(&current, &[UserRole::Admin])?;
    let Some(user) = User::find_by_id(&state.db, id).await? else {
        return Err(ApiError::NotFound("User not found".into()));
    };
    Ok(Json(UserProfile::from(user)))
}

#[instrument(skip(state, current))]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    restricted_to(&current, &[UserRole::Admin])?;
    if !repo::deactivate(&state.db, id).await? {
        return Err(ApiError::NotFound("User not found".into()));
    }
    info!(user_id = %id, admin_id = %current.id, "user deactivated by admin");
    Ok(StatusCode::NO_CONTENT)
}
