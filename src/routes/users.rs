//! Staff account route handlers

use crate::auth::CurrentUser;
use crate::error::{validation_error, ApiResult, AppError};
use crate::models::{CreateUserRequest, SuccessResponse, UpdateUserRequest};
use crate::state::SharedState;
use crate::users::UserResponse;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

/// Header carrying the owner bootstrap secret
pub const INITIALIZE_OWNER_HEADER: &str = "x-initialize-owner-token";

/// POST /users/create
pub async fn create_user(
    State(state): State<SharedState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let user = state.accounts.create_user(&actor, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// PUT /users/edit/{user_id}
pub async fn update_user(
    State(state): State<SharedState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let user = state
        .accounts
        .update_user(&actor, user_id, payload.into())
        .await?;
    Ok(Json(UserResponse::from(user)))
}

/// DELETE /users/delete/{user_id}
pub async fn delete_user(
    State(state): State<SharedState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.accounts.delete_user(&actor, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/list
pub async fn list_users(
    State(state): State<SharedState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    let users = state.accounts.list_users(&actor).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// POST /users/initialize_owner
///
/// One-time owner bootstrap, guarded by a shared secret header instead of a
/// bearer token.
pub async fn initialize_owner(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<UserResponse>>)> {
    let presented = headers
        .get(INITIALIZE_OWNER_HEADER)
        .and_then(|h| h.to_str().ok());
    if presented != Some(state.initialize_owner_key.as_str()) {
        return Err(AppError::Forbidden("Invalid initialization token".to_string()));
    }

    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let owner = state.accounts.initialize_owner(payload.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data(
            "Owner initialized",
            UserResponse::from(owner),
        )),
    ))
}
