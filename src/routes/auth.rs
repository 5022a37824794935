//! Authentication route handlers
//!
//! Provides token issue, refresh, logout, and current-user endpoints.

use crate::auth::{CurrentUser, TokenPair};
use crate::error::{ApiResult, AppError};
use crate::models::{LoginForm, MessageResponse, ProfileQuery, RefreshRequest, UserProfile};
use crate::state::SharedState;
use axum::{
    extract::{Query, State},
    Extension, Form, Json,
};

/// POST /user_auth/token
///
/// Exchange username and password for an access/refresh token pair.
pub async fn login(
    State(state): State<SharedState>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Json<TokenPair>> {
    let tokens = state.sessions.login(&form.username, &form.password).await?;
    Ok(Json(tokens))
}

/// POST /user_auth/refresh-token
///
/// Redeem a refresh token. The presented token is spent either way.
pub async fn refresh(
    State(state): State<SharedState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let tokens = state.sessions.refresh(&req.refresh_token).await?;
    Ok(Json(tokens))
}

/// POST /user_auth/logout
pub async fn logout(
    State(state): State<SharedState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state.sessions.logout(&req.refresh_token).await?;
    Ok(Json(MessageResponse::new("Logged out")))
}

/// GET /current_user/me?detail_level=1|2|3
pub async fn me(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<ProfileQuery>,
) -> ApiResult<Json<UserProfile>> {
    UserProfile::at_detail_level(&user, query.detail_level)
        .map(Json)
        .ok_or_else(|| {
            AppError::BadRequest("Invalid detail level. Please specify 1, 2, or 3.".to_string())
        })
}
