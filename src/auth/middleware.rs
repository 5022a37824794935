//! Authentication middleware
//!
//! Resolves the bearer token on every protected request.

use crate::error::AppError;
use crate::state::SharedState;
use crate::users::User;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};

/// The resolved caller, stored in request extensions
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Reject requests without a valid access token; otherwise attach `CurrentUser`
pub async fn require_auth(
    State(state): State<SharedState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let user = state.sessions.resolve_bearer(bearer.token()).await?;

    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}
