use axum::Extension;
use axum::extract::State;
use axum::http::StatusCode;

use crate::AppState;
use crate::error::Result;
use crate::router::BearerToken;
use crate::user::User;

/// Revoke the token used by the request.
pub async fn logout(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<StatusCode> {
    state.token.revoke(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Revoke every token of the current user.
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<StatusCode> {
    state.token.revoke_all(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
