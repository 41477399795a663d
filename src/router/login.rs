use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::router::Valid;
use crate::router::register::Response;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub username: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
}

/// Handler to log in with username and password.
///
/// Unknown usernames, wrong passwords and inactive accounts all yield the
/// same error.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let user = match state.accounts.find_by_username(&body.username).await? {
        Some(user) => {
            // Verify before looking at `is_active` so every known account
            // costs one Argon2 run.
            let verified = state
                .crypto
                .pwd
                .verify_password(&body.password, &user.password)
                .is_ok();
            (verified && user.is_active).then_some(user)
        },
        None => {
            // Spend the same time as a real verification.
            let _ = state.crypto.pwd.hash_password(&body.password);
            None
        },
    }
    .ok_or(ServerError::InvalidCredentials)?;

    let token = state.token.create(user.id).await?;
    tracing::info!(user_id = user.id, "user logged in");

    Ok(Json(Response { user, token }))
}
