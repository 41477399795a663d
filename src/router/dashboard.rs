use axum::extract::State;
use axum::{Extension, Json};

use crate::AppState;
use crate::dashboard::{Dashboard, aggregate};
use crate::error::Result;
use crate::user::User;

/// Dashboard of the current user.
pub async fn handler(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Dashboard>> {
    let dashboard = aggregate(
        state.activity.as_ref(),
        user,
        state.clock.now(),
        state.config.time_zone(),
    )
    .await?;

    Ok(Json(dashboard))
}
