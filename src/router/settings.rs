//! Flat settings over account and profile.

use axum::extract::State;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;
use crate::user::{SettingsChanges, SettingsView, User};

pub async fn get(Extension(user): Extension<User>) -> Json<SettingsView> {
    Json(SettingsView::from(&user))
}

/// Apply a settings payload. Both entities are written in one transaction,
/// so a failure leaves neither changed. `email` is ignored.
pub async fn update(
    State(state): State<AppState>,
    Extension(mut user): Extension<User>,
    Valid(body): Valid<SettingsChanges>,
) -> Result<Json<SettingsView>> {
    let (account, profile) = body.split();

    account.apply(&mut user);
    if !profile.is_empty() {
        profile.apply(&mut user.profile, state.clock.now());
    }

    state.accounts.save(&user).await?;

    Ok(Json(SettingsView::from(&user)))
}
