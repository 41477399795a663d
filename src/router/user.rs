use axum::{Extension, Json};

use crate::user::User;

/// Current user with its profile.
pub async fn handler(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}
