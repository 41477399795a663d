use axum::extract::State;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;
use crate::user::{Profile, ProfileChanges, User};

/// Current user's profile.
pub async fn get(Extension(user): Extension<User>) -> Json<Profile> {
    Json(user.profile)
}

/// Partially update the profile. `PUT` and `PATCH` behave the same.
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Valid(body): Valid<ProfileChanges>,
) -> Result<Json<Profile>> {
    let mut profile = user.profile;
    body.apply(&mut profile, state.clock.now());
    state.accounts.save_profile(&profile).await?;

    Ok(Json(profile))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::test_util::{TestContext, body_json, fixed_now};
    use crate::{app, make_request};

    #[tokio::test]
    async fn test_update_profile() {
        let ctx = TestContext::new();
        let (user, token) = ctx.signed_in("ada", "correct-horse").await;
        let auth = format!("Token {token}");

        let response = make_request(
            app(ctx.state.clone()),
            Method::PATCH,
            "/profile/",
            Some(&auth),
            json!({ "vat_registered": true, "annual_revenue": "2500000.5" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["vat_registered"], true);
        assert_eq!(body["annual_revenue"], "2500000.50");

        let stored = ctx.accounts.get(user.id).unwrap();
        assert!(stored.profile.vat_registered);
        assert_eq!(stored.profile.updated_at, fixed_now());
        assert_eq!(stored.first_name, user.first_name);

        let response = make_request(
            app(ctx.state.clone()),
            Method::GET,
            "/profile/",
            Some(&auth),
            String::default(),
        )
        .await;
        assert_eq!(body_json(response).await["vat_registered"], true);
    }

    #[tokio::test]
    async fn test_invalid_profile() {
        let ctx = TestContext::new();
        let (user, token) = ctx.signed_in("ada", "correct-horse").await;

        let response = make_request(
            app(ctx.state.clone()),
            Method::PUT,
            "/profile/",
            Some(&format!("Token {token}")),
            json!({ "employees_count": -3, "vat_registered": true }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["errors"][0]["field"], "employees_count");
        assert!(!ctx.accounts.get(user.id).unwrap().profile.vat_registered);
    }
}
