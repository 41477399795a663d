use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::router::Valid;
use crate::user::{User, UserBuilder, UserType};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(
        length(
            min = 1,
            max = 150,
            message = "Username must be 1 to 150 characters long."
        ),
        custom(
            function = "crate::router::validate_username",
            message = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
        )
    )]
    pub username: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(length(
        min = 8,
        message = "This password is too short. It must contain at least 8 characters."
    ))]
    pub password: String,
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: Option<String>,
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: Option<String>,
    pub user_type: Option<UserType>,
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub company_name: Option<String>,
    #[validate(length(max = 20, message = "Ensure this field has no more than 20 characters."))]
    pub phone_number: Option<String>,
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub business_sector: Option<String>,
    #[validate(length(max = 50, message = "Ensure this field has no more than 50 characters."))]
    pub state: Option<String>,
}

/// Returned on registration and login.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub user: User,
    pub token: String,
}

/// Handler to create an account, its profile, and a first token.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let password = state
        .crypto
        .pwd
        .hash_password(&body.password)
        .map_err(|err| ServerError::internal("cannot hash password", err))?;

    let new_user = UserBuilder::new()
        .username(body.username)
        .email(body.email)
        .password(password)
        .first_name(body.first_name)
        .last_name(body.last_name)
        .user_type(body.user_type)
        .company_name(body.company_name)
        .phone_number(body.phone_number)
        .business_sector(body.business_sector)
        .state(body.state)
        .build();

    let user = state.accounts.create(&new_user, state.clock.now()).await?;
    let token = state.token.create(user.id).await?;

    tracing::info!(user_id = user.id, "account created");

    Ok(Json(Response { user, token }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use super::*;
    use crate::error::ResponseError;
    use crate::test_util::{TestContext, body_json, fixed_now};
    use crate::user::DEFAULT_LANGUAGE;
    use crate::{app, make_request};

    fn body() -> serde_json::Value {
        json!({
            "username": "ada",
            "email": "ada@Example.COM",
            "password": "correct-horse",
            "first_name": "Ada",
            "user_type": "business",
            "company_name": "Analytical Engines",
        })
    }

    #[tokio::test]
    async fn test_register_handler() {
        let ctx = TestContext::new();
        let response = make_request(
            app(ctx.state.clone()),
            Method::POST,
            "/register/",
            None,
            body().to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: Response = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(body.user.username, "ada");
        assert_eq!(body.user.email, "ada@example.com");
        assert_eq!(body.user.user_type, UserType::Business);
        assert_eq!(body.token.len(), 64);

        // Profile is created with defaults alongside the account.
        let stored = ctx.accounts.get(body.user.id).unwrap();
        assert_eq!(stored.profile.user, stored.id);
        assert_eq!(stored.profile.preferred_language, DEFAULT_LANGUAGE);
        assert!(!stored.profile.vat_registered);
        assert_eq!(stored.profile.created_at, fixed_now());
        assert!(stored.password.starts_with("$argon2id$"));

        assert_eq!(
            ctx.state.token.authenticate(&body.token).await.unwrap(),
            Some(stored.id)
        );
    }

    #[tokio::test]
    async fn test_register_under_api_prefix() {
        let ctx = TestContext::new();
        let response = make_request(
            app(ctx.state.clone()),
            Method::POST,
            "/api/auth/register/",
            None,
            body().to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let ctx = TestContext::new();
        ctx.signed_in("ada", "correct-horse").await;

        let response = make_request(
            app(ctx.state.clone()),
            Method::POST,
            "/register/",
            None,
            body().to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ResponseError = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(body.errors.unwrap()[0].field, "username");
        assert_eq!(ctx.accounts.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_fields() {
        let ctx = TestContext::new();
        let response = make_request(
            app(ctx.state.clone()),
            Method::POST,
            "/register/",
            None,
            json!({
                "username": "ada lovelace",
                "email": "not-an-email",
                "password": "short",
            })
            .to_string(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ResponseError = serde_json::from_value(body_json(response).await).unwrap();
        let fields: Vec<_> = body.errors.unwrap().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, ["email", "password", "username"]);
        assert_eq!(ctx.accounts.len(), 0);
    }

    #[tokio::test]
    async fn test_missing_or_mistyped_field() {
        let ctx = TestContext::new();

        let cases = [
            (json!({ "email": "a@b.co", "password": "correct-horse" }), "username"),
            (
                json!({
                    "username": "ada",
                    "email": "a@b.co",
                    "password": "correct-horse",
                    "user_type": "corporate",
                }),
                "user_type",
            ),
            (
                json!({ "username": 42, "email": "a@b.co", "password": "correct-horse" }),
                "username",
            ),
        ];

        for (payload, field) in cases {
            let response = make_request(
                app(ctx.state.clone()),
                Method::POST,
                "/register/",
                None,
                payload.to_string(),
            )
            .await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: ResponseError = serde_json::from_value(body_json(response).await).unwrap();
            let errors = body.errors.unwrap();
            assert_eq!(errors[0].field, field);
        }

        let response = make_request(
            app(ctx.state.clone()),
            Method::POST,
            "/register/",
            None,
            json!({ "email": "a@b.co", "password": "correct-horse" }).to_string(),
        )
        .await;
        let body: ResponseError = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(body.errors.unwrap()[0].message, "This field is required.");
        assert_eq!(ctx.accounts.len(), 0);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let ctx = TestContext::new();
        let response = make_request(
            app(ctx.state.clone()),
            Method::POST,
            "/register/",
            None,
            "{\"username\":".into(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
