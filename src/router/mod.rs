//! HTTP API.

pub mod dashboard;
pub mod login;
pub mod logout;
pub mod profile;
pub mod register;
pub mod settings;
pub mod status;
pub mod user;

use std::sync::LazyLock;

use axum::extract::{FromRequest, Request, State};
use axum::http::header;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use regex_lite::Regex;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError};

use crate::{AppState, ServerError};

const AUTH_SCHEMES: [&str; 2] = ["Token", "Bearer"];

static USERNAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").ok());

/// JSON body, validated before reaching the handler.
///
/// Syntax errors are rejected as is. Shape errors (missing field, wrong
/// type) and validation errors are reported on the offending field.
#[derive(Debug, Clone, Copy, Default)]
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<serde_json::Value>::from_request(req, state).await?;
        let value: T = serde_path_to_error::deserialize(body)?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// Letters, digits and `@.+-_` only.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    match USERNAME.as_ref() {
        Some(regex) if regex.is_match(username) => Ok(()),
        _ => Err(ValidationError::new("invalid_username")),
    }
}

/// Raw token the current request was authenticated with.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

fn parse_authorization(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();

    (AUTH_SCHEMES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(scheme))
        && !token.is_empty())
    .then_some(token)
}

/// Custom middleware for authentification.
///
/// Inserts the active [`crate::user::User`] and its [`BearerToken`] as
/// request extensions.
async fn auth(
    State(state): State<AppState>,
    mut req: Request,
    next: middleware::Next,
) -> Result<Response, ServerError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(parse_authorization)
        .map(str::to_owned)
        .ok_or(ServerError::Unauthorized)?;

    let user_id = state
        .token
        .authenticate(&token)
        .await?
        .ok_or(ServerError::Unauthorized)?;

    let user = match state.accounts.find_by_id(user_id).await? {
        Some(user) if user.is_active => user,
        _ => return Err(ServerError::Unauthorized),
    };

    req.extensions_mut().insert(user);
    req.extensions_mut().insert(BearerToken(token));
    Ok(next.run(req).await)
}

/// Account routes: registration, sessions, profile and settings.
pub fn accounts(state: AppState) -> Router<AppState> {
    let authenticated = Router::new()
        // `POST /logout/` revokes the presented token.
        .route("/logout/", post(logout::logout))
        // `POST /logoutall/` revokes every token of the user.
        .route("/logoutall/", post(logout::logout_all))
        .route("/user/", get(user::handler))
        .route(
            "/profile/",
            get(profile::get).put(profile::update).patch(profile::update),
        )
        .route(
            "/settings/",
            get(settings::get).put(settings::update).patch(settings::update),
        )
        .route_layer(middleware::from_fn_with_state(state, auth));

    Router::new()
        .route("/register/", post(register::handler))
        .route("/login/", post(login::handler))
        .merge(authenticated)
}

/// Dashboard routes. Authorization required.
pub fn dashboard(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard/", get(dashboard::handler))
        .route("/api/dashboard/", get(dashboard::handler))
        .route_layer(middleware::from_fn_with_state(state, auth))
}
