//! Finassist is the account, settings and dashboard API of a financial
//! assistant.

#[forbid(unsafe_code)]
#[deny(missing_docs, unused_mut)]
mod clock;
pub mod activity;
mod crypto;
pub mod dashboard;
mod database;
pub mod error;
mod router;
pub mod telemetry;
mod token;
pub mod user;

pub mod config;

#[cfg(test)]
mod test_util;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::get;
use axum::{Router, middleware as AxumMiddleware};
pub use error::ServerError;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{
    DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer,
};

use crate::activity::{ActivityRepository, PgActivityRepository};
use crate::clock::{Clock, SystemClock};
use crate::user::{AccountRepository, PgAccountRepository};

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    app: Router,
    method: Method,
    path: &str,
    authorization: Option<&str>,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(authorization) = authorization {
        request = request.header(header::AUTHORIZATION, authorization);
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub crypto: Arc<crypto::Crypto>,
    pub accounts: Arc<dyn AccountRepository>,
    pub activity: Arc<dyn ActivityRepository>,
    pub token: token::TokenManager,
    pub clock: Arc<dyn Clock>,
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        .merge(router::accounts(state.clone()))
        .nest("/api/auth", router::accounts(state.clone()))
        .merge(router::dashboard(state.clone()))
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state(
    config: Arc<config::Configuration>,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let db = match config.postgres {
        Some(ref config) => {
            database::Database::new(
                &config.address,
                &config
                    .username
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config
                    .password
                    .clone()
                    .unwrap_or(database::DEFAULT_CREDENTIALS.into()),
                &config
                    .database
                    .clone()
                    .unwrap_or(database::DEFAULT_DATABASE_NAME.into()),
                config.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
            )
            .await?
        },
        None => {
            return Err("missing `postgres` entry on `config.yaml` file".into());
        },
    };

    // execute migrations scripts on start.
    db.migrate().await?;

    let crypto = Arc::new(crypto::Crypto::new(config.argon2.clone())?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let token = token::TokenManager::new(
        Arc::new(token::PgTokenRepository::new(db.postgres.clone())),
        Arc::clone(&clock),
        config.token.ttl_hours,
    );

    Ok(AppState {
        accounts: Arc::new(PgAccountRepository::new(db.postgres.clone())),
        activity: Arc::new(PgActivityRepository::new(db.postgres)),
        config,
        crypto,
        token,
        clock,
    })
}
