//! Error handler for the API.

use std::sync::LazyLock;

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use sqlx::Error as SQLxError;
use thiserror::Error;
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

pub type Result<T> = std::result::Result<T, ServerError>;

/// Field used for errors not bound to one body field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

const REQUIRED: &str = "This field is required.";

static MISSING_FIELD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"missing field `([^`]+)`").ok());

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error("{field}: {message}")]
    Body { field: String, message: String },

    #[error("SQL request failed: {0}")]
    Sql(#[from] SQLxError),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("internal server error, {details}")]
    Internal {
        details: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("invalid 'Authorization' header")]
    Unauthorized,
}

impl ServerError {
    /// Build a [`ServerError::Internal`] from any error.
    pub fn internal<E>(details: &str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            details: details.to_owned(),
            source: Some(Box::new(err)),
        }
    }

    /// Single field validation error.
    pub fn field(field: &'static str, code: &'static str, message: &'static str) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, ValidationError::new(code).with_message(message.into()));
        Self::Validation(errors)
    }
}

/// A body that is valid JSON but does not fit the expected shape is
/// reported on the offending field.
impl From<serde_path_to_error::Error<serde_json::Error>> for ServerError {
    fn from(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        let path = err.path().to_string();
        let message = err.inner().to_string();

        let missing = MISSING_FIELD
            .as_ref()
            .and_then(|regex| regex.captures(&message))
            .and_then(|captures| captures.get(1))
            .map(|name| name.as_str().to_owned());

        match (missing, path.as_str()) {
            (Some(name), ".") => Self::Body {
                field: name,
                message: REQUIRED.to_owned(),
            },
            (Some(name), parent) => Self::Body {
                field: format!("{parent}.{name}"),
                message: REQUIRED.to_owned(),
            },
            (None, ".") => Self::Body {
                field: NON_FIELD_ERRORS.to_owned(),
                message,
            },
            (None, _) => Self::Body {
                field: path,
                message,
            },
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseError {
    pub r#type: Option<String>,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: Option<String>,
    pub errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(self) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: None,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            instance: None,
            errors: None,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields = Vec::new();
    collect_field_errors(errors, &mut fields);
    // HashMap order is random.
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}

/// Flatten nested errors. Schema-level errors are reported under their code.
fn collect_field_errors(errors: &ValidationErrors, fields: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(issues) => {
                fields.extend(issues.iter().map(|issue| FieldError {
                    field: if *field == "__all__" {
                        issue.code.to_string()
                    } else {
                        field.to_string()
                    },
                    message: issue
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| issue.code.to_string()),
                }))
            },
            ValidationErrorsKind::Struct(nested) => collect_field_errors(nested, fields),
            ValidationErrorsKind::List(items) => items
                .values()
                .for_each(|nested| collect_field_errors(nested, fields)),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default()
            .title("There were validation errors with your request.")
            .details(&self.to_string())
            .status(StatusCode::BAD_REQUEST);

        let response = match &self {
            ServerError::Validation(validation_errors) => response.errors(validation_errors),

            ServerError::Axum(rejection) => response
                .title("Request body could not be parsed.")
                .details(&rejection.body_text()),

            ServerError::Body { field, message } => ResponseError {
                errors: Some(vec![FieldError {
                    field: field.clone(),
                    message: message.clone(),
                }]),
                ..response
            },

            ServerError::InvalidCredentials => {
                let mut errors = ValidationErrors::new();
                errors.add(
                    NON_FIELD_ERRORS,
                    ValidationError::new("invalid_credentials")
                        .with_message("Invalid credentials".into()),
                );
                response
                    .title("Authentication failed.")
                    .status(StatusCode::UNAUTHORIZED)
                    .errors(&errors)
            },

            ServerError::Unauthorized => response
                .title("Missing or invalid 'Authorization' header.")
                .status(StatusCode::UNAUTHORIZED),

            ServerError::Sql(err) => {
                tracing::error!(error = %err, "database request failed");

                ResponseError::default()
            },

            ServerError::Internal { details, source } => {
                tracing::error!(err = ?source, %details, "server returned 500 status");

                ResponseError::default()
            },
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "type": null,
                "title": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
                "instance": null,
                "errors": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}
