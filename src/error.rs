use std::{collections::BTreeMap, fmt};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::models::Toast;

/// Where every unauthenticated or non-admin caller is sent.
pub const LOGIN_PATH: &str = "/login";

/// Message shown for any transport-level failure; the underlying cause is only logged.
pub const GENERIC_FAILURE: &str = "Something went wrong";

/// ValidationErrors
///
/// Field name to message map produced by a schema check. Ordered so responses are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationErrors(pub BTreeMap<String, String>);

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&joined)
    }
}

/// AppError
///
/// The dashboard's failure taxonomy. Every failure is terminal at the handler boundary:
/// nothing is retried and nothing bubbles past the response.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing, invalid or rejected session. Answered with a redirect, never a message.
    #[error("session is missing or not authorized")]
    Unauthorized,

    /// Network failure, malformed upstream body or an upstream error without an envelope.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Client-side schema check failed; no request was sent.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Upstream answered `success:false`; the message is shown verbatim.
    #[error("{0}")]
    Business(String),

    #[error("unknown resource: {0}")]
    UnknownEntity(String),

    /// A destructive call was attempted without the explicit confirmation step.
    #[error("Are you sure you want to delete this {0}?")]
    ConfirmationRequired(String),

    /// Another mutation for the same panel is still outstanding.
    #[error("A request for this panel is already in progress")]
    Busy,

    /// The panel has no loaded list to mutate against.
    #[error("The panel is still loading or failed to load")]
    NotReady,

    #[error("malformed request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// The text a user sees for this failure.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Transport(_) => GENERIC_FAILURE.to_string(),
            AppError::Validation(_) => "Please fix the highlighted fields".to_string(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::SEE_OTHER,
            AppError::Transport(_) => StatusCode::BAD_GATEWAY,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Business(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownEntity(_) => StatusCode::NOT_FOUND,
            AppError::ConfirmationRequired(_) => StatusCode::PRECONDITION_REQUIRED,
            AppError::Busy => StatusCode::CONFLICT,
            AppError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// ErrorBody
///
/// JSON shape of every failed response. `toast` is present for failures the UI surfaces as
/// a notification; validation failures carry field-level `errors` instead.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toast: Option<Toast>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Unauthorized = self {
            return Redirect::to(LOGIN_PATH).into_response();
        }

        if let AppError::Transport(cause) = &self {
            tracing::error!(%cause, "upstream transport failure");
        }

        let status = self.status();
        let message = self.user_message();
        let body = match self {
            AppError::Validation(errors) => ErrorBody {
                success: false,
                message,
                errors: Some(errors),
                toast: None,
            },
            _ => ErrorBody {
                success: false,
                toast: Some(Toast::error(message.clone())),
                message,
                errors: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Transport(err.to_string())
    }
}
