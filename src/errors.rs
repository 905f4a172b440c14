use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chat_core::ErrorBody;
use thiserror::Error;
use tracing::error;

/// Message sent to the browser for any provider-side failure. The cause is
/// only written to the server log.
pub const GENERIC_FAILURE: &str = "Model not found or API error. Check server console.";

/// Top-level application error.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Configuration errors ─────────────────────────────────────────────────
    #[error("Environment variable '{name}' must be set")]
    MissingEnv { name: String },

    #[error("Environment variable '{name}' has invalid value '{value}'")]
    InvalidEnv { name: String, value: String },

    // ── Provider errors ──────────────────────────────────────────────────────
    #[error("Failed to build Gemini client: {message}")]
    ClientSetup { message: String },

    #[error("Gemini API unavailable at {host}")]
    ProviderUnavailable { host: String },

    #[error("Gemini API returned {status}: {body}")]
    ProviderStatus { status: u16, body: String },

    #[error("Model '{model_name}' not found in Gemini API")]
    ModelNotFound { model_name: String },

    #[error("Inference error: {message}")]
    InferenceError { message: String },

    #[error("Malformed response from Gemini API: {message}")]
    MalformedResponse { message: String },

    // ── Request errors ───────────────────────────────────────────────────────
    #[error("Invalid chat request: {message}")]
    InvalidRequest { message: String },
}

impl AppError {
    pub fn malformed(message: impl Into<String>) -> Self {
        AppError::MalformedResponse { message: message.into() }
    }

    pub fn is_agent_unavailable(&self) -> bool {
        matches!(self, AppError::ProviderUnavailable { .. })
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::InvalidRequest { .. })
    }

    pub fn status(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if self.is_client_error() {
            ErrorBody::new(self.to_string())
        } else {
            error!("Error details: {self}");
            ErrorBody::new(GENERIC_FAILURE)
        };
        (status, Json(body)).into_response()
    }
}
