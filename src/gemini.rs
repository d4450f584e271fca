//! Wire details shared by the Gemini embedding and generation clients

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::errors::{RagError, Result};

/// Default Gemini REST endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Transport-level ceiling; pipeline stages apply tighter timeouts
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(RagError::Http)
}

/// Resource path for a model, accepting both `name` and `models/name`
pub fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

/// Endpoint URL for a model method such as `generateContent`
pub(crate) fn method_url(base_url: &str, model: &str, method: &str) -> String {
    format!("{}/{}:{}", base_url.trim_end_matches('/'), model_path(model), method)
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// A failed HTTP exchange with the Gemini API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub status: StatusCode,
    /// Canonical status string such as `NOT_FOUND`, when the body has one
    pub code: Option<String>,
    pub message: String,
}

impl ApiFailure {
    pub fn from_body(status: StatusCode, body: &str) -> Self {
        match serde_json::from_str::<ErrorWrapper>(body) {
            Ok(wrapper) => Self {
                status,
                code: wrapper.error.status.filter(|s| !s.is_empty()),
                message: wrapper.error.message.unwrap_or_else(|| body.to_string()),
            },
            Err(_) => Self {
                status,
                code: None,
                message: body.to_string(),
            },
        }
    }

    /// Unknown or inaccessible model identifier
    pub fn is_model_unavailable(&self) -> bool {
        matches!(self.status, StatusCode::NOT_FOUND | StatusCode::FORBIDDEN)
            || matches!(
                self.code.as_deref(),
                Some("NOT_FOUND") | Some("PERMISSION_DENIED")
            )
    }
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "HTTP {} {}: {}", self.status.as_u16(), code, self.message),
            None => write!(f, "HTTP {}: {}", self.status.as_u16(), self.message),
        }
    }
}
