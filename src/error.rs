//! Error types shared by the fetcher, the extraction functions and the gateway.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

/// Failures raised while talking to the upstream site
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Upstream returned status {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Invalid request url: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Request { source, .. } if source.is_timeout())
    }
}

/// Errors surfaced by the Readm source operations
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// A mandatory element is missing from the page
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// A JSON endpoint no longer returns the shape we expect
    #[error("Upstream contract changed: {0}")]
    UpstreamContract(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Requested a section which doesn't exist: {0}")]
    InvalidSection(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ScrapeError {
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::MalformedDocument(_) => "malformed_document",
            ScrapeError::UpstreamContract(_) => "upstream_contract",
            ScrapeError::Transport(_) => "transport",
            ScrapeError::InvalidSection(_) => "invalid_section",
            ScrapeError::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl ResponseError for ScrapeError {
    fn status_code(&self) -> StatusCode {
        match self {
            ScrapeError::MalformedDocument(_) | ScrapeError::UpstreamContract(_) => {
                StatusCode::BAD_GATEWAY
            }
            ScrapeError::Transport(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            ScrapeError::Transport(_) => StatusCode::BAD_GATEWAY,
            ScrapeError::InvalidSection(_) => StatusCode::NOT_FOUND,
            ScrapeError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }))
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
