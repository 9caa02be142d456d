//! The seam between the Readm source and the network.
//!
//! Sources build a [`FetchRequest`] and hand it to a [`Fetcher`]. The production
//! implementation is [`crate::http_client::EnhancedHttpClient`]; tests plug in a
//! fake that serves fixtures from memory.

use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::Method;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body.into()),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request and return the response body as text
    async fn fetch(&self, request: FetchRequest) -> Result<String, TransportError>;
}
