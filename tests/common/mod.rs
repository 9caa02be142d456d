//! Shared helpers for the integration tests: fixture loading and a fake fetcher
//! that serves canned bodies instead of touching the network.

#![allow(dead_code)]

use async_trait::async_trait;
use readm_gateway::error::TransportError;
use readm_gateway::source_utils::{FetchRequest, Fetcher};
use readm_gateway::sources::readm::{Readm, ReadmOptions};
use reqwest::Url;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub const BASE: &str = "https://readm.org";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("missing fixture {}: {}", path.display(), e))
}

pub fn base_url() -> Url {
    Url::parse(BASE).unwrap()
}

/// Serves fixture bodies by url and records every request it sees
#[derive(Default)]
pub struct FakeFetcher {
    routes: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests for `path` (relative to the site root) with `body`
    pub fn route(self, path: &str, body: impl Into<String>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(format!("{}{}", BASE, path), body.into());
        self
    }

    pub fn route_fixture(self, path: &str, fixture_name: &str) -> Self {
        self.route(path, fixture(fixture_name))
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<String, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.routes.lock().unwrap().get(&request.url) {
            Some(body) => Ok(body.clone()),
            None => Err(TransportError::Status {
                url: request.url,
                status: reqwest::StatusCode::NOT_FOUND,
            }),
        }
    }
}

pub fn readm_with(fetcher: Arc<FakeFetcher>) -> Readm {
    readm_with_options(fetcher, ReadmOptions::default())
}

pub fn readm_with_options(fetcher: Arc<FakeFetcher>, options: ReadmOptions) -> Readm {
    Readm::new(fetcher, base_url(), options)
}
