//! Application state for the Actix-web server
//!
//! `AppState` is wrapped in `web::Data` and shared by every handler. It is built
//! explicitly at startup (or in tests, around a fake fetcher); nothing in the crate
//! reaches for a global source instance.

use crate::metrics::MetricsTracker;
use crate::sources::readm::Readm;
use std::sync::Arc;

pub struct AppState {
    /// The Readm source, holding the shared rate-limited fetcher
    pub source: Readm,
    /// Per-host fetch metrics, shared with the HTTP client
    pub metrics: Arc<MetricsTracker>,
}

impl AppState {
    pub fn new(source: Readm, metrics: Arc<MetricsTracker>) -> Self {
        Self { source, metrics }
    }
}
