// Library interface for readm_gateway
// The binary and the integration tests both build on these modules

pub mod app_state;
pub mod config;
pub mod document;
pub mod error;
pub mod helpers;
pub mod http_client;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod source_utils;
pub mod sources;
