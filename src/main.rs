use actix_web::{web, App, HttpServer};
use readm_gateway::app_state::AppState;
use readm_gateway::config::Config;
use readm_gateway::metrics::MetricsTracker;
use readm_gateway::routes;
use readm_gateway::sources::readm::{Readm, ReadmOptions};
use reqwest::Url;
use std::io;
use std::sync::Arc;

fn init_logging() {
    if let Err(e) = log4rs::init_file("log4rs.yml", Default::default()) {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        log::warn!("log4rs.yml not loaded ({}), logging to stderr", e);
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    init_logging();

    let cfg = Config::load();

    let metrics = Arc::new(MetricsTracker::new());
    let client = cfg
        .http
        .create_http_client()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
        .with_metrics(metrics.clone());

    let base_url = Url::parse(&cfg.source.base_url)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    log::info!("Upstream HTTP client initialized:");
    log::info!("  Base url: {}", base_url);
    log::info!("  Requests per second: {}", cfg.http.requests_per_second);
    log::info!("  Max retries: {}", cfg.http.max_retries);
    log::info!("  Timeout: {}s", cfg.http.timeout_secs);

    let source = Readm::new(
        Arc::new(client),
        base_url,
        ReadmOptions {
            long_strip_threshold: cfg.source.long_strip_threshold,
            max_update_pages: cfg.source.max_update_pages,
        },
    );
    let data = web::Data::new(AppState::new(source, metrics));

    let addr = (cfg.server.host.clone(), cfg.server.port);
    log::info!("Listening on {}:{}", addr.0, addr.1);

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .configure(routes::configure)
    })
    .bind(addr)?
    .run()
    .await
}
