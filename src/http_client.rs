use crate::error::TransportError;
use crate::metrics::MetricsTracker;
use crate::source_utils::{FetchRequest, Fetcher};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use rand::Rng;
use reqwest::{Client, ClientBuilder, Url};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// User agents to rotate through between requests
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Configuration for the upstream HTTP client
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub max_retries: usize,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub requests_per_second: u32,
    pub enable_cookies: bool,
    pub enable_gzip: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_retries: 3,
            initial_retry_delay_ms: 500,
            max_retry_delay_ms: 8000,
            requests_per_second: 4,
            enable_cookies: true,
            enable_gzip: true,
        }
    }
}

/// Rate-limited HTTP client with retry and exponential backoff
///
/// One instance is shared by every gateway request, so the token bucket bounds the
/// total request rate against the upstream site, not the rate per request.
pub struct EnhancedHttpClient {
    client: Client,
    config: HttpClientConfig,
    limiter: DirectLimiter,
    metrics: Arc<MetricsTracker>,
}

impl EnhancedHttpClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self, reqwest::Error> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .cookie_store(config.enable_cookies)
            .gzip(config.enable_gzip)
            .brotli(config.enable_gzip)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            client,
            config,
            limiter,
            metrics: Arc::new(MetricsTracker::new()),
        })
    }

    /// Report into a tracker shared with the rest of the application
    pub fn with_metrics(mut self, metrics: Arc<MetricsTracker>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<MetricsTracker> {
        &self.metrics
    }

    fn random_user_agent() -> &'static str {
        let mut rng = rand::thread_rng();
        USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
    }

    /// Exponential backoff with ±25% jitter, capped at `max_retry_delay_ms`
    fn calculate_retry_delay(&self, attempt: usize) -> Duration {
        let base_delay = self.config.initial_retry_delay_ms;
        let max_delay = self.config.max_retry_delay_ms;

        let factor = 2u64.saturating_pow(attempt.min(32) as u32);
        let delay_ms = base_delay.saturating_mul(factor).min(max_delay);

        let jitter = rand::thread_rng().gen_range(0.75..=1.25);
        Duration::from_millis((delay_ms as f64 * jitter) as u64)
    }

    fn is_retryable_status(status: reqwest::StatusCode) -> bool {
        matches!(
            status.as_u16(),
            // Rate limiting
            429 |
            // Server errors
            500 | 502 | 503 | 504 |
            // Cloudflare errors
            520 | 521 | 522 | 523 | 524 | 525 | 526 | 527
        )
    }

    fn is_retryable(error: &TransportError) -> bool {
        match error {
            TransportError::Request { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            TransportError::Status { status, .. } => Self::is_retryable_status(*status),
            TransportError::InvalidUrl(_) => false,
        }
    }

    /// Wait for a slot in the shared request budget
    pub async fn acquire_slot(&self) {
        self.limiter.until_ready().await;
    }

    async fn send_once(&self, request: &FetchRequest, url: &Url) -> Result<String, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), url.clone())
            .header("User-Agent", Self::random_user_agent())
            .header("Accept-Language", "en-US,en;q=0.9");

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|source| TransportError::Request {
            url: request.url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: request.url.clone(),
                status,
            });
        }

        response.text().await.map_err(|source| TransportError::Request {
            url: request.url.clone(),
            source,
        })
    }

    /// Send a request, retrying transport failures and retryable statuses
    pub async fn execute(&self, request: &FetchRequest) -> Result<String, TransportError> {
        let url = Url::parse(&request.url)
            .map_err(|_| TransportError::InvalidUrl(request.url.clone()))?;
        let host = url.host_str().unwrap_or("unknown").to_string();

        let mut attempt = 0;
        loop {
            self.acquire_slot().await;
            let started = Instant::now();

            match self.send_once(request, &url).await {
                Ok(body) => {
                    self.metrics.record_success(&host, started.elapsed());
                    return Ok(body);
                }
                Err(e) if attempt < self.config.max_retries && Self::is_retryable(&e) => {
                    log::warn!(
                        "Request failed for {}, attempt {}/{}: {}",
                        request.url,
                        attempt + 1,
                        self.config.max_retries + 1,
                        e
                    );
                    self.metrics.record_retry(&host);
                    sleep(self.calculate_retry_delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    self.metrics.record_failure(&host, &e);
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl Fetcher for EnhancedHttpClient {
    async fn fetch(&self, request: FetchRequest) -> Result<String, TransportError> {
        self.execute(&request).await
    }
}
