use crate::error::Result;
use crate::request::ApiRequest;
use crate::response::Response;
use reqwest::blocking::{Client, ClientBuilder};
use std::time::{Duration, Instant};
use tracing::debug;

/// Host used when none is configured
pub const DEFAULT_API_HOST: &str = "api.context.io";

/// User-Agent sent with every request
pub const USER_AGENT: &str = concat!("contextio-rs/", env!("CARGO_PKG_VERSION"));

/// Create the default HTTP client for REST API requests
/// with connection pooling and the configured timeouts
pub fn create_rest_client(config: &Config) -> Result<Client> {
    let client = ClientBuilder::new()
        .pool_max_idle_per_host(50)
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .build()?;
    Ok(client)
}

/// Configuration for REST API client
#[derive(Debug, Clone)]
pub struct Config {
    /// URL scheme; only local test doubles should use anything but https
    pub scheme: String,
    /// API host
    pub host: String,
    /// Requests per minute; `None` or `Some(0)` disables pacing
    pub rate: Option<u32>,
    /// Overall request timeout
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scheme: "https".to_string(),
            host: DEFAULT_API_HOST.to_string(),
            rate: None,
            timeout: Duration::from_secs(300), // 5 minutes
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Create a new configuration for the given host
    pub fn new(host: impl Into<String>) -> Self {
        Config {
            host: host.into(),
            ..Config::default()
        }
    }

    /// Override the URL scheme
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Set the pacing rate in requests per minute
    pub fn with_rate(mut self, requests_per_minute: u32) -> Self {
        self.rate = Some(requests_per_minute);
        self
    }

    /// Set the overall request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the base URL for API requests
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

/// Sends a finished request and returns the raw response.
///
/// Implementations must not retry; every failure is reported to the caller.
pub trait Transport: Send + Sync {
    fn send(&self, request: ApiRequest) -> Result<Response>;
}

/// Transport backed by a blocking reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(HttpTransport {
            client: create_rest_client(config)?,
        })
    }

    /// Wrap an already configured reqwest client
    pub fn with_client(client: Client) -> Self {
        HttpTransport { client }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> Result<Response> {
        let method = request.method().clone();
        let url = request.url().clone();

        let start = Instant::now();
        let http_response = self.client.execute(request.into_reqwest())?;
        let status = http_response.status();

        debug!(%method, path = url.path(), %status, elapsed = ?start.elapsed(), "received response");

        let headers = http_response.headers().clone();
        Ok(Response::new(status, headers, Box::new(http_response)))
    }
}
