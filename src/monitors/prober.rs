//! HTTP prober
//!
//! The prober performs exactly one request per call and never touches
//! storage. Network access goes through the [`Transport`] trait so the
//! coordinator can be exercised against a fake.
//!
//! ## Outcome mapping
//!
//! ```text
//! response, status in [200, 400)  → success, status + latency recorded
//! response, any other status      → failure, status + latency recorded
//! timeout                         → failure, "Request timeout"
//! other transport error           → failure, cause text
//! ```

use std::error::Error as _;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::redirect::Policy;
use tracing::{debug, instrument, warn};

use crate::config::ProberConfig;
use crate::storage::schema::{Endpoint, HttpMethod, NewCheckResult, TIMEOUT_MESSAGE};

/// A response that made it back to the prober
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportResponse {
    pub status: u16,

    /// Wall-clock time from sending the request to receiving the response head
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// The request did not complete within its timeout
    Timeout,

    /// DNS, connection, TLS or protocol failure
    Failed(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout => f.write_str(TIMEOUT_MESSAGE),
            TransportError::Failed(cause) => f.write_str(cause),
        }
    }
}

impl std::error::Error for TransportError {}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        method: HttpMethod,
        url: &str,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport
///
/// The client is built once and reused for every probe. Redirects are
/// followed up to `max_redirects`; TLS certificates are verified unless the
/// operator turns `verify_tls` off.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ProberConfig) -> Result<Self, reqwest::Error> {
        if !config.verify_tls {
            warn!("TLS certificate verification is disabled for probes");
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        Ok(Self { client })
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
    }
}

/// Flatten an error and its sources into one line
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        method: HttpMethod,
        url: &str,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let start = tokio::time::Instant::now();

        let response = self
            .client
            .request(to_reqwest_method(method), url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Failed(error_chain(&e))
                }
            })?;

        Ok(TransportResponse {
            status: response.status().as_u16(),
            elapsed: start.elapsed(),
        })
    }
}

/// Probes endpoints through a shared transport
#[derive(Clone)]
pub struct Prober {
    transport: Arc<dyn Transport>,
}

impl Prober {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Build a prober on top of a reqwest client configured from `config`
    pub fn http(config: &ProberConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(Arc::new(HttpTransport::new(config)?)))
    }

    /// Issue one request against `endpoint` bounded by `timeout_seconds`
    #[instrument(skip(self, endpoint), fields(endpoint_id = endpoint.id, method = %endpoint.method, path = %endpoint.path))]
    pub async fn probe(&self, endpoint: &Endpoint, timeout_seconds: u64) -> NewCheckResult {
        let url = endpoint.url();
        let timeout = Duration::from_secs(timeout_seconds);

        let outcome = self.transport.execute(endpoint.method, &url, timeout).await;
        let checked_at = Utc::now();

        match outcome {
            Ok(response) => {
                let response_time_ms = response.elapsed.as_secs_f64() * 1000.0;
                let success = (200..400).contains(&response.status);
                debug!(
                    "probed {} {}: {} ({:.2}ms)",
                    endpoint.method, url, response.status, response_time_ms
                );

                NewCheckResult {
                    endpoint_id: endpoint.id,
                    status_code: Some(response.status),
                    response_time_ms: Some(response_time_ms),
                    success,
                    error_message: None,
                    checked_at,
                }
            }
            Err(e) => {
                warn!("probe of {} {} failed: {}", endpoint.method, url, e);

                NewCheckResult {
                    endpoint_id: endpoint.id,
                    status_code: None,
                    response_time_ms: None,
                    success: false,
                    error_message: Some(e.to_string()),
                    checked_at,
                }
            }
        }
    }
}
