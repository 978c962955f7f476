//! Per-instance load sampling.
//!
//! `HttpLoadSampler` scrapes `http://<address>:<port>/metrics` over a plain
//! HTTP/1 connection and counts the runner's jobs in the payload. Every
//! scrape is bounded by a timeout.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use thiserror::Error;
use tracing::debug;

use runnerscale_fleet::{ControllerConfig, ResolvedInstance};

use crate::exposition::count_jobs;

/// Path the runner serves its Prometheus metrics on.
const METRICS_PATH: &str = "/metrics";

/// Reasons a single sample can fail.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("failed to read body: {0}")]
    Body(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Reads the current job count of one instance.
#[async_trait]
pub trait LoadSampler: Send + Sync {
    async fn sample(&self, instance: &ResolvedInstance) -> Result<u64, SampleError>;
}

/// Scrapes a runner's Prometheus endpoint.
#[derive(Debug, Clone)]
pub struct HttpLoadSampler {
    port: u16,
    timeout: Duration,
    prefix: String,
}

impl HttpLoadSampler {
    pub fn new(port: u16, timeout: Duration, prefix: impl Into<String>) -> Self {
        Self {
            port,
            timeout,
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(
            config.metrics_port,
            config.sample_timeout,
            config.job_metric_prefix.clone(),
        )
    }

    /// The `host:port` authority for an instance address.
    fn authority(&self, address: &str) -> String {
        if address.contains(':') {
            format!("[{address}]:{}", self.port)
        } else {
            format!("{address}:{}", self.port)
        }
    }

    /// The URL scraped for an instance address.
    pub fn metrics_url(&self, address: &str) -> String {
        format!("http://{}{METRICS_PATH}", self.authority(address))
    }

    async fn fetch(&self, authority: &str) -> Result<String, SampleError> {
        let stream = tokio::net::TcpStream::connect(authority)
            .await
            .map_err(|e| SampleError::Connect(e.to_string()))?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| SampleError::Connect(e.to_string()))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(METRICS_PATH)
            .header("host", authority)
            .header("user-agent", "runnerscale/0.1")
            .body(Empty::<Bytes>::new())
            .map_err(|e| SampleError::Request(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| SampleError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SampleError::Status(resp.status().as_u16()));
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| SampleError::Body(e.to_string()))?
            .to_bytes();

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl LoadSampler for HttpLoadSampler {
    async fn sample(&self, instance: &ResolvedInstance) -> Result<u64, SampleError> {
        let authority = self.authority(&instance.address);
        debug!(instance = %instance.instance_id, url = %self.metrics_url(&instance.address), "fetching runner metrics");

        let payload = tokio::time::timeout(self.timeout, self.fetch(&authority))
            .await
            .map_err(|_| SampleError::Timeout(self.timeout))??;

        Ok(count_jobs(&payload, &self.prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler() -> HttpLoadSampler {
        HttpLoadSampler::new(9252, Duration::from_secs(15), "gitlab_runner_jobs{")
    }

    #[test]
    fn metrics_url_for_ipv4() {
        assert_eq!(
            sampler().metrics_url("10.0.1.17"),
            "http://10.0.1.17:9252/metrics"
        );
    }

    #[test]
    fn metrics_url_for_ipv6() {
        assert_eq!(
            sampler().metrics_url("fd00::17"),
            "http://[fd00::17]:9252/metrics"
        );
    }

    #[test]
    fn timeout_message() {
        let err = SampleError::Timeout(Duration::from_secs(15));
        assert_eq!(err.to_string(), "timed out after 15s");
    }
}
