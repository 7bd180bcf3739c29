use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, error, instrument, warn};
use url::Url;

use super::{ProductGateway, SubmitReceipt};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::{Product, ProductPayload};

/// Gateway backed by a single HTTP endpoint.
///
/// `GET` on the endpoint returns the JSON array of products. `POST` takes the
/// JSON payload as a `text/plain` body; the response body is never read.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: Url,
    breaker: CircuitBreaker,
}

impl HttpGateway {
    pub fn new(
        endpoint: &str,
        timeout: Duration,
        breaker: CircuitBreaker,
    ) -> Result<Self, ServiceError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            ServiceError::ConfigError(format!("invalid gateway url '{}': {}", endpoint, e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("production-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServiceError::ConfigError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            breaker,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let breaker = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: config.circuit_breaker_failure_threshold,
            timeout: Duration::from_secs(config.circuit_breaker_timeout_secs),
            ..Default::default()
        });
        Self::new(
            &config.gateway_url,
            Duration::from_secs(config.request_timeout_secs),
            breaker,
        )
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    async fn get_snapshot(&self) -> Result<Vec<Product>, ServiceError> {
        let response = self.client.get(self.endpoint.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::GatewayStatus {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }
        Ok(response.json::<Vec<Product>>().await?)
    }
}

#[async_trait]
impl ProductGateway for HttpGateway {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch_products(&self) -> Result<Vec<Product>, ServiceError> {
        counter!("gateway.fetch.total", 1);
        let started = Instant::now();

        let result = self.breaker.call(|| self.get_snapshot()).await;

        histogram!(
            "gateway.fetch.duration_ms",
            started.elapsed().as_secs_f64() * 1000.0
        );
        match &result {
            Ok(products) => debug!(count = products.len(), "fetched product snapshot"),
            Err(e) => {
                counter!("gateway.fetch.failures", 1);
                error!(error = %e, kind = e.kind(), "failed to fetch products");
            }
        }
        result
    }

    #[instrument(skip(self, payload), fields(action = %payload.action(), id = ?payload.target_id()))]
    async fn submit(&self, payload: &ProductPayload) -> Result<SubmitReceipt, ServiceError> {
        let body = serde_json::to_string(payload)?;
        counter!("gateway.submit.total", 1);

        let result = self
            .breaker
            .call(|| async move {
                let response = self
                    .client
                    .post(self.endpoint.clone())
                    .header(CONTENT_TYPE, "text/plain")
                    .body(body)
                    .send()
                    .await?;
                Ok(SubmitReceipt::with_status(response.status().as_u16()))
            })
            .await;

        match &result {
            Ok(receipt) => match receipt.status {
                Some(status) if !(200..400).contains(&status) => {
                    warn!(status, "gateway answered write with an error status; outcome unknown")
                }
                _ => debug!(status = ?receipt.status, "write handed to gateway"),
            },
            Err(e) => {
                counter!("gateway.submit.failures", 1);
                error!(error = %e, kind = e.kind(), "failed to submit product mutation");
            }
        }
        result
    }
}
