//! The reqwest based HTTP client and transport.
use crate::agent_error::AgentError;
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use candid::Principal;
use ic_request_id::RequestId;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

const NODE_STATUS_PATH: &str = "api/v2/status";

/// The HTTP path for query calls on the replica.
pub fn query_path(canister_id: Principal) -> String {
    format!("api/v2/canister/{}/query", canister_id.to_text())
}

pub fn read_state_path(canister_id: Principal) -> String {
    format!("api/v2/canister/{}/read_state", canister_id.to_text())
}

/// The HTTP path for update calls on the replica.
pub fn update_path(canister_id: Principal) -> String {
    format!("api/v2/canister/{}/call", canister_id.to_text())
}

#[derive(Copy, Clone, Debug)]
pub struct HttpClientConfig {
    pub pool_idle_timeout: Option<Duration>,
    pub pool_max_idle_per_host: usize,
    pub http2_only: bool,
    /// Responses with a larger body are dropped.
    pub max_response_body_size: Option<usize>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            pool_idle_timeout: Some(Duration::from_secs(600)),
            pool_max_idle_per_host: 1,
            http2_only: false,
            max_response_body_size: None,
        }
    }
}

/// An HTTP Client to communicate with a replica.
#[derive(Clone, Debug)]
pub struct HttpClient {
    // Cloning a reqwest client does not clone its connection pool.
    client: reqwest::Client,
    max_response_body_size: Option<usize>,
}

impl HttpClient {
    pub fn new_with_config(config: HttpClientConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host);
        if config.http2_only {
            builder = builder.http2_prior_knowledge();
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::ClientBuildFailed(e.to_string()))?;
        Ok(Self {
            client,
            max_response_body_size: config.max_response_body_size,
        })
    }

    pub fn new() -> Result<Self, TransportError> {
        Self::new_with_config(HttpClientConfig::default())
    }

    fn build_url(url: &Url, end_point: &str) -> Result<Url, TransportError> {
        url.join(end_point).map_err(|e| TransportError::InvalidUrl {
            end_point: end_point.to_string(),
            reason: e.to_string(),
        })
    }

    async fn wait_for_one_http_request(
        &self,
        url: Url,
        request: reqwest::RequestBuilder,
        deadline: Instant,
    ) -> Result<Vec<u8>, TransportError> {
        let response = async {
            let response = request
                .send()
                .await
                .map_err(|e| TransportError::RequestFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
            let status = response.status();
            let body = self.read_body(&url, response).await?;
            if !status.is_success() {
                return Err(TransportError::HttpError {
                    url: url.to_string(),
                    status: status.as_u16(),
                    content: String::from_utf8_lossy(&body).into_owned(),
                });
            }
            Ok(body)
        };
        tokio::time::timeout_at(deadline, response)
            .await
            .map_err(|_| TransportError::TimedOut {
                url: url.to_string(),
            })?
    }

    async fn read_body(
        &self,
        url: &Url,
        mut response: reqwest::Response,
    ) -> Result<Vec<u8>, TransportError> {
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| TransportError::RequestFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?
        {
            if let Some(limit) = self.max_response_body_size {
                if body.len() + chunk.len() > limit {
                    return Err(TransportError::ResponseTooLarge {
                        url: url.to_string(),
                        limit,
                    });
                }
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    pub async fn get_with_response(
        &self,
        url: &Url,
        end_point: &str,
        deadline: Instant,
    ) -> Result<Vec<u8>, TransportError> {
        let url = Self::build_url(url, end_point)?;
        let request = self.client.get(url.clone());
        self.wait_for_one_http_request(url, request, deadline).await
    }

    pub async fn post_with_response(
        &self,
        url: &Url,
        end_point: &str,
        http_body: Vec<u8>,
        deadline: Instant,
    ) -> Result<Vec<u8>, TransportError> {
        let url = Self::build_url(url, end_point)?;
        let request = self
            .client
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/cbor")
            .body(http_body);
        self.wait_for_one_http_request(url, request, deadline).await
    }
}

/// Parses the URL of a replica. The URL must not contain an API path like
/// `/api/v2/canister/_/call`.
pub fn parse_replica_url(url: &str) -> Result<Url, AgentError> {
    let invalid = |reason: String| AgentError::InvalidReplicaUrl {
        url: url.to_string(),
        reason,
    };
    let mut parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", parsed.scheme())));
    }
    if parsed.path().contains("/api/") {
        return Err(invalid("the URL must not contain an API path".to_string()));
    }
    if !parsed.path().ends_with('/') {
        let path = format!("{}/", parsed.path());
        parsed.set_path(&path);
    }
    Ok(parsed)
}

/// A [`Transport`] that talks to a replica over HTTP.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    url: Url,
    http_client: HttpClient,
    request_timeout: Duration,
}

impl ReqwestTransport {
    pub fn create(url: &str) -> Result<Self, AgentError> {
        let http_client = HttpClient::new()?;
        Ok(Self::create_with_client(
            parse_replica_url(url)?,
            http_client,
            Duration::from_secs(30),
        ))
    }

    pub fn create_with_client(url: Url, http_client: HttpClient, request_timeout: Duration) -> Self {
        Self {
            url,
            http_client,
            request_timeout,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.request_timeout
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn call(
        &self,
        effective_canister_id: Principal,
        envelope: Vec<u8>,
        _request_id: RequestId,
    ) -> Result<(), TransportError> {
        self.http_client
            .post_with_response(
                &self.url,
                &update_path(effective_canister_id),
                envelope,
                self.deadline(),
            )
            .await
            .map(|_| ())
    }

    async fn read_state(
        &self,
        effective_canister_id: Principal,
        envelope: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        self.http_client
            .post_with_response(
                &self.url,
                &read_state_path(effective_canister_id),
                envelope,
                self.deadline(),
            )
            .await
    }

    async fn query(
        &self,
        effective_canister_id: Principal,
        envelope: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        self.http_client
            .post_with_response(
                &self.url,
                &query_path(effective_canister_id),
                envelope,
                self.deadline(),
            )
            .await
    }

    async fn status(&self) -> Result<Vec<u8>, TransportError> {
        self.http_client
            .get_with_response(&self.url, NODE_STATUS_PATH, self.deadline())
            .await
    }
}
