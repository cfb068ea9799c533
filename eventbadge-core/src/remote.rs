//! Client for the spreadsheet-backed registration endpoint

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::TransportError;
use crate::record::SubmissionPayload;

/// What the endpoint told us about a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub status: u16,
    #[serde(default)]
    pub message: Option<String>,
}

/// Single-operation remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn write(&self, payload: &SubmissionPayload) -> Result<Acknowledgement, TransportError>;
}

/// Response body shape of the registration endpoint
#[derive(Debug, Deserialize)]
struct EndpointResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpStore {
    endpoint: Option<String>,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new(endpoint: Option<String>, token: Option<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { endpoint, token, client })
    }

    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        Self::new(
            config.endpoint_url.clone(),
            config.api_token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn write(&self, payload: &SubmissionPayload) -> Result<Acknowledgement, TransportError> {
        let url = self.endpoint.as_deref().ok_or(TransportError::NotConfigured)?;

        debug!(url, "posting registration");

        let mut request = self.client.post(url).json(payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        interpret_response(status.as_u16(), &body)
    }
}

/// Non-2xx is a failure. A 2xx whose JSON body says `success: false` is a
/// rejection. Any other 2xx body counts as accepted.
pub fn interpret_response(status: u16, body: &str) -> Result<Acknowledgement, TransportError> {
    if !(200..300).contains(&status) {
        return Err(TransportError::Status(status));
    }
    match serde_json::from_str::<EndpointResponse>(body) {
        Ok(EndpointResponse { success: false, error, message }) => Err(TransportError::Rejected(
            error.or(message).unwrap_or_else(|| "unspecified".to_string()),
        )),
        Ok(EndpointResponse { message, .. }) => Ok(Acknowledgement { status, message }),
        Err(_) => Ok(Acknowledgement { status, message: None }),
    }
}
