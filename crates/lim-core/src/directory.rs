//! Instance lookup against the lim API

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::error::DirectoryError;
use crate::traits::InstanceDirectory;
use crate::types::{InstanceId, RemoteEndpoint};

/// Marker the API puts in the body of unauthenticated responses
const UNAUTHENTICATED_MARKER: &str = "\"message\":\"unauthenticated:";

#[derive(Debug, Deserialize)]
struct InstanceResponse {
    #[serde(default)]
    status: InstanceStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceStatus {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    endpoint_web_socket_url: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

/// [`InstanceDirectory`] backed by `GET /v1/ios_instances/{id}`
#[derive(Debug, Clone)]
pub struct ApiInstanceDirectory {
    client: reqwest::Client,
    base: Url,
    api_key: Option<String>,
}

impl ApiInstanceDirectory {
    /// Create a directory client for the given API endpoint
    pub fn new(api_endpoint: &str, api_key: Option<String>) -> Result<Self, DirectoryError> {
        let base = Url::parse(api_endpoint)
            .map_err(|e| DirectoryError::Api(format!("invalid API endpoint {api_endpoint}: {e}")))?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("lim/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DirectoryError::Api(e.to_string()))?;

        Ok(Self {
            client,
            base,
            api_key,
        })
    }

    fn instance_url(&self, id: &InstanceId) -> Result<Url, DirectoryError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| DirectoryError::Api(format!("API endpoint {} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(["v1", "ios_instances", id.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl InstanceDirectory for ApiInstanceDirectory {
    async fn lookup(&self, id: &InstanceId) -> Result<RemoteEndpoint, DirectoryError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(DirectoryError::Unauthenticated)?;
        let url = self.instance_url(id)?;

        tracing::debug!(instance = %id, url = %url, "Looking up instance");

        let response = self
            .client
            .get(url)
            .bearer_auth(api_key)
            .send()
            .await
            .map_err(|e| DirectoryError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body, id));
        }

        let instance: InstanceResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::Api(format!("unexpected response: {e}")))?;

        let InstanceStatus {
            state,
            endpoint_web_socket_url,
            token,
        } = instance.status;

        match (endpoint_web_socket_url, token) {
            (Some(url), Some(token)) if !url.is_empty() => {
                tracing::debug!(instance = %id, state = ?state, "Resolved endpoint");
                Ok(RemoteEndpoint::new(url, token))
            }
            _ => Err(DirectoryError::NotReady(id.to_string())),
        }
    }
}

fn classify_failure(status: StatusCode, body: &str, id: &InstanceId) -> DirectoryError {
    if status == StatusCode::UNAUTHORIZED || body.contains(UNAUTHENTICATED_MARKER) {
        DirectoryError::Unauthenticated
    } else if status == StatusCode::NOT_FOUND {
        DirectoryError::NotFound(id.to_string())
    } else {
        DirectoryError::Api(format!("HTTP {}: {}", status.as_u16(), body.trim()))
    }
}
