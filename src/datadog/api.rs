// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Datadog public API client.
//!
//! Forwarders talk to Datadog through the [`DatadogApi`] trait and obtain validated
//! clients from an [`ApiConnector`]. The production implementation is
//! [`HttpConnector`], which uses `reqwest` with a per-request timeout and retries
//! transient failures (HTTP 429, 5xx, connection errors) with exponential backoff.
//!
//! # Endpoints
//!
//! | Call          | Method | Path               |
//! |---------------|--------|--------------------|
//! | validate      | GET    | `/api/v1/validate` |
//! | post gauge    | POST   | `/api/v1/series`   |
//! | post event    | POST   | `/api/v1/events`   |

use super::event::Event;
use crate::constants::{
    API_KEY_HEADER, APP_KEY_HEADER, EVENTS_PATH, EVENT_SOURCE_TYPE, GAUGE_TYPE, SERIES_PATH,
    VALIDATE_PATH,
};
use crate::errors::DatadogApiError;
use crate::metrics::record_api_request;
use crate::retry::{datadog_backoff, is_retryable_http_status, retry_with_backoff, ExponentialBackoff};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Authenticated access to the Datadog API for one key pair and base URL.
#[async_trait]
pub trait DatadogApi: Send + Sync {
    /// Check the key pair against the validate endpoint.
    ///
    /// # Returns
    ///
    /// `true` when the keys are valid, `false` when Datadog rejects them.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be reached.
    async fn validate(&self) -> Result<bool, DatadogApiError>;

    /// Submit a single gauge point stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the submission fails.
    async fn post_gauge(&self, metric: &str, value: f64, tags: &[String]) -> Result<(), DatadogApiError>;

    /// Submit an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the submission fails.
    async fn post_event(&self, event: &Event, tags: &[String]) -> Result<(), DatadogApiError>;
}

/// Creates validated [`DatadogApi`] clients.
#[async_trait]
pub trait ApiConnector: Send + Sync {
    /// Build a client for `base_url` with the given keys and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`DatadogApiError::InvalidCredentials`] when the keys are rejected,
    /// or another error when the API cannot be reached.
    async fn connect(
        &self,
        base_url: &str,
        api_key: &str,
        app_key: &str,
    ) -> Result<Arc<dyn DatadogApi>, DatadogApiError>;
}

#[derive(Deserialize)]
struct ValidateResponse {
    #[serde(default)]
    valid: bool,
}

/// `reqwest` implementation of [`DatadogApi`].
pub struct HttpDatadogApi {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
    app_key: String,
    backoff: fn() -> ExponentialBackoff,
}

impl HttpDatadogApi {
    fn endpoint(&self, path: &str) -> Result<Url, DatadogApiError> {
        self.base_url
            .join(path)
            .map_err(|e| DatadogApiError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    /// Send one request with retries, returning the final response.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, DatadogApiError> {
        let url = self.endpoint(path)?;

        retry_with_backoff(
            (self.backoff)(),
            || async {
                let mut request = self
                    .client
                    .request(method.clone(), url.clone())
                    .header(API_KEY_HEADER, &self.api_key)
                    .header(APP_KEY_HEADER, &self.app_key);
                if let Some(body) = body {
                    request = request.json(body);
                }

                let response = request.send().await.map_err(|e| SendFailure::Transport {
                    url: url.to_string(),
                    reason: e.to_string(),
                    retryable: e.is_connect() || e.is_timeout(),
                })?;

                if is_retryable_http_status(response.status()) {
                    return Err(SendFailure::Status {
                        url: url.to_string(),
                        status: response.status().as_u16(),
                        body: response.text().await.unwrap_or_default(),
                    });
                }
                Ok(response)
            },
            SendFailure::is_retryable,
            path,
        )
        .await
        .map_err(DatadogApiError::from)
    }

    /// Submit a JSON document and require a success status.
    async fn submit(&self, path: &str, endpoint: &str, body: &Value) -> Result<(), DatadogApiError> {
        let result = async {
            let response = self.send(Method::POST, path, Some(body)).await?;
            let status = response.status();
            if !status.is_success() {
                return Err(DatadogApiError::Status {
                    url: response.url().to_string(),
                    status: status.as_u16(),
                    body: response.text().await.unwrap_or_default(),
                });
            }
            Ok(())
        }
        .await;

        record_api_request(endpoint, result.is_ok());
        result
    }
}

/// Failure of a single attempt, classified for the retry loop.
enum SendFailure {
    Transport {
        url: String,
        reason: String,
        retryable: bool,
    },
    Status {
        url: String,
        status: u16,
        body: String,
    },
}

impl SendFailure {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } => *retryable,
            Self::Status { .. } => true,
        }
    }
}

impl std::fmt::Display for SendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport { url, reason, .. } => write!(f, "request to {url} failed: {reason}"),
            Self::Status { url, status, .. } => write!(f, "request to {url} returned HTTP {status}"),
        }
    }
}

impl From<SendFailure> for DatadogApiError {
    fn from(failure: SendFailure) -> Self {
        match failure {
            SendFailure::Transport { url, reason, .. } => Self::Transport { url, reason },
            SendFailure::Status { url, status, body } => Self::Status { url, status, body },
        }
    }
}

#[async_trait]
impl DatadogApi for HttpDatadogApi {
    async fn validate(&self) -> Result<bool, DatadogApiError> {
        let result = async {
            let response = self.send(Method::GET, VALIDATE_PATH, None).await?;
            let status = response.status();
            let url = response.url().to_string();

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                debug!(url = %url, status = status.as_u16(), "Datadog rejected credentials");
                return Ok(false);
            }
            if !status.is_success() {
                return Err(DatadogApiError::Status {
                    url,
                    status: status.as_u16(),
                    body: response.text().await.unwrap_or_default(),
                });
            }

            let body: ValidateResponse =
                response.json().await.map_err(|e| DatadogApiError::Decode {
                    url,
                    reason: e.to_string(),
                })?;
            Ok(body.valid)
        }
        .await;

        record_api_request("validate", result.is_ok());
        result
    }

    async fn post_gauge(&self, metric: &str, value: f64, tags: &[String]) -> Result<(), DatadogApiError> {
        let body = json!({
            "series": [{
                "metric": metric,
                "points": [[Utc::now().timestamp(), value]],
                "type": GAUGE_TYPE,
                "tags": tags,
            }]
        });
        self.submit(SERIES_PATH, "series", &body).await
    }

    async fn post_event(&self, event: &Event, tags: &[String]) -> Result<(), DatadogApiError> {
        let body = json!({
            "title": event.title,
            "text": event.title,
            "date_happened": Utc::now().timestamp(),
            "event_type": event.event_type.as_str(),
            "source_type_name": EVENT_SOURCE_TYPE,
            "tags": tags,
        });
        self.submit(EVENTS_PATH, "events", &body).await
    }
}

/// [`ApiConnector`] building [`HttpDatadogApi`] clients.
///
/// The underlying `reqwest::Client` (and its connection pool) is shared by every
/// client the connector creates.
#[derive(Clone)]
pub struct HttpConnector {
    client: reqwest::Client,
    backoff: fn() -> ExponentialBackoff,
}

impl HttpConnector {
    /// Create a connector whose requests time out after `request_timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            backoff: datadog_backoff,
        })
    }

    /// Replace the retry schedule used by created clients.
    #[must_use]
    pub fn with_backoff(mut self, backoff: fn() -> ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Build an unvalidated client.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a valid URL.
    pub fn client(&self, base_url: &str, api_key: &str, app_key: &str) -> Result<HttpDatadogApi, DatadogApiError> {
        let base_url = Url::parse(base_url).map_err(|e| DatadogApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(HttpDatadogApi {
            client: self.client.clone(),
            base_url,
            api_key: api_key.to_string(),
            app_key: app_key.to_string(),
            backoff: self.backoff,
        })
    }
}

#[async_trait]
impl ApiConnector for HttpConnector {
    async fn connect(
        &self,
        base_url: &str,
        api_key: &str,
        app_key: &str,
    ) -> Result<Arc<dyn DatadogApi>, DatadogApiError> {
        let api = self.client(base_url, api_key, app_key)?;
        if !api.validate().await? {
            return Err(DatadogApiError::InvalidCredentials {
                base_url: base_url.to_string(),
            });
        }
        Ok(Arc::new(api))
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod api_tests;
