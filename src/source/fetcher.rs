//! # Fetcher
//!
//! One HTTP attempt per call. The fetcher only classifies the outcome; retry
//! policy belongs to the dispatcher, which inspects [`FetchError::status`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_CHARSET, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ZendeskConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transport failure for {uri}: {reason}")]
    Transport { uri: String, reason: String },

    #[error("Received {status} status code for {uri}")]
    Status { uri: String, status: u16 },

    #[error("Failed to decode response from {uri}: {reason}")]
    Decode { uri: String, reason: String },

    #[error("Invalid request URI {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("HTTP client could not be built: {0}")]
    Client(String),
}

impl FetchError {
    pub fn transport(uri: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Transport {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }

    pub fn status(uri: impl Into<String>, status: u16) -> Self {
        Self::Status {
            uri: uri.into(),
            status,
        }
    }

    pub fn decode(uri: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Decode {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_uri(uri: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }

    /// HTTP status carried by the error, if the server answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status_code() == Some(StatusCode::TOO_MANY_REQUESTS.as_u16())
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(StatusCode::NOT_FOUND.as_u16())
    }
}

/// A single GET against the remote API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    url: Url,
}

impl FetchRequest {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn parse(uri: &str) -> Result<Self, FetchError> {
        Url::parse(uri)
            .map(Self::new)
            .map_err(|e| FetchError::invalid_uri(uri, e))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Incremental (time-windowed) export endpoints live under `api/v2/incremental/`.
    pub fn is_incremental(&self) -> bool {
        let Some(segments) = self.url.path_segments() else {
            return false;
        };
        let segments: Vec<&str> = segments.collect();
        segments
            .windows(3)
            .any(|w| w[0] == "api" && w[1] == "v2" && w[2] == "incremental")
    }
}

impl fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Perform exactly one round trip and return the response body of a 2xx answer.
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError>;
}

/// [`Fetcher`] backed by a shared `reqwest` client with basic auth on every request.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    user: String,
    password: String,
}

impl fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("user", &self.user)
            .field("password", &"[MASKED]")
            .finish()
    }
}

impl HttpFetcher {
    pub fn new(config: &ZendeskConfig, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_CHARSET, HeaderValue::from_static("utf-8"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US"));

        let mut builder = Client::builder()
            .default_headers(headers)
            .user_agent(format!("zendb/{}", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        info!(
            subdomain = %config.subdomain,
            timeout_ms = timeout.map(|t| t.as_millis() as u64),
            "Created remote API client"
        );

        Ok(Self {
            client,
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError> {
        let uri = request.url().as_str();
        debug!(uri = %uri, "Fetching");

        let response = self
            .client
            .get(request.url().clone())
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::transport(uri, "request timed out")
                } else {
                    FetchError::transport(uri, e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::status(uri, status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(uri, e))?;
        Ok(body.to_vec())
    }
}
