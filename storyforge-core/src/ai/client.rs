//! Generation Client Module
//!
//! Handles communication with the text-generation service over HTTP.

use crate::ai::responses::{self, GenerateRequest};
use crate::config::Config;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Path of the generation endpoint, relative to the base URL
pub const GENERATE_PATH: &str = "api/generate";

/// Message shown when the service cannot be reached at all
pub const UNREACHABLE_MESSAGE: &str = "No se pudo conectar con el servidor. Intenta más tarde.";

/// Errors that can occur while generating content
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Could not connect to the generation service: {0}")]
    Unreachable(String),

    #[error("Error en la API: {status_text}")]
    ApiStatus { status: u16, status_text: String },

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response from generation service: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

impl GenerateError {
    /// Text shown to the user in place of an analysis.
    ///
    /// Connection failures get a plain-language message; everything else
    /// shows the error text as is.
    pub fn user_message(&self) -> String {
        match self {
            GenerateError::Unreachable(_) => UNREACHABLE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, GenerateError::Unreachable(_))
    }
}

impl From<reqwest::Error> for GenerateError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            GenerateError::Unreachable(e.to_string())
        } else {
            GenerateError::RequestFailed(e.to_string())
        }
    }
}

/// Anything that can turn a prompt into generated text
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

/// Resolve the generation endpoint against a base URL.
///
/// A base URL with a path prefix keeps it: `http://host/proxy` becomes
/// `http://host/proxy/api/generate`.
pub fn endpoint_url(base_url: &Url) -> Result<Url, GenerateError> {
    let mut base = base_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(GENERATE_PATH)
        .map_err(|e| GenerateError::InvalidUrl(e.to_string()))
}

/// HTTP client for the generation service
#[derive(Debug, Clone)]
pub struct GenerationClient {
    endpoint: Url,
    http_client: reqwest::Client,
}

impl GenerationClient {
    /// Create a client for the service at `base_url`
    pub fn new(base_url: &Url) -> Result<Self, GenerateError> {
        Self::with_timeout(base_url, None)
    }

    /// Create a client with an optional request timeout
    pub fn with_timeout(base_url: &Url, timeout: Option<Duration>) -> Result<Self, GenerateError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| GenerateError::RequestFailed(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint_url(base_url)?,
            http_client,
        })
    }

    /// Create a client from loaded configuration
    pub fn from_config(config: &Config) -> Result<Self, GenerateError> {
        let base_url = config
            .api_url()
            .map_err(|e| GenerateError::InvalidUrl(e.to_string()))?;
        Self::with_timeout(base_url, config.timeout())
    }

    /// The full URL requests are posted to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn send_request(&self, prompt: &str) -> Result<String, GenerateError> {
        let response = self
            .http_client
            .post(self.endpoint.as_ref())
            .json(&GenerateRequest::from_prompt(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let status_text = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.as_str().to_string());
            return Err(GenerateError::ApiStatus {
                status: status.as_u16(),
                status_text,
            });
        }

        let body = response.text().await?;
        responses::parse_generate_response(&body)
    }
}

#[async_trait]
impl Generator for GenerationClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        debug!(endpoint = %self.endpoint, prompt_len = prompt.len(), "Sending generate request");
        let start = Instant::now();

        let result = self.send_request(prompt).await;

        debug!(
            duration_ms = start.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Generate request finished"
        );
        result
    }
}
