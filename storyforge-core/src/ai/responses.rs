//! Wire Types
//!
//! Request and response bodies of the `/api/generate` endpoint.

use crate::ai::client::GenerateError;
use serde::{Deserialize, Serialize};

/// Result text used when the service returns no content
pub const NO_RESPONSE: &str = "Sin respuesta";

/// A chat message in the request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Body posted to the generation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub messages: Vec<Message>,
}

impl GenerateRequest {
    /// Single-turn request carrying `prompt` as the user message
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
        }
    }
}

/// One piece of generated content
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentFragment {
    #[serde(default)]
    pub text: Option<String>,
}

/// Body returned by the generation endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub content: Option<Vec<ContentFragment>>,
}

impl GenerateResponse {
    /// Concatenates every text fragment in order.
    ///
    /// Falls back to [`NO_RESPONSE`] when there is nothing to concatenate.
    pub fn into_text(self) -> String {
        let text: String = self
            .content
            .unwrap_or_default()
            .into_iter()
            .filter_map(|fragment| fragment.text)
            .collect();

        if text.is_empty() {
            NO_RESPONSE.to_string()
        } else {
            text
        }
    }
}

/// Parse a response body into the analysis text
pub fn parse_generate_response(body: &str) -> Result<String, GenerateError> {
    let response: GenerateResponse = serde_json::from_str(body).map_err(|e| {
        GenerateError::InvalidResponse(format!(
            "Failed to parse generate response: {}. Body: {}",
            e,
            body.chars().take(200).collect::<String>()
        ))
    })?;
    Ok(response.into_text())
}
