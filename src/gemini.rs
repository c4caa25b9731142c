//! Google Gemini text-generation client.
//!
//! Implements [`TextGenerator`] over the `generateContent` REST endpoint.
//!
//! # API Reference
//!
//! See: <https://ai.google.dev/api/generate-content>

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::insights::{InsightError, TextGenerator};

/// Base URL for the Gemini API.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used when none is configured.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";

/// Client for Gemini's `generateContent` API.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Create a client against the public API.
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self, InsightError> {
        Self::with_base_url(GEMINI_API_BASE, api_key, model, timeout)
    }

    /// Create a client with a custom base URL (for testing).
    pub fn with_base_url(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, InsightError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url,
            urlencoding::encode(&self.model),
            urlencoding::encode(&self.api_key)
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, InsightError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        // reqwest errors embed the URL, which carries the API key
        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| InsightError::Request(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(model = %self.model, status = status.as_u16(), "Gemini request rejected");
            return Err(InsightError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let data = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| InsightError::Request(e.without_url()))?;
        data.text().ok_or(InsightError::EmptyResponse)
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Response body of `generateContent`.
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if it has any.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate_content_response() {
        let json = r#"{
            "candidates": [
                {
                    "content": {
                        "parts": [
                            {"text": "1. SYMPTOM MANAGEMENT\n"},
                            {"text": "Rest and hydrate."}
                        ],
                        "role": "model"
                    },
                    "finishReason": "STOP"
                }
            ]
        }"#;

        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            response.text().as_deref(),
            Some("1. SYMPTOM MANAGEMENT\nRest and hydrate.")
        );
    }

    #[test]
    fn test_empty_candidates_have_no_text() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).unwrap();
        assert!(response.text().is_none());

        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert!(response.text().is_none());
    }

    #[test]
    fn test_endpoint_encodes_key() {
        let client = GeminiClient::with_base_url(
            "http://localhost:9999/",
            "abc/123+",
            "gemini-pro",
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(
            client.endpoint(),
            "http://localhost:9999/models/gemini-pro:generateContent?key=abc%2F123%2B"
        );
    }
}
