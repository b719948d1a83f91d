//! Typed client for the Gemini `generateContent` REST surface.
//!
//! Both pipeline stages go through this one endpoint shape: the text model
//! returns its payload in the first candidate's first text part, the image
//! model returns inline binary data (or, occasionally, a data URI embedded
//! in a text part).

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default model for the prompt-enhancement stage.
pub const DEFAULT_TEXT_MODEL: &str = "gemini-1.5-flash";

/// Default model for the image-generation stage.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the client at a different endpoint, e.g. a local proxy.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| GeminiError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GeminiError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| GeminiError::InvalidResponse(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub model: String,
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// May come back empty on some responses; callers fall back to
    /// `image/jpeg` when it does.
    #[serde(default)]
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// The first candidate's first text part, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .parts
            .iter()
            .find_map(|part| part.text.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Content,
}

#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("API request failed with status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response format: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_to_wire_format() {
        let request = GenerateContentRequest {
            model: "gemini-1.5-flash".into(),
            contents: vec![Content {
                parts: vec![Part::text("hello"), Part::inline_data("image/jpeg", "AAAA")],
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                max_output_tokens: 800,
                top_p: Some(0.8),
                top_k: Some(40),
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(
            value["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "image/jpeg"
        );
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 800);
        assert_eq!(value["generationConfig"]["topK"], 40);
        // Part fields are exclusive on the wire.
        assert!(value["contents"][0]["parts"][0].get("inlineData").is_none());
    }

    #[test]
    fn response_parses_text_and_inline_parts() {
        let raw = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "caption"},
                        {"inlineData": {"mimeType": "image/png", "data": "QUJD"}}
                    ]
                }
            }]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.first_text(), Some("caption"));
        let inline = response.candidates[0].content.parts[1]
            .inline_data
            .as_ref()
            .unwrap();
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(inline.data, "QUJD");
    }

    #[test]
    fn empty_response_yields_no_candidates() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(response.candidates.is_empty());
        assert!(response.first_text().is_none());
    }
}
