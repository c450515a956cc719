//! Gemini API request/response types.
//!
//! Only the fields the server actually reads or writes; the API tolerates
//! missing optional fields in both directions.

use serde::{Deserialize, Serialize};

use chamie_protocol::ChatMessage;

use crate::config::GeminiSettings;

/// Request body for `streamGenerateContent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

/// One turn of the conversation as Gemini sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    /// "user" or "model".
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part { text: text.into() }],
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![Part { text: text.into() }],
        }
    }

    pub fn from_message(message: &ChatMessage) -> Self {
        Self {
            role: message.role.as_gemini().to_string(),
            parts: vec![Part {
                text: message.content.clone(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// Sampling parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: i32,
    pub max_output_tokens: i32,
}

impl From<&GeminiSettings> for GenerationConfig {
    fn from(settings: &GeminiSettings) -> Self {
        Self {
            temperature: settings.temperature,
            top_p: settings.top_p,
            top_k: settings.top_k,
            max_output_tokens: settings.max_output_tokens,
        }
    }
}

/// One streamed response chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl GenerateContentResponse {
    /// Text of the first candidate's parts, concatenated. Empty when the
    /// chunk carries no text (e.g. safety metadata only).
    pub fn first_text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_camel_case() {
        let request = GenerateContentRequest {
            contents: vec![Content::user("hi")],
            generation_config: GenerationConfig {
                temperature: 0.7,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 4096,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["topP"], 0.8);
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 4096);
        assert_eq!(json["contents"][0]["role"], "user");
    }

    #[test]
    fn test_first_text_concatenates_parts() {
        let chunk: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hel"},{"text":"lo"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.first_text(), "Hello");
    }

    #[test]
    fn test_textless_chunk_yields_empty() {
        let chunk: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"content":null}]}"#).unwrap();
        assert_eq!(chunk.first_text(), "");
        let empty: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.first_text(), "");
    }
}
