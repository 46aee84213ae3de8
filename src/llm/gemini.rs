use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{CONFIG, PORTRAIT_PROMPT};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const ERROR_BODY_LOG_LIMIT: usize = 2000;

/// The uploaded reference image as it goes to the provider: the MIME type
/// captured from the data URL plus the base64 payload untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub mime_type: String,
    pub data: String,
}

/// One unit of the provider's reply, normalized away from the wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePart {
    Text(String),
    Inline { mime_type: String, data: String },
}

/// Seam between the endpoint and the generation provider. The endpoint only
/// sees a part list; `Ok(None)` means the provider answered without one.
#[async_trait]
pub trait PortraitGenerator: Send + Sync {
    async fn generate(&self, image: &SourceImage) -> Result<Option<Vec<ResponsePart>>>;
}

/// Handle on the Gemini image model, built once at startup and shared
/// through application state.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    aspect_ratio: String,
    image_size: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), ERROR_BODY_LOG_LIMIT));
    }

    (None, truncate_for_log(trimmed, ERROR_BODY_LOG_LIMIT))
}

fn flatten_first_candidate(response: GeminiResponse) -> Option<Vec<ResponsePart>> {
    let parts = response.candidates?.into_iter().next()?.content?.parts?;
    Some(
        parts
            .into_iter()
            .map(|part| match part {
                GeminiPart::Text { text } => ResponsePart::Text(text),
                GeminiPart::InlineData { inline_data } => ResponsePart::Inline {
                    mime_type: inline_data.mime_type,
                    data: inline_data.data,
                },
            })
            .collect(),
    )
}

impl GeminiClient {
    pub fn from_config() -> Self {
        GeminiClient {
            api_key: CONFIG.gemini_api_key.clone(),
            model: CONFIG.gemini_image_model.clone(),
            aspect_ratio: CONFIG.image_aspect_ratio.clone(),
            image_size: CONFIG.image_size.clone(),
            // No request timeout: a generation round trip can run for
            // minutes and the caller has no cancellation path.
            http: Client::new(),
        }
    }

    fn redact_api_key(&self, text: &str) -> String {
        let key = self.api_key.trim();
        if key.is_empty() {
            return text.to_string();
        }
        text.replace(key, "[redacted]")
    }

    fn build_payload(&self, image: &SourceImage) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "inlineData": { "mimeType": image.mime_type, "data": image.data } },
                    { "text": PORTRAIT_PROMPT },
                ],
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": {
                    "aspectRatio": self.aspect_ratio,
                    "imageSize": self.image_size,
                },
            },
        })
    }

    async fn call_generate_content(&self, payload: &Value) -> Result<GeminiResponse> {
        let url = format!("{GEMINI_API_BASE}/{}:generateContent", self.model);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                anyhow!(
                    "Gemini request failed: {}",
                    self.redact_api_key(&err.to_string())
                )
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            let detail = message.unwrap_or(body_summary);
            return Err(anyhow!(
                "Gemini request failed with status {}: {}",
                status,
                self.redact_api_key(&detail)
            ));
        }

        Ok(response.json::<GeminiResponse>().await?)
    }
}

#[async_trait]
impl PortraitGenerator for GeminiClient {
    async fn generate(&self, image: &SourceImage) -> Result<Option<Vec<ResponsePart>>> {
        let payload = self.build_payload(image);
        debug!(
            target: "llm.gemini",
            model = %self.model,
            mime_type = %image.mime_type,
            payload_bytes = image.data.len(),
            "Dispatching portrait generation"
        );

        let response = self.call_generate_content(&payload).await?;
        let parts = flatten_first_candidate(response);

        if let Some(parts) = &parts {
            let image_parts = parts
                .iter()
                .filter(|part| matches!(part, ResponsePart::Inline { .. }))
                .count();
            debug!(
                target: "llm.gemini",
                parts = parts.len(),
                image_parts,
                "Gemini response received"
            );
        } else {
            warn!("Gemini returned a response without candidate parts");
        }

        Ok(parts)
    }
}
