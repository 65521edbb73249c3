use crate::core::error::MangaError;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default = "default_brief_model")]
    pub brief_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_image_size")]
    pub image_size: String,
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_brief_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_image_model() -> String {
    "gemini-3-pro-image-preview".to_string()
}
fn default_aspect_ratio() -> String {
    "9:16".to_string()
}
fn default_image_size() -> String {
    "2K".to_string()
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_gemini_base_url(),
            brief_model: default_brief_model(),
            image_model: default_image_model(),
            aspect_ratio: default_aspect_ratio(),
            image_size: default_image_size(),
        }
    }
}

/// One piece of multimodal content, sent or received.
#[derive(Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    Image { mime_type: String, data: Vec<u8> },
}

impl Debug for ContentPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Image { mime_type, data } => f
                .debug_struct("Image")
                .field("mime_type", mime_type)
                .field("bytes", &data.len())
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseMode {
    /// Text only, constrained to `application/json`.
    Json,
    /// Text plus image output at a fixed frame.
    TextAndImage {
        aspect_ratio: String,
        image_size: String,
    },
}

#[async_trait]
pub trait GenerativeModel: Send + Sync + Debug {
    async fn generate(
        &self,
        model: &str,
        parts: Vec<ContentPart>,
        mode: &ResponseMode,
    ) -> Result<Vec<ContentPart>>;
}

pub fn create_model(config: &GeminiConfig) -> std::result::Result<Arc<dyn GenerativeModel>, MangaError> {
    if config.api_key.trim().is_empty() {
        return Err(MangaError::Config("GOOGLE_API_KEY not set".to_string()));
    }
    Ok(Arc::new(GeminiClient::new(&config.api_key, &config.base_url)))
}

// --- Gemini ---
#[derive(Debug)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
    image_size: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    text: Option<String>,
    #[serde(alias = "inline_data")]
    inline_data: Option<InlineData>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

fn build_request(parts: Vec<ContentPart>, mode: &ResponseMode) -> GeminiRequest {
    let parts = parts
        .into_iter()
        .map(|part| match part {
            ContentPart::Text(text) => GeminiPart {
                text: Some(text),
                inline_data: None,
            },
            ContentPart::Image { mime_type, data } => GeminiPart {
                text: None,
                inline_data: Some(InlineData {
                    mime_type,
                    data: BASE64.encode(data),
                }),
            },
        })
        .collect();

    let generation_config = match mode {
        ResponseMode::Json => GenerationConfig {
            response_modalities: vec!["TEXT".to_string()],
            response_mime_type: Some("application/json".to_string()),
            image_config: None,
        },
        ResponseMode::TextAndImage {
            aspect_ratio,
            image_size,
        } => GenerationConfig {
            response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            response_mime_type: None,
            image_config: Some(ImageConfig {
                aspect_ratio: aspect_ratio.clone(),
                image_size: image_size.clone(),
            }),
        },
    };

    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user".to_string(),
            parts,
        }],
        generation_config,
    }
}

/// Turns a raw `generateContent` body into content parts of the first candidate.
/// Thought parts are dropped.
fn parse_response(response_text: &str) -> Result<Vec<ContentPart>> {
    let result: GeminiResponse = match serde_json::from_str(response_text) {
        Ok(r) => r,
        Err(e) => return Err(anyhow!("Failed to parse Gemini response: {}. Body: {}", e, response_text)),
    };

    if let Some(err) = result.error {
        return Err(anyhow!("Gemini API returned error: {}", err.message));
    }

    let candidates = result.candidates.unwrap_or_default();
    let Some(first) = candidates.into_iter().next() else {
        if let Some(reason) = result.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(anyhow!("Gemini blocked the prompt: {}", reason));
        }
        return Err(anyhow!("Gemini response format unexpected or empty. Body: {}", response_text));
    };

    let mut parts = Vec::new();
    if let Some(content) = first.content {
        for part in content.parts.into_iter().filter(|p| !p.thought) {
            if let Some(inline) = part.inline_data {
                let data = BASE64
                    .decode(inline.data.as_bytes())
                    .context("Gemini returned invalid base64 image data")?;
                parts.push(ContentPart::Image {
                    mime_type: inline.mime_type,
                    data,
                });
            } else if let Some(text) = part.text {
                parts.push(ContentPart::Text(text));
            }
        }
    }

    if parts.is_empty() {
        let reason = first.finish_reason.as_deref().unwrap_or("UNKNOWN");
        return Err(anyhow!("Gemini response empty. Finish reason: {}", reason));
    }
    Ok(parts)
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(
        &self,
        model: &str,
        parts: Vec<ContentPart>,
        mode: &ResponseMode,
    ) -> Result<Vec<ContentPart>> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let request_body = build_request(parts, mode);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await
            .context("Gemini request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await?;
            return Err(anyhow!("Gemini API error ({}): {}", status, error_text));
        }

        let response_text = resp.text().await?;
        parse_response(&response_text)
    }
}
