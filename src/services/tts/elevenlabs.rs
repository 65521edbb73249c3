use super::{VoicePreview, VoiceProvider};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ElevenLabsConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_preview_text")]
    pub preview_text: String,
}

fn default_base_url() -> String {
    "https://api.elevenlabs.io".to_string()
}
fn default_model_id() -> String {
    "eleven_monolingual_v1".to_string()
}
fn default_preview_text() -> String {
    "This is how I sound. Do I fit the character?".to_string()
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model_id: default_model_id(),
            preview_text: default_preview_text(),
        }
    }
}

pub fn create_voice_provider(config: &ElevenLabsConfig) -> Box<dyn VoiceProvider> {
    if config.api_key.trim().is_empty() {
        warn!("ELEVENLABS_API_KEY not set, narration requests will fail");
    }
    Box::new(ElevenLabsClient::new(config))
}

pub struct ElevenLabsClient {
    api_key: String,
    base_url: String,
    model_id: String,
    client: reqwest::Client,
}

impl ElevenLabsClient {
    pub fn new(config: &ElevenLabsConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model_id: config.model_id.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct PreviewRequest<'a> {
    voice_description: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct PreviewResponse {
    #[serde(default)]
    previews: Vec<VoicePreview>,
}

#[derive(Serialize)]
struct CreateVoiceRequest<'a> {
    voice_name: &'a str,
    voice_description: &'a str,
    generated_voice_id: &'a str,
}

#[derive(Deserialize)]
struct CreateVoiceResponse {
    voice_id: String,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

async fn ensure_success(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let err_text = resp.text().await.unwrap_or_default();
    Err(anyhow!("ElevenLabs {} error ({}): {}", what, status, err_text))
}

#[async_trait]
impl VoiceProvider for ElevenLabsClient {
    async fn create_previews(&self, voice_description: &str, text: &str) -> Result<Vec<VoicePreview>> {
        let url = format!("{}/v1/text-to-voice/create-previews", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&PreviewRequest { voice_description, text })
            .send()
            .await
            .context("Failed to send voice preview request")?;
        let resp = ensure_success(resp, "voice preview").await?;

        let body: PreviewResponse = resp.json().await.context("Failed to parse voice previews")?;
        debug!("Received {} voice preview(s)", body.previews.len());
        Ok(body.previews)
    }

    async fn create_voice_from_preview(
        &self,
        voice_name: &str,
        voice_description: &str,
        generated_voice_id: &str,
    ) -> Result<String> {
        let url = format!("{}/v1/text-to-voice/create-voice-from-preview", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&CreateVoiceRequest {
                voice_name,
                voice_description,
                generated_voice_id,
            })
            .send()
            .await
            .context("Failed to send create voice request")?;
        let resp = ensure_success(resp, "create voice").await?;

        let body: CreateVoiceResponse = resp.json().await.context("Failed to parse created voice")?;
        Ok(body.voice_id)
    }

    async fn text_to_speech(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/v1/text-to-speech/{}/stream", self.base_url, voice_id);
        let resp = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&SpeechRequest {
                text,
                model_id: &self.model_id,
            })
            .send()
            .await
            .context("Failed to send text-to-speech request")?;
        let resp = ensure_success(resp, "text-to-speech").await?;

        let mut audio = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Audio stream error")?;
            audio.extend_from_slice(&chunk);
        }
        if audio.is_empty() {
            return Err(anyhow!("ElevenLabs returned an empty audio stream"));
        }
        Ok(audio)
    }
}
