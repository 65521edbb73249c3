use crate::core::error::MangaError;
use crate::core::io::Storage;
use crate::core::models::{AvatarSummary, EmbedConfig};
use crate::utils::mime::mime_from_path;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnamConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_anam_base_url")]
    pub base_url: String,
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
    /// Avatars kept before the oldest ones get deleted.
    #[serde(default = "default_safe_limit")]
    pub safe_limit: usize,
    #[serde(default = "default_propagation_delay")]
    pub propagation_delay_seconds: u64,
    #[serde(default)]
    pub persona: PersonaConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PersonaConfig {
    #[serde(default = "default_persona_name")]
    pub name: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_persona_voice")]
    pub voice_id: String,
    #[serde(default = "default_persona_llm")]
    pub llm_id: String,
}

fn default_anam_base_url() -> String {
    "https://api.anam.ai/v1".to_string()
}
fn default_list_limit() -> usize {
    50
}
fn default_safe_limit() -> usize {
    5
}
fn default_propagation_delay() -> u64 {
    2
}
fn default_persona_name() -> String {
    "Comics Factory Avatar".to_string()
}
fn default_system_prompt() -> String {
    "You are a helpful and expressive avatar created from a comic book character.".to_string()
}
fn default_persona_voice() -> String {
    "6bfbe25a-979d-40f3-a92b-5394170af54b".to_string()
}
fn default_persona_llm() -> String {
    "0934d97d-0c3a-4f33-91b0-5e136a0ef466".to_string()
}

impl Default for AnamConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_anam_base_url(),
            list_limit: default_list_limit(),
            safe_limit: default_safe_limit(),
            propagation_delay_seconds: default_propagation_delay(),
            persona: PersonaConfig::default(),
        }
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            name: default_persona_name(),
            system_prompt: default_system_prompt(),
            voice_id: default_persona_voice(),
            llm_id: default_persona_llm(),
        }
    }
}

/// Image bytes plus the metadata the provider needs for the upload.
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersonaPayload {
    pub avatar_id: String,
    pub name: String,
    pub system_prompt: String,
    pub voice_id: String,
    pub llm_id: String,
}

/// REST surface of the avatar provider.
#[async_trait]
pub trait AvatarBackend: Send + Sync {
    async fn list_avatars(&self, limit: usize) -> Result<Vec<AvatarSummary>>;
    async fn delete_avatar(&self, avatar_id: &str) -> Result<()>;
    async fn create_avatar(&self, upload: AvatarUpload, display_name: &str) -> Result<String>;
    async fn create_session_token(&self, persona: &PersonaPayload) -> Result<String>;
}

pub fn create_avatar_backend(config: &AnamConfig) -> Result<Box<dyn AvatarBackend>, MangaError> {
    if config.api_key.trim().is_empty() {
        return Err(MangaError::Config("ANAM_API_KEY not set".to_string()));
    }
    Ok(Box::new(AnamClient::new(&config.api_key, &config.base_url)))
}

// --- Anam REST client ---

pub struct AnamClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnamClient {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key)
    }
}

#[derive(Deserialize)]
struct AvatarList {
    #[serde(default)]
    data: Vec<AvatarSummary>,
}

#[derive(Deserialize)]
struct CreatedAvatar {
    id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionTokenRequest<'a> {
    persona_config: &'a PersonaPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionTokenResponse {
    session_token: String,
}

async fn ensure_success(resp: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let err_text = resp.text().await.unwrap_or_default();
    Err(anyhow!("Anam API error ({}) ({}): {}", what, status, err_text))
}

#[async_trait]
impl AvatarBackend for AnamClient {
    async fn list_avatars(&self, limit: usize) -> Result<Vec<AvatarSummary>> {
        let url = Url::parse_with_params(
            &format!("{}/avatars", self.base_url),
            &[("limit", limit.to_string())],
        )?;
        let resp = self
            .client
            .get(url)
            .header("Authorization", self.bearer())
            .send()
            .await
            .context("Failed to list avatars")?;
        let resp = ensure_success(resp, "List Avatars").await?;
        let list: AvatarList = resp.json().await.context("Failed to parse avatar list")?;
        Ok(list.data)
    }

    async fn delete_avatar(&self, avatar_id: &str) -> Result<()> {
        let url = format!("{}/avatars/{}", self.base_url, avatar_id);
        let resp = self
            .client
            .delete(&url)
            .header("Authorization", self.bearer())
            .send()
            .await
            .context("Failed to send delete request")?;
        ensure_success(resp, "Delete Avatar").await?;
        Ok(())
    }

    async fn create_avatar(&self, upload: AvatarUpload, display_name: &str) -> Result<String> {
        let url = format!("{}/avatars", self.base_url);
        let part = multipart::Part::bytes(upload.data)
            .file_name(upload.file_name)
            .mime_str(&upload.mime_type)
            .context("Invalid mime type")?;
        let form = multipart::Form::new()
            .part("imageFile", part)
            .text("displayName", display_name.to_string());

        let resp = self
            .client
            .post(&url)
            .header("Authorization", self.bearer())
            .multipart(form)
            .send()
            .await
            .context("Failed to send create avatar request")?;
        let resp = ensure_success(resp, "Create Avatar").await?;
        let created: CreatedAvatar = resp.json().await.context("Failed to parse created avatar")?;
        Ok(created.id)
    }

    async fn create_session_token(&self, persona: &PersonaPayload) -> Result<String> {
        let url = format!("{}/auth/session-token", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", self.bearer())
            .json(&SessionTokenRequest { persona_config: persona })
            .send()
            .await
            .context("Failed to request session token")?;
        let resp = ensure_success(resp, "Get Token").await?;
        let token: SessionTokenResponse = resp.json().await.context("Failed to parse session token")?;
        Ok(token.session_token)
    }
}

/// Oldest avatars to delete so that one more fits under `safe_limit`.
/// Avatars without a usable timestamp count as oldest.
pub fn select_for_cleanup(mut avatars: Vec<AvatarSummary>, safe_limit: usize) -> Vec<AvatarSummary> {
    if avatars.len() < safe_limit {
        return Vec::new();
    }
    let excess = avatars.len() - safe_limit + 1;
    avatars.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    avatars.truncate(excess);
    avatars
}

pub struct AvatarProvisioner {
    backend: Box<dyn AvatarBackend>,
    storage: Arc<dyn Storage>,
    list_limit: usize,
    safe_limit: usize,
    propagation_delay: Duration,
    persona: PersonaConfig,
}

impl AvatarProvisioner {
    pub fn new(backend: Box<dyn AvatarBackend>, storage: Arc<dyn Storage>, config: &AnamConfig) -> Self {
        Self {
            backend,
            storage,
            list_limit: config.list_limit,
            safe_limit: config.safe_limit,
            propagation_delay: Duration::from_secs(config.propagation_delay_seconds),
            persona: config.persona.clone(),
        }
    }

    /// Deletes the oldest avatars when the account is at the soft cap.
    /// Individual delete failures are logged; returns how many were deleted.
    pub async fn cleanup_old_avatars(&self) -> Result<usize> {
        let avatars = self.backend.list_avatars(self.list_limit).await?;
        info!("Found {} existing avatars.", avatars.len());

        let doomed = select_for_cleanup(avatars, self.safe_limit);
        if doomed.is_empty() {
            return Ok(0);
        }
        info!("Cleaning up {} old avatars to stay under limit...", doomed.len());

        let mut deleted = 0;
        for avatar in &doomed {
            match self.backend.delete_avatar(&avatar.id).await {
                Ok(()) => {
                    info!("Deleted avatar {}", avatar.id);
                    deleted += 1;
                }
                Err(e) => warn!("Failed to delete avatar {}: {:#}", avatar.id, e),
            }
        }

        if !self.propagation_delay.is_zero() {
            tokio::time::sleep(self.propagation_delay).await;
        }
        Ok(deleted)
    }

    pub async fn create_avatar(&self, image_path: &Path, display_name: &str) -> Result<String, MangaError> {
        if let Err(e) = self.cleanup_old_avatars().await {
            error!("Error cleaning up avatars: {:#}", e);
        }

        let mime_type = mime_from_path(image_path);
        let data = self
            .storage
            .read(&image_path.to_string_lossy())
            .await
            .map_err(|e| MangaError::provisioning(format!("cannot read {}: {:#}", image_path.display(), e)))?;
        info!("Uploading image: {}", image_path.display());
        info!("Detected MIME type: {}", mime_type);
        info!("File size: {} bytes", data.len());

        let file_name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "avatar".to_string());
        let upload = AvatarUpload {
            file_name,
            mime_type: mime_type.to_string(),
            data,
        };

        self.backend
            .create_avatar(upload, display_name)
            .await
            .map_err(|e| {
                error!("Anam API Error (Create Avatar): {:#}", e);
                MangaError::provisioning(e)
            })
    }

    pub fn persona_for(&self, avatar_id: &str) -> PersonaPayload {
        PersonaPayload {
            avatar_id: avatar_id.to_string(),
            name: self.persona.name.clone(),
            system_prompt: self.persona.system_prompt.clone(),
            voice_id: self.persona.voice_id.clone(),
            llm_id: self.persona.llm_id.clone(),
        }
    }

    pub async fn get_embed_config(&self, avatar_id: &str) -> Result<EmbedConfig, MangaError> {
        let persona = self.persona_for(avatar_id);
        let session_token = self
            .backend
            .create_session_token(&persona)
            .await
            .map_err(|e| {
                error!("Anam API Error (Get Token): {:#}", e);
                MangaError::provisioning(e)
            })?;
        Ok(EmbedConfig {
            session_token,
            avatar_id: avatar_id.to_string(),
        })
    }
}
