use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// Input to the manga pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub title: String,
    pub plot: String,
    #[serde(default)]
    pub reference_image_paths: Vec<PathBuf>,
}

/// Creative plan returned by the brief model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeBrief {
    pub visual_style: String,
    pub voice_description: String,
    pub narrator_script: String,
    pub page_prompts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageArtifact {
    pub page_number: usize,
    pub image_path: PathBuf,
}

/// Terminal output of the pipeline. Paths are relative to the output folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MangaResult {
    pub title: String,
    pub script: String,
    pub audio_file: Option<String>,
    pub pages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: u64,
    pub title: String,
    pub protagonist_image_path: String,
    pub comic_file_path: String,
    pub avatar_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub title: String,
    pub protagonist_image_path: String,
    pub comic_file_path: String,
    pub avatar_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AvatarSummary {
    pub id: String,
    /// `None` when the provider omits the field or sends something unparseable.
    #[serde(rename = "createdAt", default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }))
}

/// What a front end needs to embed a live avatar session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedConfig {
    pub session_token: String,
    pub avatar_id: String,
}
