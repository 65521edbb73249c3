use crate::core::error::MangaError;
use crate::core::io::Storage;
use crate::core::models::CreativeBrief;
use crate::services::llm::{ContentPart, GenerativeModel, ResponseMode};
use crate::utils::mime::mime_from_path;
use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_VOICE_DESCRIPTION: &str = "Standard narration voice.";
pub const DEFAULT_VISUAL_STYLE: &str = "Manga style";

const BRIEF_INSTRUCTIONS: &str = r#"Your task is to analyze the text and generate the image generation prompts for a manga adaptation. You must keep text in pages across the chapter plot, character, style and voice consistent.
This brief must include both VISUAL prompts for manga page generation and AUDIO directives for voice generation.

To keep CHARACTERS and STYLE consistency across the chapter, in each page image generation prompt include the following:
If images attached:
    use the images for creating a photo of similar art style. This includes: [Composition/Angle]. [Lighting/Atmosphere]. [Style/Media]. Make sure to follow the overall color palette and shadow/aura fragments.
    Last image will be the previous chapter, use it for knowing [Subject + Adjectives] doing [Action] in [Location/Context].
If no images attached:
    search the title in internet for character/context references.

VOICE TONE IDENTIFICATION:
Analyze the text and images (if provided) to describe the perfect voice for the narrator/character. Include details about age, gender, accent, pitch, speed, and emotional tone (e.g., "Deep, gravelly voice of an ancient warrior, slow and authoritative").

SCRIPT ANNOTATION:
Take the provided Plot text and annotate it for a lively voice cover. Maintain the original text, ensure the text is segmented well for reading aloud.
The most important part is the voice description.
Also provide the full script text to be read.

Respond strictly as a valid JSON object with this structure:
{
  "visual_style": "<general style guidelines covering composition, palette, medium, lighting>",
  "voice_description": "<detailed description of the voice tone, gender, age, style, accent, temper, etc.>",
  "narrator_script": "<The full text properly formatted for reading (removing stage directions if any)>",
  "pages": [
    "<page 1 detailed prompt consisting of [Subject + Adjectives] doing [Action] in [Location/Context]. [Composition/Angle]. [Lighting/Atmosphere]. [Style/Media]. [Specific Constraint/Text] with dialogue callouts in speech bubbles and sound effects>",
    "<page 2 detailed prompt ...>"
  ]
}"#;

pub fn build_brief_prompt(title: &str, plot: &str) -> String {
    format!(
        "{}\n\nGenres: Manga\nTitle: {}\nPlot:\n{}\n",
        BRIEF_INSTRUCTIONS, title, plot
    )
}

/// Removes a surrounding markdown fence (with optional language tag).
pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    let Some(rest) = s.strip_prefix("```") else {
        return s.to_string();
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim().to_string()
}

#[derive(Deserialize)]
struct RawBrief {
    visual_style: Option<String>,
    voice_description: Option<String>,
    narrator_script: Option<String>,
    pages: Option<Vec<String>>,
}

/// Parses the model reply. Absent fields fall back to defaults; the plot text
/// stands in for a missing script.
pub fn parse_brief(response: &str, plot: &str) -> Result<CreativeBrief> {
    let clean_json = strip_code_blocks(response);
    let raw: RawBrief = serde_json::from_str(&clean_json)
        .with_context(|| format!("Failed to parse brief JSON: {}", clean_json))?;

    Ok(CreativeBrief {
        visual_style: raw
            .visual_style
            .unwrap_or_else(|| DEFAULT_VISUAL_STYLE.to_string()),
        voice_description: raw
            .voice_description
            .unwrap_or_else(|| DEFAULT_VOICE_DESCRIPTION.to_string()),
        narrator_script: raw.narrator_script.unwrap_or_else(|| plot.to_string()),
        page_prompts: raw.pages.unwrap_or_default(),
    })
}

/// Loads reference images as inline parts. The bytes live only as long as the request.
pub async fn load_images(storage: &dyn Storage, paths: &[PathBuf]) -> Result<Vec<ContentPart>> {
    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        let path_str = path.to_string_lossy();
        let data = storage
            .read(&path_str)
            .await
            .with_context(|| format!("Failed to read reference image {}", path.display()))?;
        parts.push(ContentPart::Image {
            mime_type: mime_from_path(path).to_string(),
            data,
        });
    }
    Ok(parts)
}

pub struct BriefGenerator {
    model: Arc<dyn GenerativeModel>,
    model_name: String,
    storage: Arc<dyn Storage>,
}

impl BriefGenerator {
    pub fn new(model: Arc<dyn GenerativeModel>, model_name: &str, storage: Arc<dyn Storage>) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            storage,
        }
    }

    pub async fn generate_brief(
        &self,
        title: &str,
        plot: &str,
        reference_images: &[PathBuf],
    ) -> Result<CreativeBrief, MangaError> {
        self.try_generate(title, plot, reference_images)
            .await
            .map_err(MangaError::brief)
    }

    async fn try_generate(&self, title: &str, plot: &str, reference_images: &[PathBuf]) -> Result<CreativeBrief> {
        let mut parts = vec![ContentPart::Text(build_brief_prompt(title, plot))];
        parts.extend(load_images(self.storage.as_ref(), reference_images).await?);

        info!(
            "Requesting creative brief for '{}' with {} reference image(s)",
            title,
            reference_images.len()
        );
        let response = self
            .model
            .generate(&self.model_name, parts, &ResponseMode::Json)
            .await?;

        let text: String = response
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        if text.trim().is_empty() {
            return Err(anyhow!("Brief model returned no text"));
        }
        debug!("Raw brief response: {}", text);

        let brief = parse_brief(&text, plot)?;
        info!("Brief ready: {} page prompt(s)", brief.page_prompts.len());
        Ok(brief)
    }
}
