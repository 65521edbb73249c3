use crate::core::error::MangaError;
use crate::core::io::{unique_file_name, Storage};
use crate::core::models::PageArtifact;
use crate::services::brief::load_images;
use crate::services::llm::{ContentPart, GenerativeModel, ResponseMode};
use crate::utils::mime::{extension_for_mime, mime_from_path};
use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CONTINUITY_NOTE: &str = "Continue seamlessly from the attached previous page image to preserve character placement, lighting, and action flow.";

/// Joins style, continuity note and page prompt with blank lines, skipping empty parts.
pub fn compose_page_prompt(style_reference: &str, with_continuity: bool, prompt_text: &str) -> String {
    let continuity = if with_continuity { CONTINUITY_NOTE } else { "" };
    [style_reference, continuity, prompt_text]
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct PageImageGenerator {
    model: Arc<dyn GenerativeModel>,
    model_name: String,
    storage: Arc<dyn Storage>,
    output_folder: PathBuf,
    mode: ResponseMode,
}

impl PageImageGenerator {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        model_name: &str,
        storage: Arc<dyn Storage>,
        output_folder: impl Into<PathBuf>,
        aspect_ratio: &str,
        image_size: &str,
    ) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            storage,
            output_folder: output_folder.into(),
            mode: ResponseMode::TextAndImage {
                aspect_ratio: aspect_ratio.to_string(),
                image_size: image_size.to_string(),
            },
        }
    }

    /// Renders one page. Errors are per page; the caller decides whether to go on.
    pub async fn generate_page(
        &self,
        page_number: usize,
        prompt_text: &str,
        style_reference: &str,
        reference_images: &[PathBuf],
        previous_page: Option<&Path>,
    ) -> Result<PageArtifact, MangaError> {
        self.try_generate(page_number, prompt_text, style_reference, reference_images, previous_page)
            .await
            .map_err(|e| MangaError::page(page_number, e))
    }

    async fn load_previous(&self, path: &Path) -> Option<ContentPart> {
        match self.storage.read(&path.to_string_lossy()).await {
            Ok(data) => Some(ContentPart::Image {
                mime_type: mime_from_path(path).to_string(),
                data,
            }),
            Err(e) => {
                warn!("Could not load previous page {}: {:#}", path.display(), e);
                None
            }
        }
    }

    async fn try_generate(
        &self,
        page_number: usize,
        prompt_text: &str,
        style_reference: &str,
        reference_images: &[PathBuf],
        previous_page: Option<&Path>,
    ) -> Result<PageArtifact> {
        let references = load_images(self.storage.as_ref(), reference_images).await?;
        let previous = match previous_page {
            Some(path) => self.load_previous(path).await,
            None => None,
        };

        let page_prompt = compose_page_prompt(style_reference, previous.is_some(), prompt_text);
        debug!("Page {} prompt: {}", page_number, page_prompt);

        let mut parts = Vec::with_capacity(references.len() + 2);
        parts.push(ContentPart::Text(page_prompt));
        parts.extend(references);
        parts.extend(previous);

        let response = self
            .model
            .generate(&self.model_name, parts, &self.mode)
            .await?;

        let mut notes = Vec::new();
        for part in response {
            match part {
                ContentPart::Image { mime_type, data } => {
                    let filename = unique_file_name("manga_page", extension_for_mime(&mime_type));
                    let output_path = self.output_folder.join(filename);
                    self.storage
                        .write(&output_path.to_string_lossy(), &data)
                        .await
                        .with_context(|| format!("Failed to save {}", output_path.display()))?;
                    info!("Page {} saved to {}", page_number, output_path.display());
                    return Ok(PageArtifact {
                        page_number,
                        image_path: output_path,
                    });
                }
                ContentPart::Text(text) => notes.push(text),
            }
        }

        Err(anyhow!("No image in response. Model said: {}", notes.join(" ")))
    }
}
