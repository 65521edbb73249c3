use crate::core::config::Config;
use crate::core::error::MangaError;
use crate::core::io::{unique_file_name, Storage};
use crate::core::models::{GenerationRequest, MangaResult};
use crate::services::brief::BriefGenerator;
use crate::services::llm::GenerativeModel;
use crate::services::pages::PageImageGenerator;
use crate::services::tts::{VoiceProvider, VoiceSynthesizer};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const AUDIO_DIR: &str = "audio";

/// Runs brief, narration and page generation for one request.
pub struct WorkflowManager {
    output_folder: PathBuf,
    brief: BriefGenerator,
    voice: VoiceSynthesizer,
    pages: PageImageGenerator,
    storage: Arc<dyn Storage>,
    show_progress: bool,
}

impl WorkflowManager {
    pub fn new(
        config: &Config,
        model: Arc<dyn GenerativeModel>,
        voice: Box<dyn VoiceProvider>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let gemini = &config.gemini;
        Self {
            output_folder: PathBuf::from(&config.output_folder),
            brief: BriefGenerator::new(model.clone(), &gemini.brief_model, storage.clone()),
            voice: VoiceSynthesizer::new(voice, storage.clone(), &config.elevenlabs.preview_text),
            pages: PageImageGenerator::new(
                model,
                &gemini.image_model,
                storage.clone(),
                &config.output_folder,
                &gemini.aspect_ratio,
                &gemini.image_size,
            ),
            storage,
            show_progress: false,
        }
    }

    /// Draws a progress bar over the page loop.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub async fn run(&self, request: &GenerationRequest) -> Result<MangaResult, MangaError> {
        self.generate_manga(&request.title, &request.plot, &request.reference_image_paths)
            .await
    }

    /// Only a brief failure is returned as an error. Narration and page
    /// failures are logged and leave gaps in the result.
    pub async fn generate_manga(
        &self,
        title: &str,
        plot: &str,
        reference_images: &[PathBuf],
    ) -> Result<MangaResult, MangaError> {
        info!("Generating Creative Brief...");
        let brief = self.brief.generate_brief(title, plot, reference_images).await?;

        info!("Generating Voiceover...");
        let audio_file = self.narrate(&brief.narrator_script, &brief.voice_description).await;

        info!("Generating {} Manga Pages...", brief.page_prompts.len());
        let pb = self.page_progress(brief.page_prompts.len());
        let mut pages = Vec::with_capacity(brief.page_prompts.len());
        let mut last_page: Option<PathBuf> = None;

        for (i, prompt) in brief.page_prompts.iter().enumerate() {
            let page_number = i + 1;
            pb.set_message(format!("page {}", page_number));
            match self
                .pages
                .generate_page(
                    page_number,
                    prompt,
                    &brief.visual_style,
                    reference_images,
                    last_page.as_deref(),
                )
                .await
            {
                Ok(artifact) => {
                    pages.push(self.relative_name(&artifact.image_path));
                    last_page = Some(artifact.image_path);
                }
                Err(e) => error!("Failed to generate page {}: {}", page_number, e),
            }
            pb.inc(1);
        }
        pb.finish_with_message("Pages complete");

        Ok(MangaResult {
            title: title.to_string(),
            script: brief.narrator_script,
            audio_file,
            pages,
        })
    }

    async fn narrate(&self, script: &str, voice_description: &str) -> Option<String> {
        let relative = Path::new(AUDIO_DIR).join(unique_file_name("voiceover", "mp3"));
        let audio_path = self.output_folder.join(&relative);
        let audio_path_str = audio_path.to_string_lossy();

        if let Err(e) = self.voice.synthesize(script, voice_description, &audio_path_str).await {
            error!("Voice generation failed: {}", e);
            return None;
        }

        match self.storage.exists(&audio_path_str).await {
            Ok(true) => Some(relative.to_string_lossy().to_string()),
            Ok(false) => {
                warn!("Narration reported success but {} is missing", audio_path_str);
                None
            }
            Err(e) => {
                warn!("Could not check {}: {:#}", audio_path_str, e);
                None
            }
        }
    }

    fn relative_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.output_folder)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }

    fn page_progress(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        match ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} ({eta})")
        {
            Ok(style) => pb.set_style(style.progress_chars("#>-")),
            Err(e) => warn!("Invalid progress template: {}", e),
        }
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::NativeStorage;
    use crate::services::llm::{ContentPart, ResponseMode};
    use crate::services::tts::{VoicePreview, VOICE_MALE_DEEP};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const HERO_BRIEF: &str = r#"{"visual_style":"noir","voice_description":"male_deep","narrator_script":"A hero rises.","pages":["hero standing"]}"#;

    /// Answers brief requests with a canned reply and page requests with an
    /// image whose bytes name the prompt. Prompts containing "fail" get no image.
    #[derive(Debug)]
    struct ScriptedModel {
        brief: Result<String, String>,
        page_requests: Arc<Mutex<Vec<Vec<ContentPart>>>>,
    }

    impl ScriptedModel {
        fn new(brief: &str) -> Self {
            Self {
                brief: Ok(brief.to_string()),
                page_requests: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl GenerativeModel for ScriptedModel {
        async fn generate(&self, model: &str, parts: Vec<ContentPart>, mode: &ResponseMode) -> Result<Vec<ContentPart>> {
            match mode {
                ResponseMode::Json => {
                    assert_eq!(model, "gemini-2.5-flash");
                    self.brief
                        .clone()
                        .map(|text| vec![ContentPart::Text(text)])
                        .map_err(|e| anyhow!(e))
                }
                ResponseMode::TextAndImage { .. } => {
                    assert_eq!(model, "gemini-3-pro-image-preview");
                    let prompt = match &parts[0] {
                        ContentPart::Text(t) => t.clone(),
                        other => panic!("prompt must come first, got {:?}", other),
                    };
                    self.page_requests.lock().unwrap().push(parts);
                    if prompt.contains("fail") {
                        return Ok(vec![ContentPart::Text("refused".to_string())]);
                    }
                    let last_line = prompt.lines().last().unwrap_or_default();
                    Ok(vec![ContentPart::Image {
                        mime_type: "image/png".to_string(),
                        data: format!("img:{}", last_line).into_bytes(),
                    }])
                }
            }
        }
    }

    struct FakeVoice {
        fail: bool,
        spoken: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl VoiceProvider for FakeVoice {
        async fn create_previews(&self, _: &str, _: &str) -> Result<Vec<VoicePreview>> {
            Err(anyhow!("voice design not expected"))
        }

        async fn create_voice_from_preview(&self, _: &str, _: &str, _: &str) -> Result<String> {
            Err(anyhow!("voice design not expected"))
        }

        async fn text_to_speech(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
            if self.fail {
                return Err(anyhow!("ElevenLabs text-to-speech error (401): invalid key"));
            }
            self.spoken
                .lock()
                .unwrap()
                .push((text.to_string(), voice_id.to_string()));
            Ok(b"ID3 mp3".to_vec())
        }
    }

    fn manager(dir: &Path, model: Arc<ScriptedModel>, voice_fails: bool) -> (WorkflowManager, Arc<Mutex<Vec<(String, String)>>>) {
        let config = Config {
            output_folder: dir.to_string_lossy().to_string(),
            ..Default::default()
        };
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let voice = FakeVoice {
            fail: voice_fails,
            spoken: spoken.clone(),
        };
        let manager = WorkflowManager::new(&config, model, Box::new(voice), Arc::new(NativeStorage::new()));
        (manager, spoken)
    }

    #[tokio::test]
    async fn test_end_to_end_single_page() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let model = Arc::new(ScriptedModel::new(HERO_BRIEF));
        let (manager, spoken) = manager(dir.path(), model.clone(), false);

        let result = manager.generate_manga("Test", "A hero rises.", &[]).await?;

        assert_eq!(result.title, "Test");
        assert_eq!(result.script, "A hero rises.");
        assert_eq!(result.pages.len(), 1);
        assert!(result.pages[0].starts_with("manga_page_"));
        assert_eq!(std::fs::read(dir.path().join(&result.pages[0]))?, b"img:hero standing");

        let audio = result.audio_file.expect("audio should be present");
        assert!(audio.starts_with("audio"));
        assert!(audio.ends_with(".mp3"));
        assert!(dir.path().join(&audio).exists());

        assert_eq!(
            *spoken.lock().unwrap(),
            vec![("A hero rises.".to_string(), VOICE_MALE_DEEP.to_string())]
        );
        let requests = model.page_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(matches!(&requests[0][0], ContentPart::Text(t) if t == "noir\n\nhero standing"));
        Ok(())
    }

    #[tokio::test]
    async fn test_voice_failure_keeps_pages() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let model = Arc::new(ScriptedModel::new(HERO_BRIEF));
        let (manager, _) = manager(dir.path(), model, true);

        let result = manager.generate_manga("Test", "A hero rises.", &[]).await?;

        assert!(result.audio_file.is_none());
        assert_eq!(result.pages.len(), 1);
        assert!(!dir.path().join(AUDIO_DIR).exists() || std::fs::read_dir(dir.path().join(AUDIO_DIR))?.count() == 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_page_is_skipped_and_chain_uses_last_success() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let brief = r#"```json
{"visual_style":"ink","voice_description":"male_narrator","narrator_script":"s","pages":["one","two fail","three"]}
```"#;
        let model = Arc::new(ScriptedModel::new(brief));
        let (manager, _) = manager(dir.path(), model.clone(), false);

        let result = manager.generate_manga("Chained", "plot", &[]).await?;

        assert_eq!(result.pages.len(), 2);
        assert_eq!(std::fs::read(dir.path().join(&result.pages[0]))?, b"img:one");
        assert_eq!(std::fs::read(dir.path().join(&result.pages[1]))?, b"img:three");

        let requests = model.page_requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].len(), 1);
        let previous_for_three = requests[2].last().unwrap();
        assert!(matches!(previous_for_three, ContentPart::Image { data, .. } if data == b"img:one"));
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_prompts_produce_zero_pages() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let model = Arc::new(ScriptedModel::new(r#"{"narrator_script":"quiet"}"#));
        let (manager, _) = manager(dir.path(), model.clone(), false);

        let result = manager
            .run(&GenerationRequest {
                title: "Empty".to_string(),
                plot: "nothing happens".to_string(),
                reference_image_paths: vec![],
            })
            .await?;

        assert!(result.pages.is_empty());
        assert_eq!(result.script, "quiet");
        assert!(model.page_requests.lock().unwrap().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_brief_failure_aborts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let model = Arc::new(ScriptedModel {
            brief: Err("503 unavailable".to_string()),
            page_requests: Arc::new(Mutex::new(Vec::new())),
        });
        let (manager, spoken) = manager(dir.path(), model.clone(), false);

        let err = manager.generate_manga("Test", "A hero rises.", &[]).await.unwrap_err();

        assert!(matches!(err, MangaError::BriefGeneration(_)));
        assert!(err.is_fatal());
        assert!(spoken.lock().unwrap().is_empty());
        assert!(model.page_requests.lock().unwrap().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_reference_image_fails_brief() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let model = Arc::new(ScriptedModel::new(HERO_BRIEF));
        let (manager, _) = manager(dir.path(), model, false);

        let err = manager
            .generate_manga("Test", "plot", &[dir.path().join("missing.png")])
            .await
            .unwrap_err();
        assert!(matches!(err, MangaError::BriefGeneration(_)));
        Ok(())
    }
}
