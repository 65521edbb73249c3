use crate::core::error::MangaError;
use crate::core::io::Storage;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{error, info, warn};
use serde::Deserialize;
use std::sync::Arc;

pub mod elevenlabs;

// --- Voice table ---

pub const VOICE_MALE_DEEP: &str = "ErXwobaYiN019PkySvjV";
pub const VOICE_MALE_NARRATOR: &str = "TxGEqnHWrfWFTfGW9XjX";
pub const VOICE_FEMALE_SOFT: &str = "EXAVITQu4vr4xnSDxMaL";
pub const VOICE_FEMALE_ENERGETIC: &str = "21m00Tcm4TlvDq8ikWAM";
pub const VOICE_DEFAULT: &str = VOICE_FEMALE_ENERGETIC;

/// Short codes accepted verbatim (case-insensitive) as voice descriptions.
pub const VOICE_MAPPING: &[(&str, &str)] = &[
    ("male_deep", VOICE_MALE_DEEP),
    ("male_narrator", VOICE_MALE_NARRATOR),
    ("female_soft", VOICE_FEMALE_SOFT),
    ("female_energetic", VOICE_FEMALE_ENERGETIC),
    ("default", VOICE_DEFAULT),
];

const MALE_DEEP_WORDS: &[&str] = &["deep", "gruff"];
const FEMALE_SOFT_WORDS: &[&str] = &["soft", "gentle"];

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct VoicePreview {
    pub generated_voice_id: String,
}

/// Text-to-speech backend with voice design support.
#[async_trait]
pub trait VoiceProvider: Send + Sync {
    /// Generates candidate voices from a free-text description.
    async fn create_previews(&self, voice_description: &str, text: &str) -> Result<Vec<VoicePreview>>;
    /// Persists a preview as a named voice and returns its id.
    async fn create_voice_from_preview(
        &self,
        voice_name: &str,
        voice_description: &str,
        generated_voice_id: &str,
    ) -> Result<String>;
    /// Renders `text` and returns the concatenated audio stream.
    async fn text_to_speech(&self, text: &str, voice_id: &str) -> Result<Vec<u8>>;
}

pub fn lookup_voice_code(description: &str) -> Option<&'static str> {
    let code = description.trim().to_lowercase();
    VOICE_MAPPING
        .iter()
        .find(|(name, _)| *name == code)
        .map(|(_, id)| *id)
}

fn is_female_word(word: &str) -> bool {
    ["woman", "women", "female"].iter().any(|k| word.starts_with(k))
}

/// `man`, `men`, `male...`, `manly` and compounds such as `gentleman`.
fn is_male_word(word: &str) -> bool {
    if is_female_word(word) || word == "human" {
        return false;
    }
    matches!(word, "man" | "men" | "manly")
        || word.starts_with("male")
        || word.ends_with("man")
        || word.ends_with("men")
}

/// Keyword heuristics over the words of a description. Female words are
/// checked first since every `female` also reads as `male`.
pub fn match_voice_keywords(description: &str) -> Option<&'static str> {
    let lower = description.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has_any = |keys: &[&str]| words.iter().any(|w| keys.contains(w));

    if words.iter().any(|w| is_female_word(w)) {
        if has_any(FEMALE_SOFT_WORDS) {
            return Some(VOICE_FEMALE_SOFT);
        }
        return Some(VOICE_FEMALE_ENERGETIC);
    }
    if words.iter().any(|w| is_male_word(w)) {
        if has_any(MALE_DEEP_WORDS) {
            return Some(VOICE_MALE_DEEP);
        }
        return Some(VOICE_MALE_NARRATOR);
    }
    None
}

pub fn custom_voice_name(description: &str) -> String {
    let prefix: String = description.chars().take(20).collect();
    format!("Voice for {}", prefix)
}

pub struct VoiceSynthesizer {
    provider: Box<dyn VoiceProvider>,
    storage: Arc<dyn Storage>,
    preview_text: String,
}

impl VoiceSynthesizer {
    pub fn new(provider: Box<dyn VoiceProvider>, storage: Arc<dyn Storage>, preview_text: &str) -> Self {
        Self {
            provider,
            storage,
            preview_text: preview_text.to_string(),
        }
    }

    /// Maps a voice description to a provider voice id. Never fails: a voice
    /// design error falls back to [`VOICE_DEFAULT`].
    pub async fn resolve_voice_id(&self, description: &str) -> String {
        if let Some(id) = lookup_voice_code(description) {
            return id.to_string();
        }
        if let Some(id) = match_voice_keywords(description) {
            return id.to_string();
        }

        // Every novel description designs a fresh voice; nothing is cached.
        let voice_name = custom_voice_name(description);
        match self.create_custom_voice(description, &voice_name).await {
            Ok(id) => {
                info!("Created custom voice '{}' ({})", voice_name, id);
                id
            }
            Err(e) => {
                warn!("Custom voice design failed, using default voice: {:#}", e);
                VOICE_DEFAULT.to_string()
            }
        }
    }

    async fn create_custom_voice(&self, description: &str, voice_name: &str) -> Result<String> {
        info!("Creating custom voice '{}' based on: '{}'", voice_name, description);
        let previews = self
            .provider
            .create_previews(description, &self.preview_text)
            .await?;
        let first = previews
            .first()
            .ok_or_else(|| anyhow!("Voice design returned no previews"))?;
        self.provider
            .create_voice_from_preview(voice_name, description, &first.generated_voice_id)
            .await
    }

    /// Renders `script` to `output_path`. On failure nothing is written and the
    /// error is logged; callers treat it as non-fatal.
    pub async fn synthesize(&self, script: &str, voice_description: &str, output_path: &str) -> Result<(), MangaError> {
        let result = async {
            let voice_id = self.resolve_voice_id(voice_description).await;
            info!("Using voice id {} for narration", voice_id);
            let audio = self.provider.text_to_speech(script, &voice_id).await?;
            self.storage.write(output_path, &audio).await?;
            info!("Generated audio: {} ({} bytes)", output_path, audio.len());
            Ok::<(), anyhow::Error>(())
        }
        .await;

        result.map_err(|e| {
            let preview: String = script.chars().take(20).collect();
            error!("Error generating voice for '{}...': {:#}", preview, e);
            MangaError::voice(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::NativeStorage;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockProvider {
        fail_design: bool,
        fail_tts: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl VoiceProvider for MockProvider {
        async fn create_previews(&self, voice_description: &str, text: &str) -> Result<Vec<VoicePreview>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("previews:{}:{}", voice_description, text));
            if self.fail_design {
                return Err(anyhow!("quota exceeded"));
            }
            Ok(vec![
                VoicePreview { generated_voice_id: "gen-1".to_string() },
                VoicePreview { generated_voice_id: "gen-2".to_string() },
            ])
        }

        async fn create_voice_from_preview(&self, voice_name: &str, _: &str, generated_voice_id: &str) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("save:{}:{}", voice_name, generated_voice_id));
            Ok(format!("voice-from-{}", generated_voice_id))
        }

        async fn text_to_speech(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
            self.calls.lock().unwrap().push(format!("tts:{}", voice_id));
            if self.fail_tts {
                return Err(anyhow!("stream interrupted"));
            }
            Ok(format!("audio[{}]", text).into_bytes())
        }
    }

    fn synthesizer(provider: MockProvider) -> VoiceSynthesizer {
        VoiceSynthesizer::new(Box::new(provider), Arc::new(NativeStorage::new()), "This is how I sound.")
    }

    #[tokio::test]
    async fn test_short_codes_are_case_insensitive() {
        let synth = synthesizer(MockProvider::default());
        let lower = synth.resolve_voice_id("male_deep").await;
        let upper = synth.resolve_voice_id("MALE_DEEP").await;
        assert_eq!(lower, upper);
        assert_eq!(lower, VOICE_MALE_DEEP);
        assert_eq!(synth.resolve_voice_id(" female_soft ").await, VOICE_FEMALE_SOFT);
    }

    #[tokio::test]
    async fn test_keyword_heuristics() {
        let synth = synthesizer(MockProvider::default());
        assert_eq!(
            synth.resolve_voice_id("a deep gruff man").await,
            synth.resolve_voice_id("male_deep").await
        );
        assert_eq!(synth.resolve_voice_id("An old man, calm").await, VOICE_MALE_NARRATOR);
        assert_eq!(synth.resolve_voice_id("Gentle young woman").await, VOICE_FEMALE_SOFT);
        assert_eq!(synth.resolve_voice_id("Female, bright and fast").await, VOICE_FEMALE_ENERGETIC);
    }

    #[test]
    fn test_keywords_ignore_unrelated_words() {
        assert_eq!(match_voice_keywords("a gentle woman"), Some(VOICE_FEMALE_SOFT));
        assert_eq!(match_voice_keywords("mandolin-playing bard"), None);
        assert_eq!(match_voice_keywords("a menacing human oracle"), None);
        assert_eq!(match_voice_keywords("Deep, gravelly voice of an ancient warrior"), None);
    }

    #[test]
    fn test_keywords_match_plurals_and_compounds() {
        assert_eq!(match_voice_keywords("two gruff males"), Some(VOICE_MALE_DEEP));
        assert_eq!(match_voice_keywords("a deep gentleman"), Some(VOICE_MALE_DEEP));
        assert_eq!(match_voice_keywords("a manly deep voice"), Some(VOICE_MALE_DEEP));
        assert_eq!(match_voice_keywords("old fishermen, weary"), Some(VOICE_MALE_NARRATOR));
        assert_eq!(match_voice_keywords("soft-spoken females"), Some(VOICE_FEMALE_SOFT));
        assert_eq!(match_voice_keywords("Two women, loud and quick"), Some(VOICE_FEMALE_ENERGETIC));
        assert_eq!(match_voice_keywords("A female with a deep voice"), Some(VOICE_FEMALE_ENERGETIC));
    }

    #[tokio::test]
    async fn test_free_text_designs_new_voice_each_time() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let synth = synthesizer(MockProvider { calls: calls.clone(), ..Default::default() });
        let description = "Raspy elderly wizard with a slow cadence";

        assert_eq!(synth.resolve_voice_id(description).await, "voice-from-gen-1");
        assert_eq!(synth.resolve_voice_id(description).await, "voice-from-gen-1");

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 4, "no caching between calls: {:?}", calls);
        assert_eq!(calls[0], format!("previews:{}:This is how I sound.", description));
        assert_eq!(calls[1], "save:Voice for Raspy elderly wizard:gen-1");
    }

    #[tokio::test]
    async fn test_design_failure_falls_back_to_default() {
        let synth = synthesizer(MockProvider { fail_design: true, ..Default::default() });
        assert_eq!(synth.resolve_voice_id("ethereal ghost").await, VOICE_DEFAULT);
    }

    #[tokio::test]
    async fn test_synthesize_writes_file_and_creates_dirs() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("audio").join("voiceover.mp3");
        let out_str = out.to_string_lossy().to_string();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let synth = synthesizer(MockProvider { calls: calls.clone(), ..Default::default() });

        synth.synthesize("A hero rises.", "male_deep", &out_str).await?;

        assert_eq!(std::fs::read(&out)?, b"audio[A hero rises.]");
        assert_eq!(*calls.lock().unwrap(), vec![format!("tts:{}", VOICE_MALE_DEEP)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_synthesize_failure_leaves_no_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("voiceover.mp3");
        let synth = synthesizer(MockProvider { fail_tts: true, ..Default::default() });

        let err = synth
            .synthesize("text", "male_deep", &out.to_string_lossy())
            .await
            .unwrap_err();
        assert!(matches!(err, MangaError::VoiceSynthesis(_)));
        assert!(!err.is_fatal());
        assert!(!out.exists());
        Ok(())
    }
}
