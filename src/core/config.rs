use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::services::avatar::AnamConfig;
use crate::services::llm::GeminiConfig;
use crate::services::tts::elevenlabs::ElevenLabsConfig;

pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub elevenlabs: ElevenLabsConfig,

    #[serde(default)]
    pub anam: AnamConfig,
}

fn default_output() -> String {
    "output".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_folder: default_output(),
            gemini: GeminiConfig::default(),
            elevenlabs: ElevenLabsConfig::default(),
            anam: AnamConfig::default(),
        }
    }
}

impl Config {
    /// Loads `config.yml` from the working directory, falling back to defaults
    /// when the file does not exist. Environment variables win over the file.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Self::from_yaml(&content)?
        } else {
            log::info!("{} not found, using defaults", path.display());
            Config::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml_ng::from_str(content).context("Failed to parse config.yml")
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GOOGLE_API_KEY") {
            self.gemini.api_key = key;
        }
        if let Some(key) = lookup("ELEVENLABS_API_KEY") {
            self.elevenlabs.api_key = key;
        }
        if let Some(key) = lookup("ANAM_API_KEY") {
            self.anam.api_key = key;
        }
        if let Some(url) = lookup("ANAM_API_URL") {
            self.anam.base_url = url;
        }
        if let Some(folder) = lookup("MANGA_OUTPUT_FOLDER") {
            self.output_folder = folder;
        }
    }

    pub fn audio_folder(&self) -> PathBuf {
        Path::new(&self.output_folder).join("audio")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        fs::create_dir_all(self.audio_folder())?;
        Ok(())
    }
}
