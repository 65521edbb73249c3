//! Pipeline error taxonomy.
//!
//! Only brief generation, provisioning and configuration errors abort an
//! operation; voice and page failures degrade the result.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MangaError {
    /// Upstream model unreachable, non-JSON reply or malformed brief.
    #[error("Brief generation failed: {0}")]
    BriefGeneration(String),

    /// Narration could not be produced; the result omits audio.
    #[error("Voice synthesis failed: {0}")]
    VoiceSynthesis(String),

    /// A single page could not be rendered; it is skipped.
    #[error("Page {page} generation failed: {reason}")]
    PageGeneration { page: usize, reason: String },

    /// Avatar provider rejected a request.
    #[error("Avatar provisioning failed: {0}")]
    Provisioning(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MangaError {
    pub fn brief(err: impl std::fmt::Display) -> Self {
        Self::BriefGeneration(format!("{:#}", err))
    }

    pub fn voice(err: impl std::fmt::Display) -> Self {
        Self::VoiceSynthesis(format!("{:#}", err))
    }

    pub fn page(page: usize, err: impl std::fmt::Display) -> Self {
        Self::PageGeneration {
            page,
            reason: format!("{:#}", err),
        }
    }

    pub fn provisioning(err: impl std::fmt::Display) -> Self {
        Self::Provisioning(format!("{:#}", err))
    }

    /// Whether the surrounding operation has to stop on this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::BriefGeneration(_) | Self::Provisioning(_) | Self::Config(_) => true,
            Self::VoiceSynthesis(_) | Self::PageGeneration { .. } => false,
        }
    }
}
