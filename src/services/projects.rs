use crate::core::error::MangaError;
use crate::core::models::{EmbedConfig, NewProject, ProjectRecord};
use crate::core::repository::ProjectRepository;
use crate::services::avatar::AvatarProvisioner;
use anyhow::Result;
use log::{error, info};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// A stored project together with a fresh session for its avatar.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectView {
    pub project: ProjectRecord,
    pub embed: EmbedConfig,
}

pub struct ProjectService {
    provisioner: AvatarProvisioner,
    repository: Arc<dyn ProjectRepository>,
}

impl ProjectService {
    pub fn new(provisioner: AvatarProvisioner, repository: Arc<dyn ProjectRepository>) -> Self {
        Self {
            provisioner,
            repository,
        }
    }

    /// Provisions an avatar from the protagonist image and records the project.
    /// Nothing is stored when provisioning fails.
    pub async fn create_project(
        &self,
        title: &str,
        comic_path: &Path,
        protagonist_image_path: &Path,
    ) -> Result<ProjectRecord, MangaError> {
        let avatar_id = self
            .provisioner
            .create_avatar(protagonist_image_path, title)
            .await
            .map_err(|e| {
                error!("Error creating avatar for '{}': {}", title, e);
                e
            })?;

        let record = self
            .repository
            .insert(NewProject {
                title: title.to_string(),
                protagonist_image_path: protagonist_image_path.to_string_lossy().to_string(),
                comic_file_path: comic_path.to_string_lossy().to_string(),
                avatar_id,
            })
            .await
            .map_err(MangaError::provisioning)?;

        info!("Project {} created with avatar {}", record.id, record.avatar_id);
        Ok(record)
    }

    pub async fn list_projects(&self) -> Result<Vec<ProjectRecord>> {
        self.repository.list_recent().await
    }

    /// `None` when no project has this id.
    pub async fn view_project(&self, id: u64) -> Result<Option<ProjectView>, MangaError> {
        let Some(project) = self.repository.get(id).await.map_err(MangaError::provisioning)? else {
            return Ok(None);
        };
        let embed = self.provisioner.get_embed_config(&project.avatar_id).await?;
        Ok(Some(ProjectView { project, embed }))
    }
}
