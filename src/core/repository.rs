//! Project persistence.
//!
//! The pipeline only talks to [`ProjectRepository`]; the in-process store is
//! what the CLI uses and is lost when the process exits.

use crate::core::models::{NewProject, ProjectRecord};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Stores a project and assigns the next identifier.
    async fn insert(&self, project: NewProject) -> Result<ProjectRecord>;
    async fn get(&self, id: u64) -> Result<Option<ProjectRecord>>;
    /// All projects, newest first.
    async fn list_recent(&self) -> Result<Vec<ProjectRecord>>;
}

#[derive(Debug, Default)]
struct Store {
    projects: Vec<ProjectRecord>,
    next_id: u64,
}

/// Vec-backed repository. Id assignment and insertion happen under one lock.
#[derive(Debug, Clone)]
pub struct InMemoryProjectRepository {
    store: Arc<RwLock<Store>>,
}

impl InMemoryProjectRepository {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(Store {
                projects: Vec::new(),
                next_id: 1,
            })),
        }
    }
}

impl Default for InMemoryProjectRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectRepository for InMemoryProjectRepository {
    async fn insert(&self, project: NewProject) -> Result<ProjectRecord> {
        let mut store = self.store.write().await;
        let record = ProjectRecord {
            id: store.next_id,
            title: project.title,
            protagonist_image_path: project.protagonist_image_path,
            comic_file_path: project.comic_file_path,
            avatar_id: project.avatar_id,
            created_at: Utc::now(),
        };
        store.next_id += 1;
        store.projects.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: u64) -> Result<Option<ProjectRecord>> {
        let store = self.store.read().await;
        Ok(store.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn list_recent(&self) -> Result<Vec<ProjectRecord>> {
        let store = self.store.read().await;
        let mut projects = store.projects.clone();
        // newest first; same-instant inserts fall back to id
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_project(title: &str) -> NewProject {
        NewProject {
            title: title.to_string(),
            protagonist_image_path: "hero.png".to_string(),
            comic_file_path: "comic.pdf".to_string(),
            avatar_id: format!("avatar-{}", title),
        }
    }

    #[tokio::test]
    async fn test_ids_start_at_one_and_increment() -> Result<()> {
        let repo = InMemoryProjectRepository::new();
        assert!(repo.list_recent().await?.is_empty());

        let first = repo.insert(new_project("One")).await?;
        let second = repo.insert(new_project("Two")).await?;

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(repo.list_recent().await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_and_list_recent() -> Result<()> {
        let repo = InMemoryProjectRepository::new();
        repo.insert(new_project("Old")).await?;
        repo.insert(new_project("New")).await?;

        let found = repo.get(2).await?.expect("project 2");
        assert_eq!(found.title, "New");
        assert!(repo.get(99).await?.is_none());

        let titles: Vec<String> = repo
            .list_recent()
            .await?
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, vec!["New", "Old"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_inserts_get_distinct_ids() -> Result<()> {
        let repo = InMemoryProjectRepository::new();
        let mut handles = Vec::new();
        for i in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.insert(new_project(&i.to_string())).await
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await??.id);
        }
        ids.sort();
        assert_eq!(ids, (1..=16).collect::<Vec<u64>>());
        Ok(())
    }
}
