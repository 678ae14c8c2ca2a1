//! Deployment state persistence

use crate::error::{BerthError, BerthResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Deployment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Starting,
    Running,
    Stopped,
    Failed,
}

impl DeploymentStatus {
    /// Whether a container may still be alive
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

/// Record of a container started by `berth run`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// Unique deployment ID
    pub id: Uuid,

    /// Human-readable name (also the container name)
    pub name: String,

    /// Project the image was built from
    pub project_dir: PathBuf,

    /// Image tag that was run
    pub image_tag: String,

    /// Container ID (once started)
    pub container_id: Option<String>,

    /// Port published on the host
    pub host_port: u16,

    /// Port the server listens on inside the container
    pub container_port: u16,

    /// Current status
    pub status: DeploymentStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Deployment {
    /// Create a new deployment record
    pub fn new(
        name: String,
        project_dir: PathBuf,
        image_tag: String,
        host_port: u16,
        container_port: u16,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            project_dir,
            image_tag,
            container_id: None,
            host_port,
            container_port,
            status: DeploymentStatus::Starting,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record file path inside `dir`
    pub fn file_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{}.json", name))
    }

    /// Load a deployment from `dir`
    pub async fn load(dir: &Path, name: &str) -> BerthResult<Option<Self>> {
        let path = Self::file_path(dir, name);

        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await.map_err(|e| {
            BerthError::io(format!("reading deployment file {}", path.display()), e)
        })?;

        let deployment: Deployment = serde_json::from_str(&content)?;
        Ok(Some(deployment))
    }

    /// Save the deployment into `dir`
    pub async fn save(&self, dir: &Path) -> BerthResult<()> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| BerthError::io("creating deployments directory", e))?;

        let path = Self::file_path(dir, &self.name);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content).await.map_err(|e| {
            BerthError::io(format!("writing deployment file {}", path.display()), e)
        })?;

        Ok(())
    }

    /// Delete the deployment file
    pub async fn delete(&self, dir: &Path) -> BerthResult<()> {
        let path = Self::file_path(dir, &self.name);
        if path.exists() {
            fs::remove_file(&path).await.map_err(|e| {
                BerthError::io(format!("deleting deployment file {}", path.display()), e)
            })?;
        }
        Ok(())
    }

    /// List all deployments in `dir`, newest first. Unreadable files are skipped.
    pub async fn list_all(dir: &Path) -> BerthResult<Vec<Deployment>> {
        if !dir.exists() {
            return Ok(vec![]);
        }

        let mut deployments = vec![];
        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| BerthError::io("reading deployments directory", e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BerthError::io("reading deployment entry", e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Ok(content) = fs::read_to_string(&path).await {
                    if let Ok(deployment) = serde_json::from_str::<Deployment>(&content) {
                        deployments.push(deployment);
                    }
                }
            }
        }

        deployments.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(deployments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Deployment {
        Deployment::new(
            "web".to_string(),
            PathBuf::from("/srv/chatbot"),
            "berth-app:0123456789ab".to_string(),
            8080,
            8080,
        )
    }

    #[test]
    fn deployment_new() {
        let deployment = sample();
        assert_eq!(deployment.status, DeploymentStatus::Starting);
        assert!(deployment.container_id.is_none());
        assert!(deployment.status.is_active());
    }

    #[test]
    fn deployment_serialize() {
        let mut deployment = sample();
        deployment.status = DeploymentStatus::Running;

        let json = serde_json::to_string(&deployment).unwrap();
        assert!(json.contains("\"running\""));

        let parsed: Deployment = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.image_tag, deployment.image_tag);
    }

    #[tokio::test]
    async fn save_load_delete() {
        let temp = TempDir::new().unwrap();
        let deployment = sample();

        deployment.save(temp.path()).await.unwrap();
        let loaded = Deployment::load(temp.path(), "web").await.unwrap().unwrap();
        assert_eq!(loaded.id, deployment.id);

        std::fs::write(temp.path().join("garbage.json"), "{").unwrap();
        assert_eq!(Deployment::list_all(temp.path()).await.unwrap().len(), 1);

        loaded.delete(temp.path()).await.unwrap();
        assert!(Deployment::load(temp.path(), "web").await.unwrap().is_none());
    }
}
