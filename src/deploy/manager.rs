//! Deployment bookkeeping

use crate::config::ConfigManager;
use crate::deploy::state::{Deployment, DeploymentStatus};
use crate::error::{BerthError, BerthResult};
use chrono::Utc;
use std::path::PathBuf;
use tracing::{debug, info};

/// Deployment manager handles record CRUD
pub struct DeploymentManager {
    dir: PathBuf,
}

impl DeploymentManager {
    /// Manager over the default state directory
    pub async fn new() -> BerthResult<Self> {
        ConfigManager::ensure_state_dirs().await?;
        Ok(Self {
            dir: ConfigManager::deployments_dir(),
        })
    }

    /// Manager over a custom directory
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Record a new deployment
    pub async fn create(&self, deployment: &Deployment) -> BerthResult<()> {
        if let Some(existing) = Deployment::load(&self.dir, &deployment.name).await? {
            if existing.status.is_active() {
                return Err(BerthError::DeploymentExists(deployment.name.clone()));
            }
            // A stopped record with the same name is simply replaced
            debug!("Replacing inactive deployment record {}", existing.name);
        }

        deployment.save(&self.dir).await?;
        info!("Created deployment: {}", deployment.name);
        Ok(())
    }

    /// Get a deployment by name
    pub async fn get(&self, name: &str) -> BerthResult<Option<Deployment>> {
        Deployment::load(&self.dir, name).await
    }

    /// Get a deployment by name, or fail
    pub async fn require(&self, name: &str) -> BerthResult<Deployment> {
        self.get(name)
            .await?
            .ok_or_else(|| BerthError::DeploymentNotFound(name.to_string()))
    }

    /// List all deployments
    pub async fn list(&self) -> BerthResult<Vec<Deployment>> {
        Deployment::list_all(&self.dir).await
    }

    /// Update deployment status
    pub async fn update_status(&self, name: &str, status: DeploymentStatus) -> BerthResult<()> {
        let mut deployment = self.require(name).await?;

        deployment.status = status;
        deployment.updated_at = Utc::now();
        deployment.save(&self.dir).await?;

        debug!("Updated deployment {} status to {:?}", name, status);
        Ok(())
    }

    /// Set container ID for a deployment
    pub async fn set_container_id(&self, name: &str, container_id: &str) -> BerthResult<()> {
        let mut deployment = self.require(name).await?;

        deployment.container_id = Some(container_id.to_string());
        deployment.updated_at = Utc::now();
        deployment.save(&self.dir).await?;

        debug!("Set container ID for deployment {}: {}", name, container_id);
        Ok(())
    }

    /// Delete a deployment record
    pub async fn delete(&self, name: &str) -> BerthResult<()> {
        let deployment = self.require(name).await?;
        deployment.delete(&self.dir).await?;
        info!("Deleted deployment: {}", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn deployment(name: &str) -> Deployment {
        Deployment::new(
            name.to_string(),
            PathBuf::from("/srv/app"),
            "berth-app:abc".to_string(),
            9000,
            8080,
        )
    }

    #[tokio::test]
    async fn lifecycle() {
        let temp = TempDir::new().unwrap();
        let manager = DeploymentManager::with_dir(temp.path().to_path_buf());

        manager.create(&deployment("web")).await.unwrap();
        manager.set_container_id("web", "abc123").await.unwrap();
        manager
            .update_status("web", DeploymentStatus::Running)
            .await
            .unwrap();

        let loaded = manager.require("web").await.unwrap();
        assert_eq!(loaded.container_id.as_deref(), Some("abc123"));
        assert_eq!(loaded.status, DeploymentStatus::Running);

        manager.delete("web").await.unwrap();
        assert!(manager.get("web").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn active_name_collision_rejected() {
        let temp = TempDir::new().unwrap();
        let manager = DeploymentManager::with_dir(temp.path().to_path_buf());

        manager.create(&deployment("web")).await.unwrap();
        let err = manager.create(&deployment("web")).await.unwrap_err();
        assert!(matches!(err, BerthError::DeploymentExists(_)));

        manager
            .update_status("web", DeploymentStatus::Stopped)
            .await
            .unwrap();
        manager.create(&deployment("web")).await.unwrap();
    }

    #[tokio::test]
    async fn missing_deployment() {
        let temp = TempDir::new().unwrap();
        let manager = DeploymentManager::with_dir(temp.path().to_path_buf());
        let err = manager
            .update_status("ghost", DeploymentStatus::Stopped)
            .await
            .unwrap_err();
        assert!(matches!(err, BerthError::DeploymentNotFound(_)));
    }
}
