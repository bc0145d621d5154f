//! Base image provisioning
//!
//! All workspaces share one base image. The image carries the SHA-256 of the recipe
//! that produced it as a label; [`ImageProvisioner::ensure_image`] rebuilds only when
//! that label is missing or differs from the hash of the current recipe.

use crate::config::Config;
use crate::docker::Docker;
use crate::errors::{DockerError, Result};
use crate::logging::Logger;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Recipe compiled into the binary, used when no `dockerfile` is configured
pub const BUNDLED_RECIPE: &str = include_str!("../assets/Dockerfile");

/// Image label suffixes
pub const LABEL_DOCKERFILE_HASH: &str = "dockerfile_hash";
pub const LABEL_BUILD_TIMESTAMP: &str = "build_timestamp";

/// Hex-encoded SHA-256 of recipe content
pub fn recipe_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Build recipe text and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    content: String,
    origin: String,
}

impl Recipe {
    pub fn bundled() -> Self {
        Self {
            content: BUNDLED_RECIPE.to_string(),
            origin: "bundled".to_string(),
        }
    }

    /// Read a recipe from the host
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DockerError::RecipeNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| DockerError::BuildFailed {
            message: format!("could not read {}: {}", path.display(), e),
        })?;

        Ok(Self {
            content,
            origin: path.display().to_string(),
        })
    }

    pub fn from_text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            origin: "inline".to_string(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn hash(&self) -> String {
        recipe_hash(self.content.as_bytes())
    }
}

/// Ensures the shared base image exists and matches its recipe
pub struct ImageProvisioner<'a, D: Docker> {
    docker: &'a D,
    config: &'a Config,
    logger: Logger,
}

impl<'a, D: Docker> ImageProvisioner<'a, D> {
    pub fn new(docker: &'a D, config: &'a Config, logger: Logger) -> Self {
        Self {
            docker,
            config,
            logger,
        }
    }

    /// The configured recipe, or the bundled one
    pub fn recipe(&self) -> Result<Recipe> {
        match &self.config.dockerfile {
            Some(path) => Recipe::from_file(path),
            None => Ok(Recipe::bundled()),
        }
    }

    /// Whether the tagged image is missing or was built from a different recipe
    pub async fn needs_rebuild(&self, recipe_hash: &str) -> Result<bool> {
        let tag = &self.config.base_image;
        let Some(image) = self.docker.inspect_image(tag).await? else {
            debug!("Image {} not found", tag);
            return Ok(true);
        };

        let stored = image
            .labels
            .get(&self.config.label_key(LABEL_DOCKERFILE_HASH))
            .map(String::as_str)
            .unwrap_or_default();

        if stored != recipe_hash {
            debug!(
                "Dockerfile changed (hash: {}...)",
                &recipe_hash[..recipe_hash.len().min(12)]
            );
            return Ok(true);
        }

        Ok(false)
    }

    /// Build-or-reuse the base image and return its tag
    #[instrument(skip(self), fields(tag = %self.config.base_image))]
    pub async fn ensure_image(&self) -> Result<String> {
        let recipe = self.recipe()?;
        self.ensure_image_from(&recipe).await
    }

    /// Build-or-reuse the base image from an explicit recipe
    pub async fn ensure_image_from(&self, recipe: &Recipe) -> Result<String> {
        let tag = self.config.base_image.clone();
        let hash = recipe.hash();

        if !self.needs_rebuild(&hash).await? {
            debug!("Using existing image: {}", tag);
            return Ok(tag);
        }

        info!("Building base image: {}", tag);
        debug!("Recipe source: {}", recipe.origin());

        let labels = BTreeMap::from([
            (self.config.label_key(LABEL_DOCKERFILE_HASH), hash),
            (
                self.config.label_key(LABEL_BUILD_TIMESTAMP),
                chrono::Utc::now().timestamp().to_string(),
            ),
        ]);

        let mut sink = self.logger.line_sink();
        self.docker
            .build_image(&tag, recipe.content(), &labels, &mut sink)
            .await?;

        debug!("Successfully built image: {} ({} output lines)", tag, sink.emitted());
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipe_hash_is_sha256_hex() {
        assert_eq!(
            recipe_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(recipe_hash(b"FROM ubuntu:22.04\n").len(), 64);
    }

    #[test]
    fn test_recipe_hash_changes_with_content() {
        let a = Recipe::from_text("FROM ubuntu:22.04\n");
        let b = Recipe::from_text("FROM ubuntu:24.04\n");
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), Recipe::from_text("FROM ubuntu:22.04\n").hash());
    }

    #[test]
    fn test_bundled_recipe() {
        let recipe = Recipe::bundled();
        assert!(recipe.content().starts_with("FROM "));
        assert!(recipe.content().contains("developer"));
        assert_eq!(recipe.origin(), "bundled");
    }

    #[test]
    fn test_missing_recipe_file() {
        let err = Recipe::from_file(Path::new("/nonexistent/Dockerfile")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Docker error: Dockerfile not found at /nonexistent/Dockerfile"
        );
    }

    #[test]
    fn test_recipe_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("Dockerfile");
        std::fs::write(&path, "FROM alpine:3.20\n").unwrap();

        let recipe = Recipe::from_file(&path).unwrap();
        assert_eq!(recipe.content(), "FROM alpine:3.20\n");
        assert_eq!(recipe.hash(), recipe_hash(b"FROM alpine:3.20\n"));
    }
}
