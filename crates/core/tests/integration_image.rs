//! Integration tests for base image build-or-reuse

use anyhow::Result;
use branchbox_core::config::Config;
use branchbox_core::docker::mock::MockDocker;
use branchbox_core::errors::{BranchboxError, DockerError};
use branchbox_core::image::{
    recipe_hash, ImageProvisioner, Recipe, BUNDLED_RECIPE, LABEL_BUILD_TIMESTAMP,
    LABEL_DOCKERFILE_HASH,
};
use branchbox_core::logging::Logger;
use std::collections::HashMap;
use tempfile::TempDir;

#[tokio::test]
async fn test_missing_image_is_built_with_hash_label() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();

    let tag = ImageProvisioner::new(&docker, &config, Logger::new(false))
        .ensure_image()
        .await?;

    assert_eq!(tag, "branchbox-base:latest");
    let builds = docker.get_builds();
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].tag, tag);
    assert_eq!(builds[0].recipe, BUNDLED_RECIPE);
    assert_eq!(
        builds[0].labels.get(&config.label_key(LABEL_DOCKERFILE_HASH)),
        Some(&recipe_hash(BUNDLED_RECIPE.as_bytes()))
    );
    assert!(builds[0]
        .labels
        .contains_key(&config.label_key(LABEL_BUILD_TIMESTAMP)));
    Ok(())
}

#[tokio::test]
async fn test_unchanged_recipe_reuses_image() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let provisioner = ImageProvisioner::new(&docker, &config, Logger::new(false));

    provisioner.ensure_image().await?;
    provisioner.ensure_image().await?;

    assert_eq!(docker.get_builds().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_changed_recipe_triggers_rebuild() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let provisioner = ImageProvisioner::new(&docker, &config, Logger::new(false));

    provisioner.ensure_image().await?;
    let changed = Recipe::from_text("FROM ubuntu:24.04\nRUN echo changed\n");
    provisioner.ensure_image_from(&changed).await?;
    provisioner.ensure_image_from(&changed).await?;

    let builds = docker.get_builds();
    assert_eq!(builds.len(), 2);
    assert_eq!(builds[1].recipe, changed.content());
    Ok(())
}

#[tokio::test]
async fn test_image_without_hash_label_is_rebuilt() -> Result<()> {
    let docker = MockDocker::new();
    docker.add_image("branchbox-base:latest", HashMap::new());
    let config = Config::default();

    let provisioner = ImageProvisioner::new(&docker, &config, Logger::new(false));
    assert!(provisioner.needs_rebuild(&Recipe::bundled().hash()).await?);

    provisioner.ensure_image().await?;
    assert_eq!(docker.get_builds().len(), 1);
    assert!(!provisioner.needs_rebuild(&Recipe::bundled().hash()).await?);
    Ok(())
}

#[tokio::test]
async fn test_configured_dockerfile_is_used() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("Dockerfile");
    std::fs::write(&path, "FROM debian:bookworm\n")?;

    let docker = MockDocker::new();
    let config = Config {
        dockerfile: Some(path),
        ..Config::default()
    };

    ImageProvisioner::new(&docker, &config, Logger::new(false))
        .ensure_image()
        .await?;

    assert_eq!(docker.get_builds()[0].recipe, "FROM debian:bookworm\n");
    Ok(())
}

#[tokio::test]
async fn test_missing_configured_dockerfile() -> Result<()> {
    let dir = TempDir::new()?;
    let docker = MockDocker::new();
    let config = Config {
        dockerfile: Some(dir.path().join("nope.Dockerfile")),
        ..Config::default()
    };

    let err = ImageProvisioner::new(&docker, &config, Logger::new(false))
        .ensure_image()
        .await
        .unwrap_err();

    assert!(matches!(err, BranchboxError::Docker(DockerError::RecipeNotFound { .. })));
    assert!(docker.get_builds().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_build_failure_is_reported() -> Result<()> {
    let docker = MockDocker::new();
    docker.update_config(|c| c.build_failure = Some("returned a non-zero code: 100".to_string()));
    let config = Config::default();

    let err = ImageProvisioner::new(&docker, &config, Logger::new(false))
        .ensure_image()
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Docker error: Build failed: returned a non-zero code: 100"
    );
    Ok(())
}
