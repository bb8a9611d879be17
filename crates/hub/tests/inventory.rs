//! Local model inventory against temporary model directories.

use std::fs;
use std::path::Path;

use assert_matches::assert_matches;
use vdash_hub::{HubError, ModelInventory};

fn write(path: &Path, bytes: usize) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, vec![0u8; bytes]).unwrap();
}

#[tokio::test]
async fn missing_models_dir_lists_nothing() {
    let root = tempfile::tempdir().unwrap();
    let inventory = ModelInventory::new(root.path().join("absent"));
    assert!(inventory.list_models().await.unwrap().is_empty());
}

#[tokio::test]
async fn finds_plain_and_cached_models() {
    let root = tempfile::tempdir().unwrap();
    write(&root.path().join("acme/model-b/config.json"), 10);
    write(&root.path().join("acme/model-b/model.safetensors"), 500);
    write(
        &root
            .path()
            .join("hub/models--Other--Model-A/snapshots/abc123/config.json"),
        20,
    );
    // No indicator files: not a model.
    write(&root.path().join("scratch/notes.txt"), 1000);

    let inventory = ModelInventory::new(root.path()).with_min_model_size(0);
    let models = inventory.list_models().await.unwrap();

    let names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["acme/model-b", "Other/Model-A"]);
    assert_eq!(models[0].size, 510);
    assert_eq!(models[0].size_human, "510 B");
    assert!(models[1].path.ends_with("abc123"));
}

#[tokio::test]
async fn duplicates_keep_largest_and_small_entries_are_dropped() {
    let root = tempfile::tempdir().unwrap();
    write(&root.path().join("acme/tiny/config.json"), 10);
    write(
        &root.path().join("cache/models--acme--big/snapshots/r1/config.json"),
        300,
    );
    write(
        &root.path().join("models--acme--big/snapshots/r1/config.json"),
        100,
    );

    let inventory = ModelInventory::new(root.path()).with_min_model_size(50);
    let models = inventory.list_models().await.unwrap();

    assert_eq!(models.len(), 1);
    assert_eq!(models[0].name, "acme/big");
    assert_eq!(models[0].size, 300);
}

#[tokio::test]
async fn hidden_directories_are_skipped() {
    let root = tempfile::tempdir().unwrap();
    write(&root.path().join(".cache/acme/model/config.json"), 10);

    let inventory = ModelInventory::new(root.path()).with_min_model_size(0);
    assert!(inventory.list_models().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_model_inside_models_dir() {
    let root = tempfile::tempdir().unwrap();
    let model = root.path().join("acme/model-a");
    write(&model.join("config.json"), 10);

    let inventory = ModelInventory::new(root.path());
    inventory
        .delete_model(model.to_str().unwrap())
        .await
        .unwrap();
    assert!(!model.exists());

    assert_matches!(
        inventory.delete_model(model.to_str().unwrap()).await,
        Err(HubError::NotFound(_))
    );
}

#[tokio::test]
async fn delete_model_outside_models_dir_rejected() {
    let root = tempfile::tempdir().unwrap();
    let other = tempfile::tempdir().unwrap();
    write(&other.path().join("config.json"), 10);

    let inventory = ModelInventory::new(root.path());
    assert_matches!(
        inventory.delete_model(other.path().to_str().unwrap()).await,
        Err(HubError::Invalid(_))
    );
    assert_matches!(
        inventory.delete_model("../etc").await,
        Err(HubError::Invalid(_))
    );
    assert_matches!(
        inventory.delete_model(root.path().to_str().unwrap()).await,
        Err(HubError::Invalid(_))
    );
    assert!(other.path().join("config.json").exists());
}
