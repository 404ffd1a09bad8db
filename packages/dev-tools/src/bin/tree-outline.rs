//! Tree Outline Dump
//!
//! Opens a category database, optionally seeds the reference tree, and prints
//! the visible outline as JSON followed by a counter audit.
//!
//! # Usage
//!
//! ```bash
//! # Seed an empty database and print its outline
//! cargo run -p canopy-dev-tools --bin tree-outline -- --seed
//!
//! # Hide categories 6 and 7
//! CANOPY_HIDDEN='[6,7]' cargo run -p canopy-dev-tools --bin tree-outline
//! ```
//!
//! # Environment Variables
//!
//! - `CANOPY_CONFIG`: JSON config file (see `CanopyConfig`)
//! - `CANOPY_DB_PATH`: Database path, overrides the config file
//! - `CANOPY_HIDDEN`: JSON array of category ids to hide
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")

use anyhow::{Context, Result};
use canopy_core::{
    CanopyConfig, CategoryId, DatabaseService, NewCategory, TreeService, Visibility,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

fn load_config() -> Result<CanopyConfig> {
    let mut config = match env::var("CANOPY_CONFIG") {
        Ok(path) => CanopyConfig::from_json_file(&PathBuf::from(path))
            .map_err(anyhow::Error::msg)?,
        Err(_) => CanopyConfig::default(),
    };

    if let Ok(db_path) = env::var("CANOPY_DB_PATH") {
        config.database_path = PathBuf::from(db_path);
    }

    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

fn load_visibility() -> Result<Visibility> {
    match env::var("CANOPY_HIDDEN") {
        Ok(raw) => {
            let value: serde_json::Value =
                serde_json::from_str(&raw).context("CANOPY_HIDDEN must be valid JSON")?;
            Ok(Visibility::from_json(&value))
        }
        Err(_) => Ok(Visibility::none()),
    }
}

/// Seed r1 → r11 → r111, r2 → {r21 → r211, r22 → r221}, r3
async fn seed(service: &TreeService) -> Result<()> {
    let tree: [(&str, Option<&str>); 9] = [
        ("r1", None),
        ("r2", None),
        ("r3", None),
        ("r11", Some("r1")),
        ("r21", Some("r2")),
        ("r22", Some("r2")),
        ("r111", Some("r11")),
        ("r211", Some("r21")),
        ("r221", Some("r22")),
    ];

    let mut ids: Vec<(&str, CategoryId)> = Vec::with_capacity(tree.len());
    for (name, parent) in tree {
        let parent_id = match parent {
            Some(parent) => Some(
                ids.iter()
                    .find(|(n, _)| *n == parent)
                    .map(|(_, id)| *id)
                    .context("seed parent must be created first")?,
            ),
            None => None,
        };
        let category = service
            .create(NewCategory {
                name: name.to_string(),
                parent_id,
            })
            .await?;
        ids.push((name, category.id()));
    }

    tracing::info!("Seeded {} categories", ids.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config()?;
    tracing::info!("Database: {:?}", config.database_path);

    let db = Arc::new(
        DatabaseService::from_config(&config)
            .await
            .context("Failed to open category database")?,
    );
    let service = TreeService::new(db);

    let reader = service.reader(Visibility::none());
    if env::args().any(|arg| arg == "--seed") {
        if reader.count().await? == 0 {
            seed(&service).await?;
        } else {
            tracing::warn!("Database is not empty, skipping seed");
        }
    }

    let visibility = load_visibility()?;
    if !visibility.is_empty() {
        tracing::info!("Hidden categories: {:?}", visibility.hidden());
    }

    let outline = service.reader(visibility).outline().await?;
    println!("{}", serde_json::to_string_pretty(&outline)?);

    let mismatches = service.verify_counters().await?;
    if mismatches.is_empty() {
        tracing::info!("Counter audit passed ({} categories)", reader.count().await?);
    } else {
        for mismatch in &mismatches {
            tracing::warn!("Stale counters: {:?}", mismatch);
        }
        anyhow::bail!("{} categories have stale counters", mismatches.len());
    }

    Ok(())
}
