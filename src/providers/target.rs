use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Externally-owned persistence for the single scalar that survives
/// between ticks: the daily charge target. Written once per day by the
/// planner, read every tick by the cascade. No compare-and-swap; the
/// scheduler guarantees at most one concurrent invocation.
#[async_trait]
pub trait TargetSocStore: Send + Sync {
    async fn read(&self) -> Result<Option<u8>>;
    async fn write(&self, target_soc: u8) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredTarget {
    target_soc: u8,
    updated_at: DateTime<FixedOffset>,
}

/// JSON-file backed store, the default for a standalone deployment
pub struct FileTargetSocStore {
    path: PathBuf,
}

impl FileTargetSocStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TargetSocStore for FileTargetSocStore {
    async fn read(&self) -> Result<Option<u8>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(body) => {
                let stored: StoredTarget =
                    serde_json::from_str(&body).context("target store JSON parse failed")?;
                Ok(Some(stored.target_soc))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    async fn write(&self, target_soc: u8) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let stored = StoredTarget {
            target_soc,
            updated_at: Local::now().fixed_offset(),
        };
        let body = serde_json::to_string_pretty(&stored)?;
        tokio::fs::write(&self.path, body)
            .await
            .with_context(|| format!("writing {}", self.path.display()))
    }
}

/// In-memory store for tests and the simulator
#[derive(Debug, Default)]
pub struct InMemoryTargetSocStore {
    value: RwLock<Option<u8>>,
}

impl InMemoryTargetSocStore {
    pub fn with_value(target_soc: u8) -> Self {
        Self {
            value: RwLock::new(Some(target_soc)),
        }
    }
}

#[async_trait]
impl TargetSocStore for InMemoryTargetSocStore {
    async fn read(&self) -> Result<Option<u8>> {
        Ok(*self.value.read().await)
    }

    async fn write(&self, target_soc: u8) -> Result<()> {
        *self.value.write().await = Some(target_soc);
        Ok(())
    }
}
