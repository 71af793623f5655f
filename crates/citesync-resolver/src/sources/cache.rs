//! On-disk cache of records a source has already returned.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use citesync_core::AppConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::identifiers::Identifier;
use crate::sources::PartialRecord;

/// One JSON file per identifier under `<cache_dir>/citesync/<source>`.
///
/// Only `Found` records are stored; a miss or an expired file means the
/// source is asked again.
#[derive(Debug, Clone)]
pub struct RecordCache {
    dir: PathBuf,
    ttl: Duration,
}

#[derive(Serialize, Deserialize)]
struct CachedRecord {
    identifier: Identifier,
    fetched_at: DateTime<Utc>,
    record: PartialRecord,
}

impl RecordCache {
    pub fn for_source(source: &str, ttl: Duration) -> Self {
        Self::in_dir(AppConfig::cache_dir().join(source), ttl)
    }

    pub fn in_dir(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    fn path_for(&self, identifier: &Identifier) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        identifier.hash(&mut hasher);
        self.dir.join(format!("{:016x}.json", hasher.finish()))
    }

    pub async fn load(&self, identifier: &Identifier) -> Option<PartialRecord> {
        let path = self.path_for(identifier);
        let data = tokio::fs::read(&path).await.ok()?;
        let cached: CachedRecord = serde_json::from_slice(&data).ok()?;
        if &cached.identifier != identifier {
            return None;
        }
        let age = Utc::now().signed_duration_since(cached.fetched_at);
        if age.to_std().is_ok_and(|age| age > self.ttl) {
            debug!(%identifier, "cached record expired");
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        }
        Some(cached.record)
    }

    pub async fn store(&self, identifier: &Identifier, record: &PartialRecord) {
        let cached = CachedRecord {
            identifier: identifier.clone(),
            fetched_at: Utc::now(),
            record: record.clone(),
        };
        let Ok(data) = serde_json::to_vec(&cached) else {
            return;
        };
        if tokio::fs::create_dir_all(&self.dir).await.is_ok() {
            let _ = tokio::fs::write(self.path_for(identifier), data).await;
        }
    }
}
