use std::path::PathBuf;

use chrono::Local;

use crate::{
    management::{JsonStore, StoreError},
    types::StartupDocument,
};

pub const STARTUP_FILE: &str = "startup.json";

/// Remembers whether the very first start has already been announced.
pub struct StartupMarker {
    store: JsonStore<StartupDocument>,
}

impl StartupMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: JsonStore::new(path),
        }
    }

    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self::new(data_dir.into().join(STARTUP_FILE))
    }

    /// True until [`mark_complete`](Self::mark_complete) has succeeded once.
    /// A missing or unreadable marker counts as a first start.
    pub async fn is_first_startup(&self) -> bool {
        !self
            .store
            .read_existing()
            .await
            .is_some_and(|doc| doc.initial_startup_complete)
    }

    /// Persists the marker with the current time as first start.
    pub async fn mark_complete(&self) -> Result<(), StoreError> {
        self.store
            .write(&StartupDocument {
                initial_startup_complete: true,
                first_startup_time: Some(Local::now().to_rfc3339()),
            })
            .await
    }
}
