use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Datelike, Local};
use tracing::{info, warn};

use crate::{
    management::{JsonStore, StoreError},
    types::{LedgerDocument, NotifiedAlbum},
};

/// File name of the partition holding `year`'s notifications.
///
/// # Example
///
/// ```rust
/// assert_eq!(partition_file_name(2024), "notified_2024.json");
/// ```
pub fn partition_file_name(year: i32) -> String {
    format!("notified_{year}.json")
}

/// Year of a `notified_{year}.json` file name.
pub fn partition_year(file_name: &str) -> Option<i32> {
    file_name
        .strip_prefix("notified_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

/// Record of already-notified releases, one file per calendar year.
///
/// Dedup decisions only ever look at the current year's partition, so a
/// release announced in December can be announced again in January if it
/// still shows up. Partitions of earlier years are kept for the `releases`
/// listing unless pruning is enabled.
///
/// Each partition is a [`JsonStore`], created lazily and shared for the
/// lifetime of the ledger so its lock serializes every access to the file.
pub struct NotificationLedger {
    data_dir: PathBuf,
    prune_previous_years: bool,
    partitions: Mutex<HashMap<i32, Arc<JsonStore<LedgerDocument>>>>,
}

impl NotificationLedger {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            prune_previous_years: false,
            partitions: Mutex::new(HashMap::new()),
        }
    }

    /// Deletes earlier years' partitions on rollover when enabled.
    pub fn with_pruning(mut self, prune_previous_years: bool) -> Self {
        self.prune_previous_years = prune_previous_years;
        self
    }

    pub fn partition_path(&self, year: i32) -> PathBuf {
        self.data_dir.join(partition_file_name(year))
    }

    fn partition(&self, year: i32) -> Arc<JsonStore<LedgerDocument>> {
        let mut partitions = match self.partitions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        partitions
            .entry(year)
            .or_insert_with(|| Arc::new(JsonStore::new(self.partition_path(year))))
            .clone()
    }

    /// Whether `(artist, album)` was announced this calendar year.
    pub async fn is_notified(&self, artist: &str, album: &str) -> bool {
        self.is_notified_in(Local::now().year(), artist, album).await
    }

    pub async fn is_notified_in(&self, year: i32, artist: &str, album: &str) -> bool {
        self.partition(year)
            .read()
            .await
            .notified_albums
            .iter()
            .any(|n| n.artist == artist && n.album == album)
    }

    /// Records an announcement in the current year's partition.
    ///
    /// # Arguments
    ///
    /// * `artist` - Artist name as it appears in the catalog
    /// * `album` - Release group title
    /// * `release_date` - First release date as reported, `YYYY[-MM[-DD]]`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The pair is in the partition (recording twice is a no-op)
    /// * `Err(StoreError)` - The partition could not be written
    pub async fn record_notified(
        &self,
        artist: &str,
        album: &str,
        release_date: &str,
    ) -> Result<(), StoreError> {
        self.record_notified_at(Local::now(), artist, album, release_date)
            .await
    }

    /// Appends the pair to the partition of `now`'s year unless it is already there.
    pub async fn record_notified_at(
        &self,
        now: DateTime<Local>,
        artist: &str,
        album: &str,
        release_date: &str,
    ) -> Result<(), StoreError> {
        self.partition(now.year())
            .update(|mut doc| {
                let present = doc
                    .notified_albums
                    .iter()
                    .any(|n| n.artist == artist && n.album == album);
                if !present {
                    doc.notified_albums.push(NotifiedAlbum {
                        artist: artist.to_string(),
                        album: album.to_string(),
                        release_date: release_date.to_string(),
                        notified_at: now.to_rfc3339(),
                    });
                }
                doc
            })
            .await
            .map(|_| ())
    }

    /// [`rollover_at`](Self::rollover_at) for the current year.
    pub async fn rollover_if_year_changed(&self) -> Result<(), StoreError> {
        self.rollover_at(Local::now().year()).await
    }

    /// Makes sure the partition for `year` exists and, with pruning enabled,
    /// deletes partitions of earlier years. Safe to call repeatedly.
    pub async fn rollover_at(&self, year: i32) -> Result<(), StoreError> {
        let current = self.partition(year);
        if current.read_existing().await.is_none() {
            info!(year, "creating notification ledger partition");
            current.write(&LedgerDocument::default()).await?;
        }

        if self.prune_previous_years {
            for old in self.years().await.into_iter().filter(|y| *y < year) {
                info!(year = old, "pruning notification ledger partition");
                if let Err(e) = self.partition(old).remove().await {
                    warn!(year = old, error = %e, "cannot prune ledger partition");
                }
            }
        }
        Ok(())
    }

    pub async fn partition_exists(&self, year: i32) -> bool {
        self.partition(year).exists().await
    }

    /// Everything recorded for `year`, in insertion order.
    pub async fn entries(&self, year: i32) -> Vec<NotifiedAlbum> {
        self.partition(year).read().await.notified_albums
    }

    /// Years that have a partition file on disk, ascending.
    pub async fn years(&self) -> Vec<i32> {
        let mut years = Vec::new();
        let Ok(mut dir) = tokio::fs::read_dir(&self.data_dir).await else {
            return years;
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            if let Some(year) = entry.file_name().to_str().and_then(partition_year) {
                years.push(year);
            }
        }
        years.sort_unstable();
        years
    }
}
