use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone};
use rand::Rng;
use tracing::{info, warn};

use crate::{
    management::{JsonStore, StoreError},
    musicbrainz::LookupError,
    types::{ArtistDirectory, ArtistRecord, CatalogDocument},
};

/// A catalog older than this must be rebuilt before use.
pub const STALE_AFTER_DAYS: i64 = 7;

pub const CATALOG_FILE: &str = "artists.json";

/// Looks up the external id for an artist name during a rebuild.
#[async_trait]
pub trait IdResolver: Send {
    async fn resolve(&mut self, name: &str) -> Result<Option<String>, LookupError>;
}

/// The `artists.json` document: every library artist with its MusicBrainz
/// id, display color and artwork.
///
/// The catalog is rebuilt from scratch once it is older than
/// [`STALE_AFTER_DAYS`] or cannot be read.
pub struct ArtistCatalog {
    store: JsonStore<CatalogDocument>,
}

impl ArtistCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            store: JsonStore::new(path),
        }
    }

    /// Catalog at `<data_dir>/artists.json`.
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self::new(data_dir.into().join(CATALOG_FILE))
    }

    pub fn store(&self) -> &JsonStore<CatalogDocument> {
        &self.store
    }

    /// Whether the file is present, even if it does not parse.
    pub async fn exists(&self) -> bool {
        self.store.exists().await
    }

    pub async fn is_valid(&self) -> bool {
        self.is_valid_at(Local::now()).await
    }

    /// Whether the catalog can be used at `now`.
    ///
    /// # Returns
    ///
    /// `false` when the file is missing or malformed, when `last_updated`
    /// does not parse, or when it is more than [`STALE_AFTER_DAYS`] days
    /// before `now`. Exactly seven days old is still valid.
    pub async fn is_valid_at(&self, now: DateTime<Local>) -> bool {
        let Some(document) = self.store.read_existing().await else {
            info!(path = %self.store.path().display(), "catalog missing or malformed");
            return false;
        };

        let Some(last_updated) = parse_timestamp(&document.last_updated) else {
            warn!(value = %document.last_updated, "catalog has an invalid last_updated timestamp");
            return false;
        };

        if now.signed_duration_since(last_updated) > Duration::days(STALE_AFTER_DAYS) {
            info!(days = STALE_AFTER_DAYS, "catalog is stale");
            return false;
        }

        info!(artists = document.artists.len(), "catalog validated");
        true
    }

    pub async fn artists(&self) -> Option<Vec<ArtistRecord>> {
        self.store.read_existing().await.map(|d| d.artists)
    }

    pub async fn document(&self) -> Option<CatalogDocument> {
        self.store.read_existing().await
    }

    /// Resolves every directory from scratch and replaces the catalog.
    ///
    /// Lookup failures keep the artist with no id.
    pub async fn rebuild<R>(
        &self,
        directories: &[ArtistDirectory],
        resolver: &mut R,
    ) -> Result<Vec<ArtistRecord>, StoreError>
    where
        R: IdResolver + ?Sized,
    {
        self.rebuild_at(directories, resolver, Local::now()).await
    }

    /// [`rebuild`](Self::rebuild) stamped with `now`.
    ///
    /// # Arguments
    ///
    /// * `directories` - Artist directories in library order; catalog order follows it
    /// * `resolver` - Id lookup, called once per directory
    /// * `now` - Written as `last_updated`
    ///
    /// # Returns
    ///
    /// The new artist records, or `StoreError` if the file could not be
    /// written. Colors are drawn fresh on every rebuild.
    pub async fn rebuild_at<R>(
        &self,
        directories: &[ArtistDirectory],
        resolver: &mut R,
        now: DateTime<Local>,
    ) -> Result<Vec<ArtistRecord>, StoreError>
    where
        R: IdResolver + ?Sized,
    {
        info!(directories = directories.len(), "rebuilding artist catalog");
        let mut artists = Vec::with_capacity(directories.len());

        for dir in directories {
            let external_id = match resolver.resolve(&dir.name).await {
                Ok(Some(id)) => Some(id),
                Ok(None) => {
                    warn!(artist = %dir.name, "could not find MusicBrainz id");
                    None
                }
                Err(e) => {
                    warn!(artist = %dir.name, error = %e, "MusicBrainz id lookup failed");
                    None
                }
            };

            artists.push(ArtistRecord {
                name: dir.name.clone(),
                external_id,
                color: vibrant_color(&mut rand::rng()),
                backdrop: dir.backdrop.clone(),
                cover: dir.cover.clone(),
            });
        }

        let document = CatalogDocument {
            artists,
            last_updated: now.to_rfc3339(),
        };
        self.store.write(&document).await?;
        info!(artists = document.artists.len(), "artist catalog written");
        Ok(document.artists)
    }
}

/// Accepts RFC 3339 as well as naive ISO timestamps, which are taken as local time.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Local>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Local));
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local.from_local_datetime(&naive).earliest()
}

/// Random saturated, bright color packed as `0xRRGGBB`.
pub fn vibrant_color<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    let hue = rng.random::<f64>();
    let saturation = rng.random_range(0.7..=1.0);
    let value = rng.random_range(0.8..=1.0);
    let (r, g, b) = hsv_to_rgb(hue, saturation, value);
    pack_rgb(r, g, b)
}

pub fn pack_rgb(r: f64, g: f64, b: f64) -> u32 {
    let channel = |c: f64| (c.clamp(0.0, 1.0) * 255.0) as u32;
    channel(r) << 16 | channel(g) << 8 | channel(b)
}

/// HSV to RGB, all components in `[0, 1]`.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}
