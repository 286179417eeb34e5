use serde::{Deserialize, Serialize};
use tabled::Tabled;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub name: String,
    #[serde(rename = "id")]
    pub external_id: Option<String>,
    pub color: u32,
    #[serde(default)]
    pub backdrop: Option<String>,
    #[serde(default)]
    pub cover: Option<String>,
}

/// On-disk shape of `artists.json`.
///
/// Both fields are required; a document missing either one fails to parse and
/// is treated as absent by the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub artists: Vec<ArtistRecord>,
    pub last_updated: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifiedAlbum {
    pub artist: String,
    pub album: String,
    pub release_date: String,
    pub notified_at: String,
}

/// On-disk shape of one `notified_{year}.json` partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerDocument {
    #[serde(default)]
    pub notified_albums: Vec<NotifiedAlbum>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartupDocument {
    #[serde(default)]
    pub initial_startup_complete: bool,
    #[serde(default)]
    pub first_startup_time: Option<String>,
}

/// An artist directory found in the music library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtistDirectory {
    pub name: String,
    pub backdrop: Option<String>,
    pub cover: Option<String>,
}

impl ArtistDirectory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistSearchResponse {
    #[serde(default)]
    pub artists: Vec<ArtistMatch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistMatch {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub score: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseGroupResponse {
    #[serde(rename = "release-groups", default)]
    pub release_groups: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseGroup {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(rename = "first-release-date", default)]
    pub first_release_date: String,
    #[serde(rename = "primary-type", default)]
    pub primary_type: Option<String>,
}

/// Payload handed to the notification transport for one new release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseNotice {
    pub artist: String,
    pub title: String,
    pub release_date: String,
}

#[derive(Tabled)]
pub struct ArtistTableRow {
    pub name: String,
    pub id: String,
    pub color: String,
}

#[derive(Tabled)]
pub struct ReleaseTableRow {
    pub date: String,
    pub artist: String,
    pub album: String,
    pub notified: String,
}
