use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, TimeZone};
use trackly::{
    management::{
        ArtistCatalog, IdResolver, STALE_AFTER_DAYS, hsv_to_rgb, pack_rgb, parse_timestamp,
        vibrant_color,
    },
    musicbrainz::LookupError,
    types::{ArtistDirectory, CatalogDocument},
};

struct MapResolver {
    ids: HashMap<String, String>,
    failing: Vec<String>,
    calls: Vec<String>,
}

impl MapResolver {
    fn new(ids: &[(&str, &str)], failing: &[&str]) -> Self {
        Self {
            ids: ids
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            failing: failing.iter().map(|s| s.to_string()).collect(),
            calls: Vec::new(),
        }
    }
}

#[async_trait]
impl IdResolver for MapResolver {
    async fn resolve(&mut self, name: &str) -> Result<Option<String>, LookupError> {
        self.calls.push(name.to_string());
        if self.failing.iter().any(|f| f == name) {
            return Err(LookupError::RetriesExhausted {
                attempts: 3,
                last: "rate limited".to_string(),
            });
        }
        Ok(self.ids.get(name).cloned())
    }
}

// Helper function to get a fixed point in time
fn fixed_now() -> DateTime<Local> {
    Local.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

async fn write_catalog(catalog: &ArtistCatalog, last_updated: String) {
    catalog
        .store()
        .write(&CatalogDocument {
            artists: Vec::new(),
            last_updated,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_missing_catalog_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = ArtistCatalog::in_dir(dir.path());

    assert!(!catalog.exists().await);
    assert!(!catalog.is_valid_at(fixed_now()).await);
    assert!(catalog.artists().await.is_none());
}

#[tokio::test]
async fn test_fresh_catalog_is_valid() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = ArtistCatalog::in_dir(dir.path());
    write_catalog(&catalog, fixed_now().to_rfc3339()).await;

    assert!(catalog.is_valid_at(fixed_now()).await);
}

#[tokio::test]
async fn test_catalog_just_inside_staleness_window_is_valid() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = ArtistCatalog::in_dir(dir.path());
    let updated = fixed_now() - Duration::days(STALE_AFTER_DAYS) + Duration::seconds(1);
    write_catalog(&catalog, updated.to_rfc3339()).await;

    assert!(catalog.is_valid_at(fixed_now()).await);
}

#[tokio::test]
async fn test_catalog_exactly_seven_days_old_is_valid() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = ArtistCatalog::in_dir(dir.path());
    let updated = fixed_now() - Duration::days(STALE_AFTER_DAYS);
    write_catalog(&catalog, updated.to_rfc3339()).await;

    assert!(catalog.is_valid_at(fixed_now()).await);
}

#[tokio::test]
async fn test_stale_catalog_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = ArtistCatalog::in_dir(dir.path());
    let updated = fixed_now() - Duration::days(STALE_AFTER_DAYS) - Duration::seconds(1);
    write_catalog(&catalog, updated.to_rfc3339()).await;

    assert!(!catalog.is_valid_at(fixed_now()).await);
}

#[tokio::test]
async fn test_catalog_with_bad_timestamp_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = ArtistCatalog::in_dir(dir.path());
    write_catalog(&catalog, "last tuesday".to_string()).await;

    assert!(!catalog.is_valid_at(fixed_now()).await);
}

#[tokio::test]
async fn test_catalog_missing_fields_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("artists.json"), r#"{"artists": []}"#).unwrap();
    let catalog = ArtistCatalog::in_dir(dir.path());

    assert!(!catalog.is_valid_at(fixed_now()).await);
}

#[tokio::test]
async fn test_malformed_catalog_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("artists.json"), "[1, 2, 3").unwrap();
    let catalog = ArtistCatalog::in_dir(dir.path());

    assert!(!catalog.is_valid_at(fixed_now()).await);
    assert!(catalog.artists().await.is_none());
}

#[tokio::test]
async fn test_catalog_with_naive_timestamp_is_valid() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = ArtistCatalog::in_dir(dir.path());
    let naive = (fixed_now() - Duration::days(1))
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string();
    write_catalog(&catalog, naive).await;

    assert!(catalog.is_valid_at(fixed_now()).await);
}

#[tokio::test]
async fn test_catalog_reads_null_id() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("artists.json"),
        r#"{
            "artists": [
                {"name": "Boards of Canada", "id": "abc123", "color": 3368601},
                {"name": "Unknown Band", "id": null, "color": 16711680}
            ],
            "last_updated": "2024-06-14T12:00:00+00:00"
        }"#,
    )
    .unwrap();
    let catalog = ArtistCatalog::in_dir(dir.path());

    let artists = catalog.artists().await.unwrap();
    assert_eq!(artists.len(), 2);
    assert_eq!(artists[0].external_id.as_deref(), Some("abc123"));
    assert_eq!(artists[1].external_id, None);
    assert_eq!(artists[1].color, 0xFF0000);
}

#[tokio::test]
async fn test_rebuild_keeps_every_directory() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = ArtistCatalog::in_dir(dir.path());
    let directories = vec![
        ArtistDirectory::new("Boards of Canada"),
        ArtistDirectory::new("Unknown Band"),
        ArtistDirectory::new("Flaky Band"),
    ];
    let mut resolver = MapResolver::new(&[("Boards of Canada", "abc123")], &["Flaky Band"]);

    let artists = catalog
        .rebuild_at(&directories, &mut resolver, fixed_now())
        .await
        .unwrap();

    assert_eq!(resolver.calls.len(), 3);
    assert_eq!(artists.len(), 3);
    assert_eq!(artists[0].name, "Boards of Canada");
    assert_eq!(artists[0].external_id.as_deref(), Some("abc123"));
    assert_eq!(artists[1].external_id, None);
    assert_eq!(artists[2].external_id, None);
    assert!(artists.iter().all(|a| a.color <= 0xFFFFFF));

    let document = catalog.document().await.unwrap();
    assert_eq!(document.artists, artists);
    assert_eq!(parse_timestamp(&document.last_updated), Some(fixed_now()));
    assert!(catalog.is_valid_at(fixed_now()).await);
}

#[tokio::test]
async fn test_rebuild_writes_null_for_unresolved() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = ArtistCatalog::in_dir(dir.path());
    let mut resolver = MapResolver::new(&[], &[]);

    catalog
        .rebuild_at(&[ArtistDirectory::new("Unknown Band")], &mut resolver, fixed_now())
        .await
        .unwrap();

    let raw = std::fs::read_to_string(dir.path().join("artists.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(value["artists"][0]["id"].is_null());
    assert_eq!(value["artists"][0]["name"], "Unknown Band");
    assert!(value["artists"][0]["color"].is_u64());
    assert!(value["last_updated"].is_string());
}

#[tokio::test]
async fn test_rebuild_replaces_previous_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = ArtistCatalog::in_dir(dir.path());
    let mut resolver = MapResolver::new(&[("Autechre", "def456")], &[]);

    catalog
        .rebuild_at(&[ArtistDirectory::new("Old Artist")], &mut resolver, fixed_now())
        .await
        .unwrap();
    catalog
        .rebuild_at(&[ArtistDirectory::new("Autechre")], &mut resolver, fixed_now())
        .await
        .unwrap();

    let artists = catalog.artists().await.unwrap();
    assert_eq!(artists.len(), 1);
    assert_eq!(artists[0].name, "Autechre");
}

#[tokio::test]
async fn test_rebuild_keeps_artwork_paths() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = ArtistCatalog::in_dir(dir.path());
    let mut resolver = MapResolver::new(&[], &[]);
    let directories = vec![ArtistDirectory {
        name: "Autechre".to_string(),
        backdrop: Some("/music/Autechre/backdrop.jpg".to_string()),
        cover: Some("/music/Autechre/cover.png".to_string()),
    }];

    let artists = catalog
        .rebuild_at(&directories, &mut resolver, fixed_now())
        .await
        .unwrap();

    assert_eq!(artists[0].backdrop.as_deref(), Some("/music/Autechre/backdrop.jpg"));
    assert_eq!(artists[0].cover.as_deref(), Some("/music/Autechre/cover.png"));
}

#[test]
fn test_parse_timestamp_rfc3339() {
    let parsed = parse_timestamp("2024-06-15T12:00:00+00:00").unwrap();
    assert_eq!(parsed.timestamp(), 1718452800);
}

#[test]
fn test_parse_timestamp_naive_is_local() {
    let parsed = parse_timestamp("2024-06-15T12:00:00.123456").unwrap();
    assert_eq!(parsed.naive_local().format("%H:%M:%S").to_string(), "12:00:00");
}

#[test]
fn test_parse_timestamp_rejects_garbage() {
    assert!(parse_timestamp("").is_none());
    assert!(parse_timestamp("2024-06-15").is_none());
    assert!(parse_timestamp("yesterday").is_none());
}

#[test]
fn test_hsv_to_rgb_primaries() {
    let (r, g, b) = hsv_to_rgb(0.0, 1.0, 1.0);
    assert_eq!(pack_rgb(r, g, b), 0xFF0000);
    let (r, g, b) = hsv_to_rgb(0.5, 1.0, 1.0);
    assert_eq!(pack_rgb(r, g, b), 0x00FFFF);
}

#[test]
fn test_hsv_to_rgb_grey_without_saturation() {
    assert_eq!(hsv_to_rgb(0.3, 0.0, 0.5), (0.5, 0.5, 0.5));
}

#[test]
fn test_pack_rgb_clamps() {
    assert_eq!(pack_rgb(2.0, -1.0, 1.0), 0xFF00FF);
}

#[test]
fn test_vibrant_color_is_bright_and_saturated() {
    let mut rng = rand::rng();
    for _ in 0..500 {
        let color = vibrant_color(&mut rng);
        assert!(color <= 0xFFFFFF);

        let channels = [(color >> 16) & 0xFF, (color >> 8) & 0xFF, color & 0xFF];
        let max = *channels.iter().max().unwrap();
        let min = *channels.iter().min().unwrap();
        // value >= 0.8, saturation >= 0.7
        assert!(max >= 203, "too dark: {color:06X}");
        assert!(min as f64 <= max as f64 * 0.3 + 1.0, "too pale: {color:06X}");
    }
}
