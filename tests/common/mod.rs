#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    io,
    path::Path,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};

use trackly::{
    library::LocalLibrary,
    management::{ArtistCatalog, NotificationLedger},
    musicbrainz::{LookupError, PacerSettings, ReleaseSource, RequestPacer},
    notify::{Notifier, NotifyError},
    scanner::{ReleaseScanner, ScanSettings},
    types::{ArtistDirectory, ArtistRecord, CatalogDocument, ReleaseGroup, ReleaseNotice},
};

pub type TestScanner = ReleaseScanner<FakeSource, FakeNotifier, FakeLibrary>;

// Helper function to build a local timestamp
pub fn at(year: i32, month: u32, day: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

pub fn release_group(title: &str, date: &str) -> ReleaseGroup {
    ReleaseGroup {
        id: None,
        title: title.to_string(),
        first_release_date: date.to_string(),
        primary_type: Some("Album".to_string()),
    }
}

pub fn artist(name: &str, id: Option<&str>) -> ArtistRecord {
    ArtistRecord {
        name: name.to_string(),
        external_id: id.map(str::to_string),
        color: 0x336699,
        backdrop: None,
        cover: None,
    }
}

#[derive(Default)]
pub struct FakeSource {
    pub ids: HashMap<String, String>,
    pub groups: HashMap<String, Vec<ReleaseGroup>>,
    pub failing: HashSet<String>,
    pub resolved: Mutex<Vec<String>>,
    pub queried: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn with_id(mut self, name: &str, id: &str) -> Self {
        self.ids.insert(name.to_string(), id.to_string());
        self
    }

    pub fn with_groups(mut self, id: &str, groups: Vec<ReleaseGroup>) -> Self {
        self.groups.insert(id.to_string(), groups);
        self
    }

    pub fn failing_for(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().unwrap().clone()
    }

    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReleaseSource for FakeSource {
    async fn resolve_artist_id(
        &self,
        name: &str,
        pacer: &mut RequestPacer,
    ) -> Result<Option<String>, LookupError> {
        pacer.wait().await;
        self.resolved.lock().unwrap().push(name.to_string());
        if self.failing.contains(name) {
            return Err(LookupError::RetriesExhausted {
                attempts: 3,
                last: "unexpected status 500".to_string(),
            });
        }
        Ok(self.ids.get(name).cloned())
    }

    async fn release_groups(
        &self,
        artist_id: &str,
        _limit: u32,
        pacer: &mut RequestPacer,
    ) -> Result<Vec<ReleaseGroup>, LookupError> {
        pacer.wait().await;
        self.queried.lock().unwrap().push(artist_id.to_string());
        if self.failing.contains(artist_id) {
            return Err(LookupError::RetriesExhausted {
                attempts: 3,
                last: "rate limited (503 Service Unavailable)".to_string(),
            });
        }
        Ok(self.groups.get(artist_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub fail: bool,
    pub sent: Mutex<Vec<ReleaseNotice>>,
    pub empty_scans: AtomicUsize,
    pub startups: AtomicUsize,
}

impl FakeNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<ReleaseNotice> {
        self.sent.lock().unwrap().clone()
    }

    pub fn empty_scans(&self) -> usize {
        self.empty_scans.load(Ordering::SeqCst)
    }

    pub fn startups(&self) -> usize {
        self.startups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify_release(
        &self,
        notice: &ReleaseNotice,
        _color: Option<u32>,
    ) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notice.clone());
        if self.fail {
            return Err(NotifyError::Rejected(500));
        }
        Ok(())
    }

    async fn notify_scan_empty(&self) -> Result<(), NotifyError> {
        self.empty_scans.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn notify_startup(&self) -> Result<(), NotifyError> {
        self.startups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeLibrary {
    pub directories: Vec<ArtistDirectory>,
    pub existing: HashSet<(String, String)>,
    pub broken: bool,
}

impl FakeLibrary {
    pub fn with_directory(mut self, name: &str) -> Self {
        self.directories.push(ArtistDirectory::new(name));
        self
    }

    pub fn with_release(mut self, artist: &str, album: &str) -> Self {
        self.existing
            .insert((artist.to_string(), album.to_string()));
        self
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl LocalLibrary for FakeLibrary {
    async fn artist_directories(&self) -> io::Result<Vec<ArtistDirectory>> {
        if self.broken {
            return Err(io::Error::new(io::ErrorKind::NotFound, "music directory missing"));
        }
        Ok(self.directories.clone())
    }

    async fn release_exists(&self, artist: &str, album: &str) -> bool {
        self.existing
            .contains(&(artist.to_string(), album.to_string()))
    }
}

pub fn quiet_settings() -> ScanSettings {
    ScanSettings {
        release_limit: 25,
        notify_cooldown: Duration::ZERO,
        notify_on_empty: false,
        pacer: PacerSettings::immediate(),
    }
}

pub fn scanner_in(
    dir: &Path,
    source: FakeSource,
    notifier: FakeNotifier,
    library: FakeLibrary,
    settings: ScanSettings,
) -> TestScanner {
    ReleaseScanner::new(
        source,
        notifier,
        library,
        ArtistCatalog::in_dir(dir),
        NotificationLedger::new(dir),
        settings,
    )
}

// Helper function to seed a fresh catalog as of `now`
pub async fn seed_catalog(scanner: &TestScanner, artists: Vec<ArtistRecord>, now: DateTime<Local>) {
    scanner
        .catalog()
        .store()
        .write(&CatalogDocument {
            artists,
            last_updated: now.to_rfc3339(),
        })
        .await
        .unwrap();
}
