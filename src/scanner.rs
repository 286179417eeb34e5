//! One release scan pass.
//!
//! A pass makes sure the artist catalog is fresh, rolls the notification
//! ledger over to the current year and then checks every artist, in catalog
//! order, for album release groups first released this year. A release is new
//! when there is no album directory for it in the library and the ledger has
//! not seen it this year.
//!
//! New releases are recorded in the ledger *before* they are handed to the
//! notifier. A failed delivery is therefore never retried on a later pass:
//! duplicates are avoided at the cost of possibly losing a notification.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local};
use tokio::{sync::watch, time::sleep};
use tracing::{error, info, warn};

use crate::{
    library::LocalLibrary,
    management::{ArtistCatalog, IdResolver, NotificationLedger, StoreError},
    musicbrainz::{LookupError, PacerSettings, ReleaseSource, RequestPacer},
    notify::Notifier,
    types::{ArtistRecord, ReleaseGroup, ReleaseNotice},
    utils,
};

/// Release groups requested per artist.
pub const DEFAULT_RELEASE_LIMIT: u32 = 25;
pub const DEFAULT_NOTIFY_COOLDOWN: Duration = Duration::from_secs(480);

/// Failures that abort a pass, or a single artist within one.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("cannot list artist directories: {0}")]
    Library(#[from] std::io::Error),
    #[error("cannot persist scan state: {0}")]
    Store(#[from] StoreError),
    #[error("release lookup failed: {0}")]
    Lookup(#[from] LookupError),
    #[error("artist catalog is unreadable after rebuild")]
    CatalogUnavailable,
}

/// Knobs for a [`ReleaseScanner`], usually taken from
/// [`Config::scan_settings`](crate::config::Config::scan_settings).
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub release_limit: u32,
    /// Pause after each delivered notification.
    pub notify_cooldown: Duration,
    /// Send a single "nothing new" notification when a pass finds nothing.
    pub notify_on_empty: bool,
    pub pacer: PacerSettings,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            release_limit: DEFAULT_RELEASE_LIMIT,
            notify_cooldown: DEFAULT_NOTIFY_COOLDOWN,
            notify_on_empty: false,
            pacer: PacerSettings::default(),
        }
    }
}

/// Counters for one finished (or interrupted) pass.
///
/// `new_releases` counts every release recorded in the ledger, `delivered`
/// only those the notifier accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub catalog_rebuilt: bool,
    pub artists_checked: usize,
    pub artists_skipped: usize,
    pub artists_failed: usize,
    pub new_releases: usize,
    pub delivered: usize,
    pub interrupted: bool,
}

/// Resolves ids through the scan's shared pacer.
pub struct PacedResolver<'a, S: ?Sized> {
    source: &'a S,
    pacer: &'a mut RequestPacer,
}

impl<'a, S: ReleaseSource + ?Sized> PacedResolver<'a, S> {
    pub fn new(source: &'a S, pacer: &'a mut RequestPacer) -> Self {
        Self { source, pacer }
    }
}

#[async_trait]
impl<S: ReleaseSource + ?Sized> IdResolver for PacedResolver<'_, S> {
    async fn resolve(&mut self, name: &str) -> Result<Option<String>, LookupError> {
        self.source.resolve_artist_id(name, &mut *self.pacer).await
    }
}

/// Runs scan passes over a library.
///
/// Generic over the release source, notifier and library so the pass logic
/// can be driven by fakes in tests. The production wiring lives in
/// [`build_scanner`](crate::cli::build_scanner).
pub struct ReleaseScanner<S, N, L> {
    source: S,
    notifier: N,
    library: L,
    catalog: ArtistCatalog,
    ledger: NotificationLedger,
    settings: ScanSettings,
}

impl<S, N, L> ReleaseScanner<S, N, L>
where
    S: ReleaseSource,
    N: Notifier,
    L: LocalLibrary,
{
    pub fn new(
        source: S,
        notifier: N,
        library: L,
        catalog: ArtistCatalog,
        ledger: NotificationLedger,
        settings: ScanSettings,
    ) -> Self {
        Self {
            source,
            notifier,
            library,
            catalog,
            ledger,
            settings,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn catalog(&self) -> &ArtistCatalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &NotificationLedger {
        &self.ledger
    }

    /// Re-resolves every artist directory and replaces the catalog.
    pub async fn rebuild_catalog(&self) -> Result<Vec<ArtistRecord>, ScanError> {
        let mut pacer = RequestPacer::new(self.settings.pacer.clone());
        self.rebuild_catalog_with(&mut pacer, Local::now()).await
    }

    async fn rebuild_catalog_with(
        &self,
        pacer: &mut RequestPacer,
        now: DateTime<Local>,
    ) -> Result<Vec<ArtistRecord>, ScanError> {
        let directories = self.library.artist_directories().await?;
        let mut resolver = PacedResolver::new(&self.source, pacer);
        let artists = self
            .catalog
            .rebuild_at(&directories, &mut resolver, now)
            .await?;
        Ok(artists)
    }

    /// Runs one pass now.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - Checked between artists; once `true` the pass stops
    ///   early and reports `interrupted`
    ///
    /// # Returns
    ///
    /// * `Ok(ScanReport)` - The pass ran; per-artist failures are counted, not returned
    /// * `Err(ScanError)` - The catalog could not be rebuilt or the ledger
    ///   could not be rolled over
    ///
    /// # Example
    ///
    /// ```rust
    /// let scanner = build_scanner(&config)?;
    /// let (_tx, shutdown) = watch::channel(false);
    /// let report = scanner.run_pass(&shutdown).await?;
    /// println!("{} new releases", report.new_releases);
    /// ```
    pub async fn run_pass(&self, shutdown: &watch::Receiver<bool>) -> Result<ScanReport, ScanError> {
        self.run_pass_at(Local::now(), shutdown).await
    }

    /// Runs one pass as if the current time were `now`.
    pub async fn run_pass_at(
        &self,
        now: DateTime<Local>,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<ScanReport, ScanError> {
        info!("starting release scan");
        let mut report = ScanReport::default();
        let mut pacer = RequestPacer::new(self.settings.pacer.clone());

        if !self.catalog.is_valid_at(now).await {
            info!("artist catalog missing or stale, rebuilding");
            if let Err(e) = self.rebuild_catalog_with(&mut pacer, now).await {
                error!(error = %e, "failed to rebuild artist catalog, aborting scan");
                return Err(e);
            }
            report.catalog_rebuilt = true;
        }

        let year = now.year();
        self.ledger.rollover_at(year).await?;

        let artists = self
            .catalog
            .artists()
            .await
            .ok_or(ScanError::CatalogUnavailable)?;
        info!(artists = artists.len(), year, "checking releases");

        for artist in &artists {
            if *shutdown.borrow() {
                info!("shutdown requested, stopping scan between artists");
                report.interrupted = true;
                break;
            }

            let Some(artist_id) = artist.external_id.as_deref() else {
                warn!(artist = %artist.name, "skipping artist without MusicBrainz id");
                report.artists_skipped += 1;
                continue;
            };

            match self.check_artist(artist, artist_id, now, &mut pacer).await {
                Ok(outcome) => {
                    report.artists_checked += 1;
                    report.new_releases += outcome.new_releases;
                    report.delivered += outcome.delivered;
                }
                Err(e) => {
                    error!(artist = %artist.name, error = %e, "error checking releases");
                    report.artists_failed += 1;
                }
            }
        }

        if self.settings.notify_on_empty && report.new_releases == 0 && !report.interrupted {
            if let Err(e) = self.notifier.notify_scan_empty().await {
                error!(error = %e, "failed to send scan completion notification");
            }
        }

        info!(
            checked = report.artists_checked,
            skipped = report.artists_skipped,
            failed = report.artists_failed,
            new_releases = report.new_releases,
            "completed release scan"
        );
        Ok(report)
    }

    /// Fetches one artist's release groups and processes each of them. A
    /// failing release is logged and does not stop the others.
    async fn check_artist(
        &self,
        artist: &ArtistRecord,
        artist_id: &str,
        now: DateTime<Local>,
        pacer: &mut RequestPacer,
    ) -> Result<ArtistOutcome, ScanError> {
        info!(artist = %artist.name, "checking releases for artist");
        let groups = self
            .source
            .release_groups(artist_id, self.settings.release_limit, pacer)
            .await?;

        let mut outcome = ArtistOutcome::default();

        for group in &groups {
            match self.process_release(artist, group, now).await {
                Ok(ReleaseDecision::Delivered) => {
                    outcome.new_releases += 1;
                    outcome.delivered += 1;
                }
                Ok(ReleaseDecision::DeliveryFailed) => outcome.new_releases += 1,
                Ok(ReleaseDecision::Skipped) => {}
                Err(e) => {
                    error!(artist = %artist.name, title = %group.title, error = %e, "error processing release");
                }
            }
        }
        Ok(outcome)
    }

    // filter, dedup, record, then notify
    async fn process_release(
        &self,
        artist: &ArtistRecord,
        group: &ReleaseGroup,
        now: DateTime<Local>,
    ) -> Result<ReleaseDecision, ScanError> {
        if !utils::is_release_in_year(&group.first_release_date, now.year()) {
            return Ok(ReleaseDecision::Skipped);
        }

        let album = group.title.as_str();
        if self.library.release_exists(&artist.name, album).await {
            info!(artist = %artist.name, album, "release already in library");
            return Ok(ReleaseDecision::Skipped);
        }
        if self.ledger.is_notified_in(now.year(), &artist.name, album).await {
            info!(artist = %artist.name, album, "release already notified");
            return Ok(ReleaseDecision::Skipped);
        }

        info!(artist = %artist.name, album, release_date = %group.first_release_date, "found new album");
        self.ledger
            .record_notified_at(now, &artist.name, album, &group.first_release_date)
            .await?;

        let notice = ReleaseNotice {
            artist: artist.name.clone(),
            title: group.title.clone(),
            release_date: group.first_release_date.clone(),
        };
        match self.notifier.notify_release(&notice, Some(artist.color)).await {
            Ok(()) => {
                info!(artist = %artist.name, album, "notification delivered");
                if !self.settings.notify_cooldown.is_zero() {
                    sleep(self.settings.notify_cooldown).await;
                }
                Ok(ReleaseDecision::Delivered)
            }
            Err(e) => {
                error!(artist = %artist.name, album, error = %e, "failed to send notification");
                Ok(ReleaseDecision::DeliveryFailed)
            }
        }
    }
}

#[derive(Debug, Default)]
struct ArtistOutcome {
    new_releases: usize,
    delivered: usize,
}

enum ReleaseDecision {
    Skipped,
    Delivered,
    DeliveryFailed,
}
