//! # CLI Module
//!
//! Command implementations behind the `trackly` binary. Each command builds
//! the components it needs from the [`Config`] and reports to the terminal
//! with the colored output macros; structured logs go through `tracing`.
//!
//! - [`run`] - startup sequence, then scans on the configured cron schedule
//! - [`scan`] - a single scan pass right now
//! - [`list_artists`] / [`update_artists`] - show or rebuild the artist catalog
//! - [`list_releases`] - show the releases already announced in a year

mod artists;
mod releases;
mod run;

use tokio::sync::watch;

use crate::{
    Res,
    config::Config,
    library::FsLibrary,
    management::{ArtistCatalog, NotificationLedger},
    musicbrainz::MusicBrainzClient,
    notify::DiscordWebhook,
    scanner::ReleaseScanner,
};

pub use artists::{list_artists, update_artists};
pub use releases::list_releases;
pub use run::{run, scan};

pub type AppScanner = ReleaseScanner<MusicBrainzClient, DiscordWebhook, FsLibrary>;

/// Wires the production components together.
pub fn build_scanner(config: &Config) -> Res<AppScanner> {
    let source = MusicBrainzClient::new(&config.musicbrainz_url, &config.user_agent)?
        .with_timeout(config.request_timeout);
    let notifier = DiscordWebhook::new(&config.discord_webhook, config.discord_role.clone())?;
    let library = FsLibrary::new(&config.music_dir);
    let catalog = ArtistCatalog::in_dir(&config.data_dir);
    let ledger = NotificationLedger::new(&config.data_dir).with_pruning(config.prune_old_ledgers);

    Ok(ReleaseScanner::new(
        source,
        notifier,
        library,
        catalog,
        ledger,
        config.scan_settings(),
    ))
}

/// Channel flipped to `true` on Ctrl-C.
pub fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(true);
        }
    });
    rx
}
