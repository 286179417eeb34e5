use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tabled::Table;

use crate::{
    cli::build_scanner, config::Config, error, info, management::ArtistCatalog, success, utils,
    warning,
};

/// Prints the artist catalog as a table.
///
/// # Arguments
///
/// * `config` - Provides the data directory
/// * `search` - Optional case-insensitive name filter
///
/// Warns instead of failing when the catalog is missing, unreadable or stale.
pub async fn list_artists(config: Config, search: Option<String>) {
    let catalog = ArtistCatalog::in_dir(&config.data_dir);
    let Some(artists) = catalog.artists().await else {
        if catalog.exists().await {
            warning!(
                "Artist catalog at {} is unreadable. Run trackly artists update.",
                catalog.store().path().display()
            );
        } else {
            warning!("No artist catalog found. Run trackly artists update.");
        }
        return;
    };

    if !catalog.is_valid().await {
        warning!("Artist catalog is stale. Run trackly artists update.");
    }

    let total = artists.len();
    let artists = utils::filter_artists(artists, search.as_deref());
    if artists.is_empty() {
        info!("No artists found");
        return;
    }

    let unresolved = artists.iter().filter(|a| a.external_id.is_none()).count();
    println!("{}", Table::new(utils::artist_rows(&artists)));
    info!(
        "{} of {} artists shown, {} without MusicBrainz id",
        artists.len(),
        total,
        unresolved
    );
}

/// Forces a catalog rebuild from the music directory.
pub async fn update_artists(config: Config) {
    let scanner = match build_scanner(&config) {
        Ok(scanner) => scanner,
        Err(e) => error!("Cannot set up scanner: {}", e),
    };

    let pb = ProgressBar::new_spinner();
    pb.set_message(format!(
        "Resolving artists in {}...",
        config.music_dir.display()
    ));
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }

    let result = scanner.rebuild_catalog().await;
    pb.finish_and_clear();

    match result {
        Ok(artists) => {
            let unresolved = artists.iter().filter(|a| a.external_id.is_none()).count();
            if unresolved > 0 {
                warning!("{} artists have no MusicBrainz id", unresolved);
            }
            success!("Updated {} artists", artists.len());
        }
        Err(e) => error!("Failed to update artist catalog: {}", e),
    }
}
