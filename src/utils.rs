use std::cmp::Ordering;

use crate::types::{ArtistRecord, ArtistTableRow, NotifiedAlbum, ReleaseTableRow};

/// Lexical check that `release_date` starts with the four-digit `year`.
///
/// Dates are not parsed: anything whose text begins with the year matches.
pub fn is_release_in_year(release_date: &str, year: i32) -> bool {
    release_date.starts_with(&year.to_string())
}

/// `0x9B59B6` becomes `#9B59B6`.
pub fn format_color(color: u32) -> String {
    format!("#{color:06X}")
}

/// Case-insensitive substring search on artist names.
pub fn filter_artists(artists: Vec<ArtistRecord>, search: Option<&str>) -> Vec<ArtistRecord> {
    match search.map(str::to_lowercase) {
        Some(needle) => artists
            .into_iter()
            .filter(|a| a.name.to_lowercase().contains(&needle))
            .collect(),
        None => artists,
    }
}

pub fn artist_rows(artists: &[ArtistRecord]) -> Vec<ArtistTableRow> {
    artists
        .iter()
        .map(|a| ArtistTableRow {
            name: a.name.clone(),
            id: a.external_id.clone().unwrap_or_else(|| "-".to_string()),
            color: format_color(a.color),
        })
        .collect()
}

pub fn release_rows(albums: &[NotifiedAlbum]) -> Vec<ReleaseTableRow> {
    let mut rows: Vec<ReleaseTableRow> = albums
        .iter()
        .map(|n| ReleaseTableRow {
            date: n.release_date.clone(),
            artist: n.artist.clone(),
            album: n.album.clone(),
            notified: n.notified_at.clone(),
        })
        .collect();
    sort_release_table_rows(&mut rows);
    rows
}

/// Newest release first, then artist name ascending.
pub fn sort_release_table_rows(rows: &mut [ReleaseTableRow]) {
    rows.sort_by(|a, b| match b.date.cmp(&a.date) {
        Ordering::Equal => a.artist.cmp(&b.artist),
        other => other,
    });
}
