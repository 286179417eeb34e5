//! Local music library access.
//!
//! The library is laid out as `<root>/<artist>/<album>`. The scanner only
//! needs the artist directories (to build the catalog) and a presence check
//! for an album directory, which counts as proof the release is already
//! handled.

use std::{
    io,
    path::{Component, Path, PathBuf},
};

use async_trait::async_trait;
use tracing::warn;

use crate::types::ArtistDirectory;

const IMAGE_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".jpeg", ".webp"];

#[async_trait]
pub trait LocalLibrary: Send + Sync {
    /// Every artist directory directly under the library root.
    async fn artist_directories(&self) -> io::Result<Vec<ArtistDirectory>>;

    /// Whether `<root>/<artist>/<album>` is present.
    async fn release_exists(&self, artist: &str, album: &str) -> bool;
}

/// [`LocalLibrary`] backed by a directory tree.
#[derive(Debug, Clone)]
pub struct FsLibrary {
    root: PathBuf,
}

impl FsLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of an album directory inside the library.
    ///
    /// Names come from MusicBrainz and are not trusted, so each must be a
    /// single plain path component.
    ///
    /// # Arguments
    ///
    /// * `artist` - Artist directory name
    /// * `album` - Album title as published
    ///
    /// # Returns
    ///
    /// * `Some(path)` - `<root>/<artist>/<album>`
    /// * `None` - Either name is empty, `.`, `..`, absolute or contains a separator
    ///
    /// # Example
    ///
    /// ```rust
    /// let library = FsLibrary::new("/music");
    /// assert_eq!(library.release_path("Autechre", "Exai"), Some("/music/Autechre/Exai".into()));
    /// assert_eq!(library.release_path("Autechre", "../../etc"), None);
    /// ```
    pub fn release_path(&self, artist: &str, album: &str) -> Option<PathBuf> {
        if is_single_component(artist) && is_single_component(album) {
            Some(self.root.join(artist).join(album))
        } else {
            None
        }
    }

    async fn file_names(dir: &PathBuf) -> Vec<String> {
        let mut names = Vec::new();
        let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
            return names;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        names
    }

    async fn artwork(&self, artist_dir: &PathBuf) -> (Option<String>, Option<String>) {
        let names = Self::file_names(artist_dir).await;
        let as_path = |name: &str| artist_dir.join(name).to_string_lossy().into_owned();

        let backdrop = IMAGE_EXTENSIONS.iter().find_map(|ext| {
            names
                .iter()
                .find(|n| n.starts_with("backdrop") && n.ends_with(ext))
                .map(|n| as_path(n))
        });

        let cover = ["cover", "folder"].iter().find_map(|base| {
            IMAGE_EXTENSIONS.iter().find_map(|ext| {
                [ext.to_lowercase(), ext.to_uppercase()]
                    .iter()
                    .map(|e| format!("{base}{e}"))
                    .find(|candidate| names.contains(candidate))
                    .map(|n| as_path(&n))
            })
        });

        (backdrop, cover)
    }
}

#[async_trait]
impl LocalLibrary for FsLibrary {
    /// Artist directories in listing order (sorted by name for stability).
    async fn artist_directories(&self) -> io::Result<Vec<ArtistDirectory>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();

        let mut directories = Vec::with_capacity(names.len());
        for name in names {
            let (backdrop, cover) = self.artwork(&self.root.join(&name)).await;
            directories.push(ArtistDirectory {
                name,
                backdrop,
                cover,
            });
        }
        Ok(directories)
    }

    async fn release_exists(&self, artist: &str, album: &str) -> bool {
        let Some(path) = self.release_path(artist, album) else {
            warn!(artist, album, "name is not a plain directory name, treating release as absent");
            return false;
        };
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name
    )
}
