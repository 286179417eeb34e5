//! Configuration management for Trackly.
//!
//! Settings come from environment variables, optionally seeded from `.env`
//! files. They are read once at startup into a [`Config`] value that is then
//! passed to the components that need it; nothing reads the environment
//! after that.
//!
//! Lookup order:
//! 1. Environment variables (highest priority)
//! 2. `.env` in the working directory
//! 3. `.env` in the local data directory (`<data_local_dir>/trackly/.env`)
//! 4. Defaults (for optional settings)

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use crate::{
    musicbrainz::{
        DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT, PacerSettings, REQUESTS_PER_SECOND,
        default_user_agent,
    },
    scanner::{DEFAULT_NOTIFY_COOLDOWN, DEFAULT_RELEASE_LIMIT, ScanSettings},
};

pub const DEFAULT_MUSIC_DIR: &str = "/music";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {0}")]
    Missing(String),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

/// Loads `.env` files into the process environment.
///
/// Creates the local data directory if needed. Missing `.env` files are not
/// an error; variables already set in the environment are never overridden.
///
/// # Directory Structure
///
/// - Linux: `~/.local/share/trackly/.env`
/// - macOS: `~/Library/Application Support/trackly/.env`
/// - Windows: `%LOCALAPPDATA%/trackly/.env`
pub async fn load_env() -> Result<(), String> {
    dotenv::dotenv().ok();

    let mut path = default_data_dir();
    path.push(".env");
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent)
            .await
            .map_err(|e| e.to_string())?;
    }

    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// `<data_local_dir>/trackly`, or `./trackly` when the platform has none.
pub fn default_data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("trackly");
    path
}

/// Everything Trackly reads from the environment.
///
/// Required: `UPDATE_INTERVAL` and `DISCORD_WEBHOOK`. Every other field has
/// a default, see [`Config::from_lookup`].
#[derive(Debug, Clone)]
pub struct Config {
    pub music_dir: PathBuf,
    pub data_dir: PathBuf,
    /// Cron expression for recurring scans.
    pub update_interval: String,
    pub discord_webhook: String,
    pub discord_role: Option<String>,
    pub notify_on_scan: bool,
    pub scan_on_startup: bool,
    pub prune_old_ledgers: bool,
    pub musicbrainz_url: String,
    pub user_agent: String,
    pub release_limit: u32,
    pub notify_cooldown: Duration,
    /// Per-request timeout for the MusicBrainz client.
    pub request_timeout: Duration,
    pub pacer: PacerSettings,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// Call [`load_env`] first so `.env` files are taken into account.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    ///
    /// Blank values count as unset.
    ///
    /// # Arguments
    ///
    /// * `lookup` - Returns the raw value for a variable name, if any
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - All required keys present and every value parsed
    /// * `Err(ConfigError::Missing)` - Lists every missing required key
    /// * `Err(ConfigError::Invalid)` - The first value that failed to parse
    ///
    /// # Defaults
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `MUSIC_DIR` | `/music` |
    /// | `DATA_DIR` | [`default_data_dir`] |
    /// | `NOTIFY_ON_SCAN` / `SCAN_ON_STARTUP` / `PRUNE_OLD_LEDGERS` | `false` / `true` / `false` |
    /// | `MUSICBRAINZ_URL` | `https://musicbrainz.org/ws/2` |
    /// | `RELEASE_LIMIT` | `25` |
    /// | `NOTIFY_COOLDOWN_SECS` | `480` |
    /// | `REQUEST_TIMEOUT_SECS` | `30` |
    /// | `REQUEST_MIN_DELAY_MS` / `REQUEST_MAX_DELAY_MS` | `1000` / `2000` |
    /// | `REQUESTS_PER_SECOND` | `1` (zero is rejected) |
    ///
    /// # Example
    ///
    /// ```rust
    /// let config = Config::from_lookup(|key| match key {
    ///     "UPDATE_INTERVAL" => Some("0 */6 * * *".to_string()),
    ///     "DISCORD_WEBHOOK" => Some(webhook_url.clone()),
    ///     _ => None,
    /// })?;
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let update_interval = get("UPDATE_INTERVAL");
        let discord_webhook = get("DISCORD_WEBHOOK");
        let missing: Vec<&str> = [
            ("UPDATE_INTERVAL", update_interval.is_none()),
            ("DISCORD_WEBHOOK", discord_webhook.is_none()),
        ]
        .into_iter()
        .filter_map(|(key, absent)| absent.then_some(key))
        .collect();
        let (Some(update_interval), Some(discord_webhook)) = (update_interval, discord_webhook)
        else {
            return Err(ConfigError::Missing(missing.join(", ")));
        };

        let min_delay = parse_millis(&get, "REQUEST_MIN_DELAY_MS", 1000)?;
        let max_delay = parse_millis(&get, "REQUEST_MAX_DELAY_MS", 2000)?;
        let per_second: u32 = parse_number(&get, "REQUESTS_PER_SECOND", REQUESTS_PER_SECOND)?;
        if per_second == 0 {
            return Err(ConfigError::Invalid {
                key: "REQUESTS_PER_SECOND".to_string(),
                value: per_second.to_string(),
            });
        }

        Ok(Self {
            music_dir: get("MUSIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MUSIC_DIR)),
            data_dir: get("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
            update_interval,
            discord_webhook,
            discord_role: get("DISCORD_ROLE"),
            notify_on_scan: parse_flag(&get, "NOTIFY_ON_SCAN", false)?,
            scan_on_startup: parse_flag(&get, "SCAN_ON_STARTUP", true)?,
            prune_old_ledgers: parse_flag(&get, "PRUNE_OLD_LEDGERS", false)?,
            musicbrainz_url: get("MUSICBRAINZ_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            user_agent: default_user_agent(),
            release_limit: parse_number(&get, "RELEASE_LIMIT", DEFAULT_RELEASE_LIMIT)?,
            notify_cooldown: parse_secs(&get, "NOTIFY_COOLDOWN_SECS", DEFAULT_NOTIFY_COOLDOWN)?,
            request_timeout: parse_secs(&get, "REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT)?,
            pacer: PacerSettings::new(min_delay, max_delay).with_per_second_budget(per_second),
        })
    }

    /// The subset of settings a scan pass needs.
    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            release_limit: self.release_limit,
            notify_cooldown: self.notify_cooldown,
            notify_on_empty: self.notify_on_scan,
            pacer: self.pacer.clone(),
        }
    }
}

fn parse_flag<G>(get: &G, key: &str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key: key.to_string(),
                value,
            }),
        },
    }
}

/// Parses into the target type, so out-of-range values are rejected instead
/// of truncated.
fn parse_number<G, T>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value,
        }),
    }
}

fn parse_millis<G>(get: &G, key: &str, default: u64) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    parse_number(get, key, default).map(Duration::from_millis)
}

fn parse_secs<G>(get: &G, key: &str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    parse_number(get, key, default.as_secs()).map(Duration::from_secs)
}
