//! # MusicBrainz Integration Module
//!
//! Read-only access to the external catalog service. Two lookups are needed
//! by the release scanner:
//!
//! - resolving an artist id from a free-text name (best match only)
//! - listing the album release groups of an artist id
//!
//! Both go through [`RequestPacer`], which spaces calls out with jitter,
//! backs off exponentially on failures and enforces a hard per-second
//! request budget. The pacer
//! is passed by the caller so one instance can gate a whole scan pass.
//!
//! [`ReleaseSource`] is the seam the scanner depends on; [`MusicBrainzClient`]
//! is the HTTP implementation.

mod client;
mod pacer;

use async_trait::async_trait;

use crate::types::ReleaseGroup;

pub use client::{
    DEFAULT_BASE_URL, DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT, MusicBrainzClient,
    default_user_agent,
};
pub use pacer::{
    MAX_BACKOFF, PacerSettings, REQUESTS_PER_SECOND, RequestPacer, backoff_delay, jittered_delay,
    remaining_wait,
};

/// Why a lookup produced no answer.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
    #[error("cannot decode response: {0}")]
    Decode(String),
    #[error("cannot set up client: {0}")]
    Setup(String),
}

/// Read-only release catalog the scanner queries.
///
/// Every call takes the pass's [`RequestPacer`] so implementations that hit
/// the network share one spacing and backoff state.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Best matching external id for an artist name, if any.
    async fn resolve_artist_id(
        &self,
        name: &str,
        pacer: &mut RequestPacer,
    ) -> Result<Option<String>, LookupError>;

    /// Up to `limit` album release groups, in the order the service returns them.
    async fn release_groups(
        &self,
        artist_id: &str,
        limit: u32,
        pacer: &mut RequestPacer,
    ) -> Result<Vec<ReleaseGroup>, LookupError>;
}
