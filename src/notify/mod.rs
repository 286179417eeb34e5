//! Notification transport.
//!
//! The scanner hands finished decisions to a [`Notifier`]; delivery is either
//! confirmed or failed, there is no partial outcome. [`DiscordWebhook`] is
//! the only transport shipped.

mod discord;

use async_trait::async_trait;

use crate::types::ReleaseNotice;

pub use discord::{
    DEFAULT_RELEASE_COLOR, DiscordWebhook, EMPTY_SCAN_COLOR, STARTUP_COLOR, empty_scan_payload,
    format_release_date, release_payload, startup_payload,
};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Request(String),
    #[error("webhook rejected the payload with status {0}")]
    Rejected(u16),
    #[error("cannot set up transport: {0}")]
    Setup(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Announces one new release. `color` is the artist's display color.
    async fn notify_release(
        &self,
        notice: &ReleaseNotice,
        color: Option<u32>,
    ) -> Result<(), NotifyError>;

    /// Signals that a whole pass found nothing new.
    async fn notify_scan_empty(&self) -> Result<(), NotifyError>;

    /// Signals the first ever start of the service.
    async fn notify_startup(&self) -> Result<(), NotifyError>;
}
