use std::time::Duration;

use chrono::{Local, NaiveDate};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    notify::{Notifier, NotifyError},
    types::ReleaseNotice,
};

pub const DEFAULT_RELEASE_COLOR: u32 = 0x9B59B6;
pub const EMPTY_SCAN_COLOR: u32 = 0x808080;
pub const STARTUP_COLOR: u32 = 0x00FF00;

const MAX_ATTEMPTS: u32 = 3;

/// `2024-05-01` becomes `May 01, 2024`; anything else is returned as is.
pub fn format_release_date(date: &str) -> String {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(parsed) => parsed.format("%B %d, %Y").to_string(),
        Err(_) => date.to_string(),
    }
}

fn role_mention(role: Option<&str>) -> String {
    role.map(|r| format!("<@&{r}>")).unwrap_or_default()
}

/// Webhook body announcing one release.
///
/// # Arguments
///
/// * `notice` - Artist, title and release date of the release
/// * `color` - Embed color, [`DEFAULT_RELEASE_COLOR`] when `None`
/// * `role` - Discord role id to mention in `content`
///
/// # Returns
///
/// A JSON object with `content` and a single embed:
///
/// ```json
/// {
///   "content": "<@&123>",
///   "embeds": [{
///     "title": "New Album Release!",
///     "description": "Autechre\n> Exai",
///     "color": 10181046,
///     "footer": { "text": "Release Date: May 01, 2024" }
///   }]
/// }
/// ```
pub fn release_payload(notice: &ReleaseNotice, color: Option<u32>, role: Option<&str>) -> Value {
    json!({
        "content": role_mention(role),
        "embeds": [{
            "title": "New Album Release!",
            "description": format!("{}\n> {}", notice.artist, notice.title),
            "color": color.unwrap_or(DEFAULT_RELEASE_COLOR),
            "footer": {
                "text": format!("Release Date: {}", format_release_date(&notice.release_date)),
            },
        }],
    })
}

/// Webhook body for a pass that found nothing new.
pub fn empty_scan_payload(role: Option<&str>) -> Value {
    json!({
        "content": role_mention(role),
        "embeds": [{
            "title": "🔍 Trackly Scan Completed",
            "description": "No new releases found",
            "color": EMPTY_SCAN_COLOR,
            "footer": {
                "text": format!("Scan completed at: {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
            },
        }],
    })
}

pub fn startup_payload(role: Option<&str>) -> Value {
    json!({
        "content": role_mention(role),
        "embeds": [{
            "title": "🎵 Trackly Started Successfully!",
            "description": "Trackly has been initialized and is now monitoring for new releases.",
            "color": STARTUP_COLOR,
            "footer": {
                "text": format!("First Startup: {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
            },
        }],
    })
}

/// [`Notifier`] that posts embeds to a Discord webhook.
///
/// # Retries
///
/// A delivery is attempted up to three times. 429 and 5xx answers and
/// transport errors are retried with a doubling delay starting at the retry
/// base; any other non-success status is returned at once as
/// [`NotifyError::Rejected`].
#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    http: Client,
    url: String,
    role: Option<String>,
    retry_base: Duration,
}

impl DiscordWebhook {
    /// Creates a webhook transport with a 30 s request timeout.
    ///
    /// # Example
    ///
    /// ```rust
    /// let webhook = DiscordWebhook::new(config.discord_webhook.clone(), config.discord_role.clone())?;
    /// webhook.notify_startup().await?;
    /// ```
    pub fn new(url: impl Into<String>, role: Option<String>) -> Result<Self, NotifyError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NotifyError::Setup(e.to_string()))?;
        Ok(Self {
            http,
            url: url.into(),
            role,
            retry_base: Duration::from_millis(500),
        })
    }

    /// Base delay of the retry backoff, doubled per attempt.
    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    async fn post(&self, payload: &Value) -> Result<(), NotifyError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let outcome = match self.http.post(&self.url).json(payload).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    let status = resp.status();
                    if !should_retry(status) {
                        return Err(NotifyError::Rejected(status.as_u16()));
                    }
                    NotifyError::Rejected(status.as_u16())
                }
                Err(e) => NotifyError::Request(e.to_string()),
            };

            if attempt >= MAX_ATTEMPTS {
                return Err(outcome);
            }
            warn!(attempt, error = %outcome, "webhook delivery failed, retrying");
            sleep(self.retry_base.saturating_mul(1u32 << (attempt - 1))).await;
        }
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait::async_trait]
impl Notifier for DiscordWebhook {
    async fn notify_release(
        &self,
        notice: &ReleaseNotice,
        color: Option<u32>,
    ) -> Result<(), NotifyError> {
        info!(artist = %notice.artist, title = %notice.title, "sending release notification");
        self.post(&release_payload(notice, color, self.role.as_deref()))
            .await
    }

    async fn notify_scan_empty(&self) -> Result<(), NotifyError> {
        info!("sending scan completion notification");
        self.post(&empty_scan_payload(self.role.as_deref())).await
    }

    async fn notify_startup(&self) -> Result<(), NotifyError> {
        info!("sending startup notification");
        self.post(&startup_payload(self.role.as_deref())).await
    }
}
