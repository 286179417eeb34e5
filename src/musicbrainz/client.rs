use std::time::Duration;

use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    musicbrainz::{LookupError, ReleaseSource, RequestPacer},
    types::{ArtistSearchResponse, ReleaseGroup, ReleaseGroupResponse},
};

pub const DEFAULT_BASE_URL: &str = "https://musicbrainz.org/ws/2";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Upper bound for one request, connect to last body byte.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Identifies this client to MusicBrainz, which rejects anonymous agents.
pub fn default_user_agent() -> String {
    format!(
        "Trackly/{version} ( https://github.com/7eventy7/trackly )",
        version = env!("CARGO_PKG_VERSION")
    )
}

/// HTTP client for the MusicBrainz web service.
///
/// # Rate Limiting
///
/// Every attempt (retries included) goes through the caller's pacer. A
/// non-success status, a rate-limit answer (503/429) or a transport error
/// counts as a failure and is retried until the attempt budget runs out. A
/// request that gets no answer within the timeout is a transport error.
#[derive(Debug, Clone)]
pub struct MusicBrainzClient {
    http: Client,
    base_url: String,
    max_attempts: u32,
    timeout: Duration,
}

impl MusicBrainzClient {
    /// Creates a client for the web service at `base_url`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Service root such as [`DEFAULT_BASE_URL`]; a trailing `/` is dropped
    /// * `user_agent` - Sent with every request, see [`default_user_agent`]
    ///
    /// # Returns
    ///
    /// The client with [`DEFAULT_MAX_ATTEMPTS`] and [`DEFAULT_REQUEST_TIMEOUT`],
    /// or `LookupError::Setup` if the agent is not a valid header value.
    ///
    /// # Example
    ///
    /// ```rust
    /// let client = MusicBrainzClient::new(DEFAULT_BASE_URL, &default_user_agent())?
    ///     .with_timeout(Duration::from_secs(10));
    /// ```
    pub fn new(base_url: impl Into<String>, user_agent: &str) -> Result<Self, LookupError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|e| LookupError::Setup(e.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| LookupError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// Attempts per lookup, retries included. At least one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // paced GET with bounded retries; decode failures are not retried
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        pacer: &mut RequestPacer,
    ) -> Result<T, LookupError> {
        let url = format!("{base}/{endpoint}", base = self.base_url);
        let mut last_failure = String::new();

        for attempt in 1..=self.max_attempts {
            pacer.wait().await;

            let response = match self
                .http
                .get(&url)
                .query(query)
                .timeout(self.timeout)
                .send()
                .await {
                Ok(response) => response,
                Err(e) => {
                    pacer.failure();
                    warn!(
                        endpoint,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "request failed"
                    );
                    last_failure = e.to_string();
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::TOO_MANY_REQUESTS {
                pacer.failure();
                warn!(endpoint, attempt, %status, "rate limited by MusicBrainz, backing off");
                last_failure = format!("rate limited ({status})");
                continue;
            }
            if !status.is_success() {
                pacer.failure();
                warn!(
                    endpoint,
                    attempt,
                    max_attempts = self.max_attempts,
                    %status,
                    "request returned an error status"
                );
                last_failure = format!("unexpected status {status}");
                continue;
            }

            pacer.success();
            debug!(endpoint, attempt, "request succeeded");
            return response
                .json::<T>()
                .await
                .map_err(|e| LookupError::Decode(e.to_string()));
        }

        Err(LookupError::RetriesExhausted {
            attempts: self.max_attempts,
            last: last_failure,
        })
    }
}

#[async_trait::async_trait]
impl ReleaseSource for MusicBrainzClient {
    /// Resolves a MusicBrainz artist id from a free-text name.
    ///
    /// Only the best scoring match is used. There is no similarity
    /// threshold, so an obscure name can resolve to a different artist.
    ///
    /// # Arguments
    ///
    /// * `name` - Artist name, usually the library directory name
    /// * `pacer` - Shared pacer of the current pass
    ///
    /// # Returns
    ///
    /// - `Ok(Some(id))` - The top match
    /// - `Ok(None)` - The search returned no artists
    /// - `Err(LookupError)` - See [`MusicBrainzClient`] for the retry policy
    ///
    /// # API Endpoint
    ///
    /// `GET {base}/artist?query={name}&limit=1&fmt=json`
    ///
    /// # Example
    ///
    /// ```rust
    /// let mut pacer = RequestPacer::new(PacerSettings::default());
    /// let id = client.resolve_artist_id("Boards of Canada", &mut pacer).await?;
    /// ```
    async fn resolve_artist_id(
        &self,
        name: &str,
        pacer: &mut RequestPacer,
    ) -> Result<Option<String>, LookupError> {
        let query = [
            ("query", name.to_string()),
            ("limit", "1".to_string()),
            ("fmt", "json".to_string()),
        ];
        let response: ArtistSearchResponse = self.get_json("artist", &query, pacer).await?;
        Ok(response.artists.into_iter().next().map(|a| a.id))
    }

    /// Lists album release groups of an artist.
    ///
    /// # Arguments
    ///
    /// * `artist_id` - MusicBrainz artist id
    /// * `limit` - Page size; only the first page is fetched
    /// * `pacer` - Shared pacer of the current pass
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<ReleaseGroup>)` - In service order, possibly empty
    /// - `Err(LookupError)` - Retries exhausted or the body did not decode
    ///
    /// # API Endpoint
    ///
    /// `GET {base}/release-group?artist={id}&type=album&limit={limit}&offset=0&fmt=json`
    ///
    /// # Error Handling
    ///
    /// Items are decoded one by one. A release group without a `title` is
    /// skipped with a warning and the rest of the page is still returned.
    async fn release_groups(
        &self,
        artist_id: &str,
        limit: u32,
        pacer: &mut RequestPacer,
    ) -> Result<Vec<ReleaseGroup>, LookupError> {
        let query = [
            ("artist", artist_id.to_string()),
            ("type", "album".to_string()),
            ("limit", limit.to_string()),
            ("offset", "0".to_string()),
            ("fmt", "json".to_string()),
        ];
        let response: ReleaseGroupResponse = self.get_json("release-group", &query, pacer).await?;

        let mut groups = Vec::with_capacity(response.release_groups.len());
        for raw in response.release_groups {
            match serde_json::from_value::<ReleaseGroup>(raw) {
                Ok(group) => groups.push(group),
                Err(e) => warn!(artist_id, error = %e, "skipping malformed release group"),
            }
        }
        Ok(groups)
    }
}
