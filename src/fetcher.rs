use crate::config::{ApiConfig, PacingPolicy};
use crate::Result;
use reqwest::{Client, StatusCode};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// The kind of request being issued, which selects its pacing delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// A paginated search request.
    ListingPage,
    /// A single item detail request.
    Detail,
}

/// The outcome of one outbound request.
///
/// HTTP-level failures and transport-level failures are kept apart so callers
/// can react to them differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A 2xx response and its body.
    Success(String),
    /// A non-2xx response, with whatever body could be read (possibly empty).
    HttpError { status: u16, body: String },
    /// The request never produced a response (DNS, refused connection, timeout...).
    TransportError(String),
}

impl FetchOutcome {
    /// Returns `true` when the upstream answered 403, which it uses to signal rate limiting.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, FetchOutcome::HttpError { status, .. } if *status == StatusCode::FORBIDDEN.as_u16())
    }
}

/// The `RateLimitedFetcher` struct issues paced GET requests against the upstream API.
/// Every request is preceded by the pacing delay of its kind; nothing is retried.
pub struct RateLimitedFetcher {
    /// The HTTP client used for making requests.
    client: Client,
    /// The waits applied around requests.
    pacing: PacingPolicy,
}

impl RateLimitedFetcher {
    /// Creates a new `RateLimitedFetcher`.
    ///
    /// # Arguments
    ///
    /// * `api` - The client identity and timeout settings.
    /// * `pacing` - The pacing policy.
    ///
    /// # Returns
    ///
    /// A `Result` containing the fetcher, or an error if the client could not be created.
    pub fn new(api: &ApiConfig, pacing: PacingPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&api.user_agent)
            .timeout(api.timeout())
            .gzip(true)
            .build()?;

        Ok(Self { client, pacing })
    }

    /// Waits the pacing delay for `kind`, then fetches `url`.
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to fetch.
    /// * `kind` - The request kind, selecting the pacing delay.
    ///
    /// # Returns
    ///
    /// The `FetchOutcome` of the request. This never fails; every failure is an outcome.
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str, kind: RequestKind) -> FetchOutcome {
        let delay = match kind {
            RequestKind::ListingPage => self.pacing.page_delay(),
            RequestKind::Detail => self.pacing.detail_delay(),
        };
        if !delay.is_zero() {
            sleep(delay).await;
        }

        let response = match self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("Transport failure for {}: {}", url, e);
                return FetchOutcome::TransportError(e.to_string());
            }
        };

        let status = response.status();
        debug!("Response status: {}", status);

        if status.is_success() {
            match response.text().await {
                Ok(body) => FetchOutcome::Success(body),
                Err(e) => FetchOutcome::TransportError(e.to_string()),
            }
        } else {
            let body = response.text().await.unwrap_or_default();
            FetchOutcome::HttpError {
                status: status.as_u16(),
                body,
            }
        }
    }

    /// Applies the extra wait that must follow a 403 answer before the next request.
    ///
    /// Does nothing for any other outcome.
    pub async fn back_off_if_forbidden(&self, outcome: &FetchOutcome) {
        if outcome.is_forbidden() {
            let backoff = self.pacing.forbidden_backoff();
            warn!("Too many requests, backing off for {:?}", backoff);
            if !backoff.is_zero() {
                sleep(backoff).await;
            }
        }
    }
}
