use crate::fetcher::{FetchOutcome, RateLimitedFetcher, RequestKind};
use crate::{HarvestError, Result};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// One listing request: a query, a zero-based page index and a page size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub query: String,
    pub page_index: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Builds the request URL, with the query percent-encoded.
    pub fn url(&self, listing_endpoint: &str) -> String {
        format!(
            "{}?text={}&page={}&per_page={}",
            listing_endpoint,
            urlencoding::encode(&self.query),
            self.page_index,
            self.page_size
        )
    }
}

/// An item identifier extracted from a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListingItem {
    pub id: String,
}

/// The part of a listing response the paginator reads.
#[derive(Debug, Default, Deserialize)]
pub struct ListingPage {
    #[serde(default)]
    pub items: Option<Vec<Option<RawListingItem>>>,
}

#[derive(Debug, Deserialize)]
pub struct RawListingItem {
    #[serde(default)]
    pub id: Option<Value>,
}

impl ListingPage {
    /// Parses a listing body.
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|source| HarvestError::Parse {
            context: "listing page".to_string(),
            source,
        })
    }

    /// The identifiers of the page, in response order. Entries without an id are skipped.
    pub fn into_items(self) -> Vec<ListingItem> {
        self.items
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .filter_map(|item| item.id.as_ref().and_then(scalar_to_string))
            .map(|id| ListingItem { id })
            .collect()
    }
}

/// Renders a JSON scalar the way the upstream identifiers and names are used: strings
/// verbatim, numbers and booleans in their JSON form. `null` yields `None`.
pub(crate) fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Counters for listing requests issued so far.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageStats {
    pub requested: u32,
    pub failed: u32,
}

/// The `ListingPaginator` struct walks the fixed query × page matrix and yields item identifiers.
pub struct ListingPaginator {
    /// The paced fetcher shared with the detail stage.
    fetcher: Arc<RateLimitedFetcher>,
    listing_endpoint: String,
    pages_per_query: u32,
    page_size: u32,
    pages_requested: AtomicU32,
    pages_failed: AtomicU32,
}

impl ListingPaginator {
    /// Creates a new `ListingPaginator`.
    ///
    /// # Arguments
    ///
    /// * `fetcher` - The paced fetcher.
    /// * `listing_endpoint` - The search endpoint, without query string.
    /// * `pages_per_query` - The fixed page budget per query.
    /// * `page_size` - The number of items requested per page.
    pub fn new(
        fetcher: Arc<RateLimitedFetcher>,
        listing_endpoint: impl Into<String>,
        pages_per_query: u32,
        page_size: u32,
    ) -> Self {
        Self {
            fetcher,
            listing_endpoint: listing_endpoint.into(),
            pages_per_query,
            page_size,
            pages_requested: AtomicU32::new(0),
            pages_failed: AtomicU32::new(0),
        }
    }

    /// The requests issued for `queries`: queries in order, pages `0..pages_per_query` inside.
    pub fn page_requests(&self, queries: &[String]) -> Vec<PageRequest> {
        queries
            .iter()
            .flat_map(|query| {
                (0..self.pages_per_query).map(move |page_index| PageRequest {
                    query: query.clone(),
                    page_index,
                    page_size: self.page_size,
                })
            })
            .collect()
    }

    /// Lazily yields the items of every page, in crawl order.
    ///
    /// A page is only requested once the items of the previous one have been consumed.
    /// Failed pages are logged and skipped; a malformed page body ends the stream with
    /// an error. Identifiers are not deduplicated.
    pub fn items<'s>(
        &'s self,
        queries: &[String],
    ) -> impl Stream<Item = Result<ListingItem>> + 's {
        stream::iter(self.page_requests(queries))
            .then(move |request| async move {
                if request.page_index == 0 {
                    info!("Searching for query: {}", request.query);
                }
                self.fetch_page(&request).await
            })
            .flat_map(|page| {
                let items: Vec<Result<ListingItem>> = match page {
                    Ok(Some(items)) => items.into_iter().map(Ok).collect(),
                    Ok(None) => Vec::new(),
                    Err(e) => vec![Err(e)],
                };
                stream::iter(items)
            })
    }

    /// Fetches one page.
    ///
    /// # Returns
    ///
    /// `Ok(Some(items))` on success, `Ok(None)` when the page failed and was skipped,
    /// or a parse error for a malformed body.
    pub async fn fetch_page(&self, request: &PageRequest) -> Result<Option<Vec<ListingItem>>> {
        let url = request.url(&self.listing_endpoint);
        info!("Request: {}", url);

        self.pages_requested.fetch_add(1, Ordering::Relaxed);
        let outcome = self.fetcher.fetch(&url, RequestKind::ListingPage).await;
        match outcome {
            FetchOutcome::Success(body) => Ok(Some(ListingPage::parse(&body)?.into_items())),
            FetchOutcome::HttpError { status, ref body } => {
                self.pages_failed.fetch_add(1, Ordering::Relaxed);
                warn!("HTTP error {} for {}", status, url);
                warn!("Response: {}", body);
                self.fetcher.back_off_if_forbidden(&outcome).await;
                Ok(None)
            }
            FetchOutcome::TransportError(message) => {
                self.pages_failed.fetch_add(1, Ordering::Relaxed);
                warn!("Transport error for {}: {}", url, message);
                Ok(None)
            }
        }
    }

    pub fn stats(&self) -> PageStats {
        PageStats {
            requested: self.pages_requested.load(Ordering::Relaxed),
            failed: self.pages_failed.load(Ordering::Relaxed),
        }
    }
}
