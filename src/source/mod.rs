//! Source abstraction layer.
//!
//! This module defines the [`Source`] trait and the plumbing shared by the
//! concrete sources. Each source turns one kind of remote endpoint into a
//! list of [`DiscoveredItem`]s and hands them, one at a time, to a
//! [`FetchDispatcher`]:
//!
//! | Source | Discovery | Overwrites existing files |
//! |--------|-----------|---------------------------|
//! | [`StaticUrlSource`] | none, the URLs are the items | yes |
//! | [`ListingPageSource`] | anchors on an HTML listing page | no |
//! | [`FeedSource`] | entries of an RSS or Atom feed | no |
//!
//! ## Errors
//!
//! [`Source::trigger`] returns `Err` only when discovery itself fails (the
//! listing page or feed could not be fetched or parsed). Anything that goes
//! wrong with an individual file is passed to the [`Reporter`] and the
//! remaining items are still processed.
//!
//! ## For contributors: adding a new source
//!
//! 1. Create a new file in this directory (e.g. `sitemap.rs`).
//! 2. Define a struct holding the source's configuration plus a [`Wiring`],
//!    and implement [`Source`] for it.
//! 3. Add `mod sitemap;` below and re-export your struct.
//! 4. Add a variant to [`SourceConfig`](crate::config::SourceConfig) so it
//!    can be configured from a file.

mod feed;
mod listing;
mod static_urls;

pub use feed::{parse_feed, FeedSource};
pub use listing::{extract_anchors, Anchor, ListingPageSource};
pub use static_urls::StaticUrlSource;

use std::sync::Arc;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::Span;
use url::Url;

use crate::error::DiscoveryError;
use crate::fetch::{FetchDispatcher, HttpFetcher};
use crate::report::Reporter;

/// Trait that every source must implement.
///
/// Sources are immutable once built and keep no memory between calls, so
/// the same instance can be triggered repeatedly and will dispatch the same
/// items for an unchanged endpoint.
pub trait Source: Send + Sync {
    /// Human-readable label used in logs and the CLI summary.
    fn name(&self) -> &str;

    /// Discover items and fetch each one, in order.
    fn trigger(&self, reporter: &mut dyn Reporter) -> Result<(), DiscoveryError>;
}

/// One candidate file found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredItem {
    pub name: String,
    /// Absolute URL to fetch.
    pub url: String,
}

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

/// HTTP client, dispatcher and log span carried by every source.
///
/// Without an explicit dispatcher, items are fetched with an
/// [`HttpFetcher`] sharing the discovery client.
#[derive(Clone)]
pub(crate) struct Wiring {
    client: Client,
    dispatcher: Option<Arc<dyn FetchDispatcher>>,
    span: Span,
}

impl Wiring {
    pub(crate) fn new(span: Span) -> Self {
        Self {
            client: Client::new(),
            dispatcher: None,
            span,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub(crate) fn set_client(&mut self, client: Client) {
        self.client = client;
    }

    pub(crate) fn set_dispatcher(&mut self, dispatcher: Arc<dyn FetchDispatcher>) {
        self.dispatcher = Some(dispatcher);
    }

    pub(crate) fn set_span(&mut self, span: Span) {
        self.span = span;
    }

    pub(crate) fn dispatcher(&self) -> Arc<dyn FetchDispatcher> {
        match &self.dispatcher {
            Some(dispatcher) => Arc::clone(dispatcher),
            None => Arc::new(HttpFetcher::new(self.client.clone())),
        }
    }
}

/// Response of a discovery request, read in full.
#[derive(Debug)]
pub(crate) struct DiscoveryResponse {
    pub status: StatusCode,
    /// URL after redirects; relative links resolve against this.
    pub final_url: Url,
    pub body: String,
}

impl DiscoveryResponse {
    /// Treat anything but a success status as fatal.
    pub fn require_success(self, url: &str) -> Result<Self, DiscoveryError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(DiscoveryError::Status {
                url: url.to_string(),
                status: self.status.as_u16(),
                body: self.body,
            })
        }
    }
}

/// GET a listing page or feed. Transport failures are discovery errors;
/// the status is left for the caller to judge.
pub(crate) fn discovery_get(client: &Client, url: &str) -> Result<DiscoveryResponse, DiscoveryError> {
    let transport = |source| DiscoveryError::Transport {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().map_err(transport)?;
    let status = response.status();
    let final_url = response.url().clone();
    let body = response.text().map_err(transport)?;

    Ok(DiscoveryResponse {
        status,
        final_url,
        body,
    })
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------
