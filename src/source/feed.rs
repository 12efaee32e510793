//! RSS/Atom feed source.
//!
//! The title of each feed entry is taken to be the filename and its link
//! the URL to fetch. Feeds are assumed to be curated, so there is no name
//! pattern here.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::blocking::Client;
use tracing::{debug, info_span, warn, Span};

use super::{discovery_get, DiscoveredItem, Source, Wiring};
use crate::error::DiscoveryError;
use crate::fetch::{FetchDispatcher, FetchRequest};
use crate::filter::FilenameTransform;
use crate::report::Reporter;

/// Parse a feed body into items, trying RSS 2.0 first and then Atom.
///
/// This is a pure function (no I/O) so that tests can exercise parsing
/// without a server. Entries without a link are skipped.
pub fn parse_feed(content: &str) -> Result<Vec<DiscoveredItem>, String> {
    match parse_as_rss(content) {
        Ok(items) => Ok(items),
        Err(rss_err) => {
            debug!(error = %rss_err, "Failed to parse as RSS, trying Atom");
            parse_as_atom(content).map_err(|atom_err| {
                format!(
                    "Failed to parse feed as RSS or Atom. RSS error: {rss_err}. Atom error: {atom_err}"
                )
            })
        }
    }
}

fn parse_as_rss(content: &str) -> Result<Vec<DiscoveredItem>, rss::Error> {
    let channel = rss::Channel::read_from(content.as_bytes())?;

    let items = channel
        .items()
        .iter()
        .filter_map(|item| {
            let name = item.title().unwrap_or_default();
            let Some(url) = item.link() else {
                warn!(title = name, "Feed entry has no link, skipping");
                return None;
            };
            Some(DiscoveredItem {
                name: name.to_string(),
                url: url.to_string(),
            })
        })
        .collect();

    Ok(items)
}

fn parse_as_atom(content: &str) -> Result<Vec<DiscoveredItem>, atom_syndication::Error> {
    let feed = atom_syndication::Feed::read_from(content.as_bytes())?;

    let items = feed
        .entries()
        .iter()
        .filter_map(|entry| {
            let name = entry.title().as_str();
            // Prefer rel="alternate" (the default rel), then whatever comes first.
            let link = entry
                .links()
                .iter()
                .find(|link| link.rel() == "alternate")
                .or_else(|| entry.links().first());
            let Some(link) = link else {
                warn!(title = name, "Feed entry has no link, skipping");
                return None;
            };
            Some(DiscoveredItem {
                name: name.to_string(),
                url: link.href().to_string(),
            })
        })
        .collect();

    Ok(items)
}

/// Fetch the files an RSS or Atom feed links to.
///
/// Files that already exist locally are not fetched again.
pub struct FeedSource {
    url: String,
    target_dir: PathBuf,
    filename_transform: Option<FilenameTransform>,
    label: String,
    wiring: Wiring,
}

impl FeedSource {
    pub fn new(url: impl Into<String>, target_dir: impl Into<PathBuf>) -> Self {
        let url = url.into();
        let span = info_span!("source", kind = "feed", url = %url);
        Self {
            label: url.clone(),
            url,
            target_dir: target_dir.into(),
            filename_transform: None,
            wiring: Wiring::new(span),
        }
    }

    pub fn with_filename_transform(mut self, transform: FilenameTransform) -> Self {
        self.filename_transform = Some(transform);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.label = name.into();
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.wiring.set_client(client);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn FetchDispatcher>) -> Self {
        self.wiring.set_dispatcher(dispatcher);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.wiring.set_span(span);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Source for FeedSource {
    fn name(&self) -> &str {
        &self.label
    }

    fn trigger(&self, reporter: &mut dyn Reporter) -> Result<(), DiscoveryError> {
        let _span = self.wiring.span().enter();

        let response = discovery_get(self.wiring.client(), &self.url)?.require_success(&self.url)?;
        let items = parse_feed(&response.body).map_err(|reason| DiscoveryError::Parse {
            url: self.url.clone(),
            reason,
        })?;
        debug!(count = items.len(), "Parsed feed");

        let dispatcher = self.wiring.dispatcher();
        for item in &items {
            let request = FetchRequest {
                url: &item.url,
                target_name: &item.name,
                target_dir: &self.target_dir,
                override_existing: false,
                filename_transform: self.filename_transform.as_ref(),
            };
            dispatcher.fetch(&request, reporter);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
