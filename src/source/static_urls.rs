//! A fixed list of URLs, re-fetched on every trigger.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::blocking::Client;
use tracing::{debug, info_span, Span};

use super::{DiscoveredItem, Source, Wiring};
use crate::error::DiscoveryError;
use crate::fetch::{FetchDispatcher, FetchRequest};
use crate::report::Reporter;
use crate::urls::filename_from_url;

/// Fetch static HTTP URLs.
///
/// Useful for unchanging URLs whose content is updated in place: every
/// trigger downloads each URL again and overwrites the previous copy.
/// There is no discovery request, so [`trigger`](Source::trigger) never
/// returns an error.
pub struct StaticUrlSource {
    urls: Vec<String>,
    target_dir: PathBuf,
    label: String,
    wiring: Wiring,
}

impl StaticUrlSource {
    pub fn new<I, S>(urls: I, target_dir: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls: Vec<String> = urls.into_iter().map(Into::into).collect();
        let label = format!("static ({} urls)", urls.len());
        let span = info_span!("source", kind = "static", urls = urls.len());
        Self {
            urls,
            target_dir: target_dir.into(),
            label,
            wiring: Wiring::new(span),
        }
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

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Each URL names itself.
    pub fn discover(&self) -> Vec<DiscoveredItem> {
        self.urls
            .iter()
            .map(|url| DiscoveredItem {
                name: filename_from_url(url).to_string(),
                url: url.clone(),
            })
            .collect()
    }
}

impl Source for StaticUrlSource {
    fn name(&self) -> &str {
        &self.label
    }

    fn trigger(&self, reporter: &mut dyn Reporter) -> Result<(), DiscoveryError> {
        let _span = self.wiring.span().enter();
        let dispatcher = self.wiring.dispatcher();

        for item in self.discover() {
            debug!(url = %item.url, name = %item.name, "Fetching static URL");
            let request = FetchRequest {
                url: &item.url,
                target_name: &item.name,
                target_dir: &self.target_dir,
                override_existing: true,
                filename_transform: None,
            };
            dispatcher.fetch(&request, reporter);
        }
        Ok(())
    }
}
