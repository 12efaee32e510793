//! HTML directory-listing source.
//!
//! Fetches one listing page (the kind Apache or nginx generate for a
//! directory) and treats every anchor whose `href` ends with its visible
//! text as a file to fetch. Links like "Parent Directory" fail that test
//! and are skipped.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use scraper::{ElementRef, Html};
use tracing::{debug, info, info_span, warn, Span};
use url::Url;

use super::{discovery_get, DiscoveredItem, Source, Wiring};
use crate::error::DiscoveryError;
use crate::fetch::{FetchDispatcher, FetchRequest};
use crate::filter::{FilenameTransform, NameFilter};
use crate::report::Reporter;
use crate::urls::join_url;

/// An anchor element found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Text directly inside the element, before any child element, with
    /// entities decoded. Whitespace is kept as is.
    pub text: String,
    /// The `href` attribute, entities decoded. `None` for anchors without
    /// one (e.g. `<a name="top">`).
    pub href: Option<String>,
}

/// Extract all `<a>` elements from an HTML document in document order.
///
/// The page goes through a full HTML parser, so links inside comments or
/// `<script>`/`<style>` text are not anchors, and quoted attribute values
/// may contain `>`.
pub fn extract_anchors(html: &str) -> Vec<Anchor> {
    let document = Html::parse_document(html);

    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "a")
        .map(|el| {
            let text = el
                .first_child()
                .and_then(|node| node.value().as_text())
                .map(|t| t.text.to_string())
                .unwrap_or_default();

            Anchor {
                text,
                href: el.value().attr("href").map(String::from),
            }
        })
        .collect()
}

/// Fetch files linked from an HTTP listing page.
///
/// A name pattern limits which files are taken; it must match from the
/// start of the anchor text. Files that already exist locally are not
/// fetched again.
pub struct ListingPageSource {
    url: String,
    target_dir: PathBuf,
    filter: NameFilter,
    filename_transform: Option<FilenameTransform>,
    label: String,
    wiring: Wiring,
}

impl ListingPageSource {
    pub const DEFAULT_PATTERN: &'static str = NameFilter::MATCH_ALL;

    /// Create a listing source. Fails only if `name_pattern` is not a valid
    /// regular expression.
    pub fn new(
        url: impl Into<String>,
        target_dir: impl Into<PathBuf>,
        name_pattern: &str,
    ) -> Result<Self, regex::Error> {
        let url = url.into();
        let filter = NameFilter::new(name_pattern)?;
        let span = info_span!("source", kind = "listing", url = %url);
        Ok(Self {
            label: url.clone(),
            url,
            target_dir: target_dir.into(),
            filter,
            filename_transform: None,
            wiring: Wiring::new(span),
        })
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

    pub fn filter(&self) -> &NameFilter {
        &self.filter
    }

    /// Turn a fetched listing page into the items that should be fetched.
    ///
    /// `page_url` is the final URL of the listing request; relative links
    /// are resolved against it. No network access.
    pub fn discover(&self, page_url: &Url, html: &str) -> Vec<DiscoveredItem> {
        extract_anchors(html)
            .into_iter()
            .filter_map(|anchor| self.accept(page_url, anchor))
            .collect()
    }

    fn accept(&self, page_url: &Url, anchor: Anchor) -> Option<DiscoveredItem> {
        let Anchor { text: name, href } = anchor;

        let Some(href) = href else {
            debug!(name = %name, "Anchor without href, skipping");
            return None;
        };

        if name.is_empty() {
            info!(href = %href, "Anchor has no text, skipping");
            return None;
        }

        if !href.ends_with(&name) {
            info!(name = %name, href = %href, "Not a filename, skipping");
            return None;
        }

        if !self.filter.matches(&name) {
            info!(name = %name, pattern = self.filter.pattern(), "Filename doesn't match pattern, skipping");
            return None;
        }

        match join_url(page_url, &href) {
            Ok(url) => Some(DiscoveredItem {
                name,
                url: url.into(),
            }),
            Err(e) => {
                warn!(name = %name, href = %href, error = %e, "Unresolvable link, skipping");
                None
            }
        }
    }
}

impl Source for ListingPageSource {
    fn name(&self) -> &str {
        &self.label
    }

    fn trigger(&self, reporter: &mut dyn Reporter) -> Result<(), DiscoveryError> {
        let _span = self.wiring.span().enter();

        let response = discovery_get(self.wiring.client(), &self.url)?;
        if response.status == StatusCode::NOT_FOUND {
            debug!("Listing page doesn't exist yet, skipping");
            return Ok(());
        }
        let response = response.require_success(&self.url)?;

        let items = self.discover(&response.final_url, &response.body);
        debug!(count = items.len(), "Discovered files on listing page");

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::regex_rename;
    use crate::report::CollectingReporter;
    use crate::source::testing::{closed_port, FailingDispatcher, RecordingDispatcher};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const APACHE_LISTING: &str = r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 3.2 Final//EN">
<html>
 <head><title>Index of /data/2024</title></head>
 <body>
<h1>Index of /data/2024</h1>
<table>
<tr><th><a href="?C=N;O=D">Name</a></th><th><a href="?C=M;O=A">Last modified</a></th></tr>
<tr><td><a href="/data/">Parent Directory</a></td></tr>
<tr><td><a href="MOD09.A2024001.hdf">MOD09.A2024001.hdf</a></td><td>2024-01-02 10:00</td></tr>
<tr><td><a href="MYD09.A2024001.hdf">MYD09.A2024001.hdf</a></td><td>2024-01-02 10:05</td></tr>
<tr><td><a href="MOD09.A2024002.hdf">MOD09.A2024002.hdf</a></td><td>2024-01-03 10:00</td></tr>
</table>
</body></html>"#;

    fn source(pattern: &str) -> ListingPageSource {
        ListingPageSource::new("http://example.com/data/2024/", "/data/out", pattern).unwrap()
    }

    fn page_url() -> Url {
        Url::parse("http://example.com/data/2024/").unwrap()
    }

    // -- anchor extraction ---------------------------------------------------

    #[test]
    fn extracts_anchors_in_document_order() {
        let anchors = extract_anchors(APACHE_LISTING);
        let texts: Vec<_> = anchors.iter().map(|a| a.text.as_str()).collect();
        assert_eq!(
            texts,
            [
                "Name",
                "Last modified",
                "Parent Directory",
                "MOD09.A2024001.hdf",
                "MYD09.A2024001.hdf",
                "MOD09.A2024002.hdf",
            ]
        );
        assert_eq!(anchors[2].href.as_deref(), Some("/data/"));
    }

    #[test]
    fn handles_quoting_styles_and_entities() {
        let html = r#"<A HREF='a&amp;b.txt'>a&amp;b.txt</A> <a class=x href=bare.nc>bare.nc</a>
<a data-href="nope" name="top">top</a>"#;
        let anchors = extract_anchors(html);

        assert_eq!(anchors.len(), 3);
        assert_eq!(anchors[0].text, "a&b.txt");
        assert_eq!(anchors[0].href.as_deref(), Some("a&b.txt"));
        assert_eq!(anchors[1].href.as_deref(), Some("bare.nc"));
        assert_eq!(anchors[2].href, None, "data-href is not href");
    }

    #[test]
    fn text_stops_at_first_child_element() {
        let anchors = extract_anchors(r#"<a href="x.nc"><img src="i.png"> x.nc</a><abbr>no</abbr>"#);
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].text, "");
    }

    #[test]
    fn commented_out_links_are_not_anchors() {
        let html = r#"<!-- <a href="old.nc">old.nc</a> --><a href="new.nc">new.nc</a>"#;
        let hrefs: Vec<_> = extract_anchors(html).into_iter().filter_map(|a| a.href).collect();
        assert_eq!(hrefs, ["new.nc"]);
    }

    #[test]
    fn script_text_is_not_markup() {
        let html = r#"<script>document.write('<a href="js.nc">js.nc</a>')</script>
<a href="real.nc">real.nc</a>"#;
        let hrefs: Vec<_> = extract_anchors(html).into_iter().filter_map(|a| a.href).collect();
        assert_eq!(hrefs, ["real.nc"]);
    }

    #[test]
    fn quoted_attribute_may_contain_gt() {
        let anchors = extract_anchors(r#"<a title="size > 1GB" href="big.nc">big.nc</a>"#);
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].href.as_deref(), Some("big.nc"));
        assert_eq!(anchors[0].text, "big.nc");
    }

    // -- filtering -----------------------------------------------------------

    #[test]
    fn skips_anchors_whose_text_is_not_the_href_suffix() {
        let items = source(".*").discover(&page_url(), APACHE_LISTING);
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            ["MOD09.A2024001.hdf", "MYD09.A2024001.hdf", "MOD09.A2024002.hdf"]
        );
        assert_eq!(items[0].url, "http://example.com/data/2024/MOD09.A2024001.hdf");
    }

    #[test]
    fn pattern_matches_from_start_of_name() {
        let items = source("MOD09").discover(&page_url(), APACHE_LISTING);
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, ["MOD09.A2024001.hdf", "MOD09.A2024002.hdf"]);

        let items = source("A2024").discover(&page_url(), APACHE_LISTING);
        assert!(items.is_empty(), "pattern is not a search");
    }

    #[test]
    fn suffix_rule_is_literal() {
        // Trailing slashes and query strings defeat the suffix rule.
        let html = r#"<a href="sub/">sub</a><a href="f.nc?x=1">f.nc</a><a href="deep/f2.nc">f2.nc</a>"#;
        let items = source(".*").discover(&page_url(), html);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "f2.nc");
        assert_eq!(items[0].url, "http://example.com/data/2024/deep/f2.nc");
    }

    #[test]
    fn icon_links_without_text_are_skipped() {
        // Apache with IconsAreLinks: each row has an icon anchor and a text anchor.
        let html = r#"<pre><a href="/"><img src="/icons/back.gif" alt="[PARENTDIR]"></a> <a href="/">Parent Directory</a>
<a href="x.nc"><img src="/icons/unknown.gif" alt="[   ]"></a> <a href="x.nc">x.nc</a>
</pre>"#;
        let base = Url::parse("http://example.com/data/").unwrap();
        let items = source(".*").discover(&base, html);
        assert_eq!(
            items,
            [DiscoveredItem {
                name: "x.nc".into(),
                url: "http://example.com/data/x.nc".into(),
            }]
        );
    }

    #[test]
    fn repeated_names_are_not_deduplicated() {
        let html = r#"<a href="a.nc">a.nc</a><a href="mirror/a.nc">a.nc</a>"#;
        let items = source(".*").discover(&page_url(), html);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn invalid_pattern_fails_construction() {
        assert!(ListingPageSource::new("http://example.com/", "/data", "(").is_err());
    }

    // -- trigger against a mock server ---------------------------------------

    #[test]
    fn connection_refused_is_a_discovery_error() {
        let url = format!("http://127.0.0.1:{}/data/", closed_port());
        let recorder = Arc::new(RecordingDispatcher::default());
        let source = ListingPageSource::new(url.clone(), "/data/out", ".*")
            .unwrap()
            .with_dispatcher(recorder.clone());
        let mut reporter = CollectingReporter::new();

        let err = source.trigger(&mut reporter).unwrap_err();

        assert!(matches!(&err, DiscoveryError::Transport { .. }));
        assert_eq!(err.url(), url);
        assert!(err.message().starts_with("Request failed"));
        assert!(recorder.calls().is_empty());
        assert!(reporter.is_empty());
    }

    /// Build a source against `server`, run `trigger` on a blocking thread,
    /// and return what it dispatched and reported.
    async fn trigger_against(
        server: &MockServer,
        listing_path: &str,
        pattern: &'static str,
        transform: Option<FilenameTransform>,
    ) -> (
        Result<(), DiscoveryError>,
        Arc<RecordingDispatcher>,
        CollectingReporter,
    ) {
        let url = format!("{}{listing_path}", server.uri());
        tokio::task::spawn_blocking(move || {
            let recorder = Arc::new(RecordingDispatcher::default());
            let mut source = ListingPageSource::new(url, "/data/out", pattern)
                .unwrap()
                .with_dispatcher(recorder.clone());
            if let Some(t) = transform {
                source = source.with_filename_transform(t);
            }
            let mut reporter = CollectingReporter::new();
            let result = source.trigger(&mut reporter);
            (result, recorder, reporter)
        })
        .await
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dispatches_matching_files_without_override() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2024/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(APACHE_LISTING))
            .mount(&server)
            .await;

        let rename = regex_rename(r"\.hdf$", ".h4").unwrap();
        let (result, recorder, reporter) =
            trigger_against(&server, "/data/2024/", "MOD", Some(rename)).await;

        assert!(result.is_ok());
        let calls = recorder.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].url, format!("{}/data/2024/MOD09.A2024001.hdf", server.uri()));
        assert_eq!(calls[0].name, "MOD09.A2024001.hdf");
        assert!(calls.iter().all(|c| !c.override_existing && c.has_transform));
        assert!(reporter.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_listing_is_a_silent_no_op() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let (result, recorder, reporter) = trigger_against(&server, "/later/", ".*", None).await;

        assert!(result.is_ok());
        assert!(recorder.calls().is_empty());
        assert!(reporter.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn server_error_is_a_discovery_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("database on fire"))
            .mount(&server)
            .await;

        let (result, recorder, reporter) = trigger_against(&server, "/data/", ".*", None).await;

        let err = result.unwrap_err();
        assert!(matches!(err, DiscoveryError::Status { status: 500, .. }));
        assert_eq!(err.message(), "Status code 500");
        assert!(err.detail().ends_with("\n\ndatabase on fire"));
        assert!(err.detail().starts_with(&format!("{}/data/", server.uri())));
        assert!(recorder.calls().is_empty());
        assert!(reporter.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn links_resolve_against_redirected_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", "/archive/2024/"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/archive/2024/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"<a href="x.nc">x.nc</a>"#),
            )
            .mount(&server)
            .await;

        let (result, recorder, _) = trigger_against(&server, "/latest", ".*", None).await;

        assert!(result.is_ok());
        assert_eq!(
            recorder.calls()[0].url,
            format!("{}/archive/2024/x.nc", server.uri())
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn repeated_triggers_are_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(APACHE_LISTING))
            .expect(2)
            .mount(&server)
            .await;

        let url = format!("{}/data/2024/", server.uri());
        let calls = tokio::task::spawn_blocking(move || {
            let recorder = Arc::new(RecordingDispatcher::default());
            let source = ListingPageSource::new(url, "/data/out", ".*")
                .unwrap()
                .with_dispatcher(recorder.clone());
            source.trigger(&mut CollectingReporter::new()).unwrap();
            let first = recorder.calls();
            source.trigger(&mut CollectingReporter::new()).unwrap();
            let all = recorder.calls();
            (first, all)
        })
        .await
        .unwrap();

        let (first, all) = calls;
        assert_eq!(first.len(), 3);
        assert_eq!(&all[..3], &first[..]);
        assert_eq!(&all[3..], &first[..]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn per_file_failures_are_reported_and_iteration_continues() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(APACHE_LISTING))
            .mount(&server)
            .await;

        let url = format!("{}/data/2024/", server.uri());
        let (result, reporter) = tokio::task::spawn_blocking(move || {
            let source = ListingPageSource::new(url, "/data/out", ".*")
                .unwrap()
                .with_dispatcher(Arc::new(FailingDispatcher));
            let mut reporter = CollectingReporter::new();
            let result = source.trigger(&mut reporter);
            (result, reporter)
        })
        .await
        .unwrap();

        assert!(result.is_ok());
        assert_eq!(reporter.error_count(), 3);
    }
}
