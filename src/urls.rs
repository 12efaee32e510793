//! Small URL helpers shared by the sources and the fetcher.

use url::Url;

/// Get the filename component of a URL: everything after the last `/`.
///
/// No percent-decoding and no extension inference. A URL ending in `/`
/// yields an empty string, and input without any `/` is returned unchanged.
///
/// ```
/// use remote_fetch::urls::filename_from_url;
///
/// assert_eq!(filename_from_url("http://example.com/somefile.zip"), "somefile.zip");
/// assert_eq!(filename_from_url("http://example.com/dir/"), "");
/// ```
pub fn filename_from_url(url: &str) -> &str {
    match url.rfind('/') {
        Some(idx) => &url[idx + 1..],
        None => url,
    }
}

/// Resolve `href` against `base` the way a browser resolves a link on the
/// page at `base`.
pub fn join_url(base: &Url, href: &str) -> Result<Url, url::ParseError> {
    base.join(href)
}
