//! Name filtering and renaming for discovered files.
//!
//! A [`NameFilter`] decides whether a discovered name should be fetched at
//! all; a [`FilenameTransform`] optionally rewrites the name the file is
//! stored under.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

/// A renaming function applied to a discovered name just before it is
/// fetched.
///
/// Errors are not discovery errors: the fetcher reports them against the
/// item's URL and moves on to the next item.
pub type FilenameTransform = Arc<dyn Fn(&str) -> anyhow::Result<String> + Send + Sync>;

/// Wrap a closure as a [`FilenameTransform`].
pub fn transform<F>(f: F) -> FilenameTransform
where
    F: Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Build a transform that rewrites every match of `pattern` with
/// `replacement` (`$1`-style group references are supported).
///
/// ```
/// use remote_fetch::filter::regex_rename;
///
/// let rename = regex_rename(r"\.hdf$", ".h4").unwrap();
/// assert_eq!(rename("MOD09.hdf").unwrap(), "MOD09.h4");
/// ```
pub fn regex_rename(pattern: &str, replacement: &str) -> Result<FilenameTransform, regex::Error> {
    let re = Regex::new(pattern)?;
    let replacement = replacement.to_string();
    Ok(Arc::new(move |name: &str| {
        Ok(re.replace_all(name, replacement.as_str()).into_owned())
    }))
}

/// Accepts names whose start matches a regular expression.
///
/// Matching is anchored at position 0 only, so `MOD` accepts `MOD09.hdf`
/// and `.*` accepts everything, including the empty name.
#[derive(Clone)]
pub struct NameFilter {
    source: String,
    /// `None` accepts every name.
    anchored: Option<Regex>,
}

impl NameFilter {
    /// The pattern used when none is configured.
    pub const MATCH_ALL: &'static str = ".*";

    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let anchored = Regex::new(&format!("^(?:{pattern})"))?;
        Ok(Self {
            source: pattern.to_string(),
            anchored: Some(anchored),
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.anchored.as_ref().map_or(true, |re| re.is_match(name))
    }

    /// The pattern as configured, without the start anchor.
    pub fn pattern(&self) -> &str {
        &self.source
    }
}

impl Default for NameFilter {
    fn default() -> Self {
        Self {
            source: Self::MATCH_ALL.to_string(),
            anchored: None,
        }
    }
}

impl fmt::Debug for NameFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NameFilter").field(&self.source).finish()
    }
}
