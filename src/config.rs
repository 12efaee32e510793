//! TOML configuration for the `remote-fetch` binary.
//!
//! A config file is a list of `[[source]]` tables, each tagged with a
//! `kind`:
//!
//! ```toml
//! [[source]]
//! kind = "static"
//! urls = ["http://example.com/utcpole.dat"]
//! target_dir = "/data/ancillary"
//!
//! [[source]]
//! kind = "listing"
//! name = "modis"
//! url = "http://example.com/MOD09/2024/"
//! target_dir = "/data/modis"
//! name_pattern = "MOD09\\..*\\.hdf"
//! rename = { pattern = "\\.hdf$", replacement = ".h4" }
//!
//! [[source]]
//! kind = "feed"
//! url = "http://example.com/feed.xml"
//! target_dir = "/data/feed"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::filter::{regex_rename, FilenameTransform, NameFilter};
use crate::source::{FeedSource, ListingPageSource, Source, StaticUrlSource};

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(rename = "source", default)]
    pub sources: Vec<SourceConfig>,
}

/// `rename = { pattern = "...", replacement = "..." }`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RenameConfig {
    pub pattern: String,
    pub replacement: String,
}

impl RenameConfig {
    fn build(&self) -> Result<FilenameTransform> {
        regex_rename(&self.pattern, &self.replacement)
            .with_context(|| format!("invalid rename pattern {:?}", self.pattern))
    }
}

fn default_name_pattern() -> String {
    NameFilter::MATCH_ALL.to_string()
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Static {
        name: Option<String>,
        urls: Vec<String>,
        target_dir: PathBuf,
    },
    Listing {
        name: Option<String>,
        url: String,
        target_dir: PathBuf,
        #[serde(default = "default_name_pattern")]
        name_pattern: String,
        rename: Option<RenameConfig>,
    },
    Feed {
        name: Option<String>,
        url: String,
        target_dir: PathBuf,
        rename: Option<RenameConfig>,
    },
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

impl SourceConfig {
    /// The configured `name`, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            SourceConfig::Static { name, .. }
            | SourceConfig::Listing { name, .. }
            | SourceConfig::Feed { name, .. } => name.as_deref(),
        }
    }

    /// Construct the source, sharing `client` for discovery and downloads.
    pub fn build(&self, client: &Client) -> Result<Box<dyn Source>> {
        let source: Box<dyn Source> = match self {
            SourceConfig::Static {
                name,
                urls,
                target_dir,
            } => {
                let mut source = StaticUrlSource::new(urls.iter().cloned(), target_dir.clone())
                    .with_client(client.clone());
                if let Some(name) = name {
                    source = source.with_name(name.clone());
                }
                Box::new(source)
            }
            SourceConfig::Listing {
                name,
                url,
                target_dir,
                name_pattern,
                rename,
            } => {
                let mut source = ListingPageSource::new(url.clone(), target_dir.clone(), name_pattern)
                    .with_context(|| format!("invalid name_pattern {name_pattern:?} for {url}"))?
                    .with_client(client.clone());
                if let Some(rename) = rename {
                    source = source.with_filename_transform(rename.build()?);
                }
                if let Some(name) = name {
                    source = source.with_name(name.clone());
                }
                Box::new(source)
            }
            SourceConfig::Feed {
                name,
                url,
                target_dir,
                rename,
            } => {
                let mut source = FeedSource::new(url.clone(), target_dir.clone()).with_client(client.clone());
                if let Some(rename) = rename {
                    source = source.with_filename_transform(rename.build()?);
                }
                if let Some(name) = name {
                    source = source.with_name(name.clone());
                }
                Box::new(source)
            }
        };
        Ok(source)
    }
}
