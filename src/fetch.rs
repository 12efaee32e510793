//! The shared per-file fetch step.
//!
//! Every source ends up here once per discovered item. A
//! [`FetchDispatcher`] never fails its caller: whatever goes wrong with one
//! file is handed to the [`Reporter`] and the source moves on.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::filter::FilenameTransform;
use crate::report::Reporter;
use crate::urls::filename_from_url;

/// One discovered item, ready to be fetched.
#[derive(Clone, Copy)]
pub struct FetchRequest<'a> {
    /// Absolute URL of the file.
    pub url: &'a str,
    /// Name as discovered (URL segment, anchor text, feed title). May be
    /// empty, in which case the last segment of `url` is used.
    pub target_name: &'a str,
    pub target_dir: &'a Path,
    /// When `false`, an existing file under the resolved name is left as is.
    pub override_existing: bool,
    pub filename_transform: Option<&'a FilenameTransform>,
}

/// Performs the transfer and storage of a single item.
///
/// Implementations must report every failure through
/// [`Reporter::file_error`] instead of panicking or returning it.
pub trait FetchDispatcher: Send + Sync {
    fn fetch(&self, request: &FetchRequest<'_>, reporter: &mut dyn Reporter);
}

/// Why a single file was not stored.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Status code {status}")]
    Status { status: u16, body: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Filename transform failed for {name:?}")]
    Transform { name: String, reason: String },

    #[error("Unusable target filename {0:?}")]
    InvalidName(String),
}

impl FetchError {
    /// Extra context for [`Reporter::file_error`].
    pub fn detail(&self) -> String {
        match self {
            FetchError::Status { body, .. } => body.clone(),
            FetchError::Transform { reason, .. } => reason.clone(),
            FetchError::Transport(e) => e.to_string(),
            FetchError::Io { source, .. } => source.to_string(),
            FetchError::InvalidName(_) => String::new(),
        }
    }
}

/// Work out the filename an item is stored under.
///
/// An empty discovered name falls back to the last URL segment, then the
/// transform (if any) is applied. The result must be a single, non-empty
/// path component.
pub fn resolve_target_name(request: &FetchRequest<'_>) -> Result<String, FetchError> {
    let discovered = if request.target_name.is_empty() {
        filename_from_url(request.url)
    } else {
        request.target_name
    };

    let name = match request.filename_transform {
        Some(transform) => transform(discovered).map_err(|e| FetchError::Transform {
            name: discovered.to_string(),
            reason: format!("{e:#}"),
        })?,
        None => discovered.to_string(),
    };

    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(FetchError::InvalidName(name));
    }
    Ok(name)
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Streams files over HTTP into the target directory.
///
/// The body is written to a temporary file next to the destination and
/// renamed into place once complete, so a partial download never shows up
/// under the real name.
#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn download(&self, url: &str, dir: &Path, dest: &Path) -> Result<u64, FetchError> {
        let mut response = self.client.get(url).send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            debug!(url, %status, body = %body, "Received error response");
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        fs::create_dir_all(dir).map_err(|source| FetchError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let io_err = |source| FetchError::Io {
            path: dest.to_path_buf(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        let written = io::copy(&mut response, tmp.as_file_mut()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(dest).map_err(|e| io_err(e.error))?;

        Ok(written)
    }
}

impl FetchDispatcher for HttpFetcher {
    fn fetch(&self, request: &FetchRequest<'_>, reporter: &mut dyn Reporter) {
        let url = request.url;

        let name = match resolve_target_name(request) {
            Ok(name) => name,
            Err(e) => {
                reporter.file_error(url, &e.to_string(), &e.detail());
                return;
            }
        };

        let dest = request.target_dir.join(&name);
        if !request.override_existing && dest.exists() {
            debug!(url, path = %dest.display(), "Already fetched, skipping");
            return;
        }

        match self.download(url, request.target_dir, &dest) {
            Ok(bytes) => {
                debug!(url, path = %dest.display(), bytes, "Download complete");
                reporter.file_complete(url, &name, &dest);
            }
            Err(e) => reporter.file_error(url, &e.to_string(), &e.detail()),
        }
    }
}
