//! Discovery-stage errors.
//!
//! These abort a whole `trigger` call. Failures on individual files are
//! never represented here; they go to the [`Reporter`](crate::report::Reporter).

use thiserror::Error;

/// The listing page or feed could not be retrieved or understood.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The server answered with a status other than success (or, for
    /// listing pages, "not found").
    #[error("Status code {status}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The request never produced a usable response.
    #[error("Request failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The body arrived but could not be parsed.
    #[error("Unparseable response: {reason}")]
    Parse { url: String, reason: String },
}

impl DiscoveryError {
    /// The URL of the discovery request that failed.
    pub fn url(&self) -> &str {
        match self {
            DiscoveryError::Status { url, .. }
            | DiscoveryError::Transport { url, .. }
            | DiscoveryError::Parse { url, .. } => url,
        }
    }

    /// Short description, e.g. `Status code 500`.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// The offending URL followed by whatever the response carried.
    pub fn detail(&self) -> String {
        match self {
            DiscoveryError::Status { url, body, .. } => format!("{url}\n\n{body}"),
            DiscoveryError::Transport { url, source } => format!("{url}\n\n{source}"),
            DiscoveryError::Parse { url, reason } => format!("{url}\n\n{reason}"),
        }
    }
}
