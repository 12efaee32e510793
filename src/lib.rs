//! remote-fetch: discover remote files and fetch them into local directories.
//!
//! ## Architecture overview
//!
//! ```text
//!  ┌──────────────┐  DiscoveredItem  ┌─────────────────┐  file_error /
//!  │   source/    │ ───────────────► │ FetchDispatcher │  file_complete
//!  │ static/list/ │   (one by one)   │   (fetch.rs)    │ ───────────────► Reporter
//!  │    feed      │                  └─────────────────┘                 (report.rs)
//!  └──────────────┘
//!         │ Err(DiscoveryError)
//!         ▼
//!       caller
//! ```
//!
//! * **`source/`**: the [`Source`] trait and its three implementations.
//! * **`filter`**: name patterns and filename transforms.
//! * **`fetch`**: the per-file download step and its HTTP implementation.
//! * **`report`**: the [`Reporter`] side channel for per-file outcomes.
//! * **`error`**: [`DiscoveryError`], the only error `trigger` returns.
//! * **`config`**: TOML source definitions for the binary.

pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod report;
pub mod source;
pub mod urls;

pub use error::DiscoveryError;
pub use fetch::{FetchDispatcher, FetchRequest, HttpFetcher};
pub use filter::{FilenameTransform, NameFilter};
pub use report::{CollectingReporter, LogReporter, Reporter};
pub use source::{DiscoveredItem, FeedSource, ListingPageSource, Source, StaticUrlSource};
