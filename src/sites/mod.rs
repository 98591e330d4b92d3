//! Crawler variants and their registry
//!
//! A crawler variant is a small set of pure functions bound to a host: given a
//! parsed page it says which further pages to visit and which files to
//! download. Variants hold no state; the engine does all I/O.
//!
//! # Dispatch
//!
//! The `CrawlerRegistry` keeps variants in registration order and hands out
//! the first one whose `matches` accepts a URL.

mod islieb;
mod mangareader;
mod mangatown;
mod xkcd;

pub use islieb::Islieb;
pub use mangareader::MangaReader;
pub use mangatown::MangaTown;
pub use xkcd::Xkcd;

use crate::state::{FileJob, PageJob, PathError, QueueState};
use crate::ComicError;
use reqwest::header::HeaderMap;
use scraper::Html;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Errors raised by extraction functions
///
/// These are permanent failures of a single page; "no next page" is never
/// one of them, it is simply an empty result.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("missing element '{0}'")]
    MissingElement(String),

    #[error("<{element}> has no '{attribute}' attribute")]
    MissingAttribute { element: String, attribute: String },

    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    #[error("unusable link '{0}'")]
    InvalidUrl(String),

    #[error("invalid file path: {0}")]
    InvalidPath(#[from] PathError),

    #[error("unexpected page content: {0}")]
    Unexpected(String),
}

/// Site-specific extraction logic
pub trait Crawler: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Host pattern this crawler is responsible for
    ///
    /// `*.example.com` matches `example.com` and all of its subdomains.
    fn domain(&self) -> &str;

    /// Returns whether this crawler handles `url`
    fn matches(&self, url: &Url) -> bool {
        url.host_str()
            .map(|host| host_matches(self.domain(), &host.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    /// Pages to visit next, in crawl order
    fn extract_pages(&self, document: &Html, page_url: &Url) -> Result<Vec<PageJob>, ExtractError>;

    /// Files referenced by the page, in page order
    fn extract_files(&self, document: &Html, page_url: &Url) -> Result<Vec<FileJob>, ExtractError>;

    /// Page a resumed crawl must restart from, regardless of the snapshot
    ///
    /// `None` leaves the choice to the engine (first pending page).
    fn resume_page(&self, _state: &QueueState) -> Option<PageJob> {
        None
    }

    /// Headers sent with every request of this crawler
    fn headers(&self) -> HeaderMap {
        HeaderMap::new()
    }
}

/// Checks if a host matches a pattern
///
/// `example.com` matches only itself; `*.example.com` matches `example.com`
/// and any subdomain of it.
pub fn host_matches(pattern: &str, host: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => host == base || host.ends_with(&format!(".{}", base)),
        None => host == pattern,
    }
}

/// Extension of the last URL path segment including the dot, or ""
pub(crate) fn url_extension(url: &Url) -> String {
    Path::new(url.path())
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}

/// Ordered set of crawler variants
#[derive(Clone, Default)]
pub struct CrawlerRegistry {
    crawlers: Vec<Arc<dyn Crawler>>,
}

impl CrawlerRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every built-in site
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register(Xkcd)
            .register(Islieb)
            .register(MangaTown)
            .register(MangaReader);
        registry
    }

    /// Appends a crawler; earlier registrations win on overlap
    pub fn register<C: Crawler + 'static>(&mut self, crawler: C) -> &mut Self {
        self.crawlers.push(Arc::new(crawler));
        self
    }

    /// Finds the crawler responsible for `url`
    ///
    /// # Returns
    ///
    /// * `Ok(Arc<dyn Crawler>)` - The first registered crawler that matches
    /// * `Err(ComicError::NoCrawlerAvailable)` - No crawler matches
    pub fn find_crawler(&self, url: &Url) -> crate::Result<Arc<dyn Crawler>> {
        self.crawlers
            .iter()
            .find(|crawler| crawler.matches(url))
            .cloned()
            .ok_or_else(|| ComicError::NoCrawlerAvailable {
                host: url.host_str().unwrap_or(url.as_str()).to_string(),
            })
    }

    /// Names of the registered crawlers, in order
    pub fn names(&self) -> Vec<&'static str> {
        self.crawlers.iter().map(|crawler| crawler.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.crawlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crawlers.is_empty()
    }
}
