//! Job definitions for the crawl queue
//!
//! Jobs are plain values: two jobs are the same job when they are the same
//! variant and every field matches.

use crate::state::RelativePath;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Fetch a page, parse it and discover more jobs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageJob {
    pub url: Url,
}

/// Fetch a file and write its bytes to `path` below the output root
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileJob {
    pub url: Url,
    pub path: RelativePath,
}

/// One unit of crawl work
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    Page(PageJob),
    File(FileJob),
}

impl PageJob {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

impl FileJob {
    pub fn new(url: Url, path: RelativePath) -> Self {
        Self { url, path }
    }
}

impl Job {
    /// The URL this job fetches
    pub fn url(&self) -> &Url {
        match self {
            Self::Page(page) => &page.url,
            Self::File(file) => &file.url,
        }
    }

    /// Returns the page job, if this is one
    pub fn as_page(&self) -> Option<&PageJob> {
        match self {
            Self::Page(page) => Some(page),
            Self::File(_) => None,
        }
    }
}

impl From<PageJob> for Job {
    fn from(page: PageJob) -> Self {
        Self::Page(page)
    }
}

impl From<FileJob> for Job {
    fn from(file: FileJob) -> Self {
        Self::File(file)
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(page) => write!(f, "PageJob({})", page.url),
            Self::File(file) => write!(f, "FileJob(url={}, path={})", file.url, file.path),
        }
    }
}
