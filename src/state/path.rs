//! OS-neutral relative paths for downloaded files
//!
//! A `RelativePath` is a validated list of path segments. It can never be
//! absolute and can never climb out of the directory it is resolved against,
//! no matter where it came from (a site adapter or a snapshot file).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Reasons a relative path is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("relative path has no segments")]
    Empty,

    #[error("relative path contains an empty segment")]
    EmptySegment,

    #[error("relative path segment '{0}' is not allowed")]
    ForbiddenSegment(String),

    #[error("relative path segment '{0}' contains a separator or NUL byte")]
    InvalidCharacter(String),
}

/// A relative path below the output root, stored as plain segments
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct RelativePath {
    segments: Vec<String>,
}

impl RelativePath {
    /// Builds a path from individual segments
    ///
    /// Every segment must be non-empty, must not be `.` or `..` and must not
    /// contain `/`, `\` or a NUL byte.
    pub fn new<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();

        if segments.is_empty() {
            return Err(PathError::Empty);
        }

        for segment in &segments {
            validate_segment(segment)?;
        }

        Ok(Self { segments })
    }

    /// Parses a `/`-separated path such as `ch1/001.jpg`
    pub fn parse(path: &str) -> Result<Self, PathError> {
        Self::new(path.split('/'))
    }

    /// Returns the individual segments
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the last segment (the file name)
    pub fn file_name(&self) -> &str {
        // `new` guarantees at least one segment
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Resolves this path under `root`
    pub fn resolve(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        path.extend(&self.segments);
        path
    }
}

fn validate_segment(segment: &str) -> Result<(), PathError> {
    if segment.is_empty() {
        return Err(PathError::EmptySegment);
    }

    if segment == "." || segment == ".." {
        return Err(PathError::ForbiddenSegment(segment.to_string()));
    }

    if segment.contains(['/', '\\', '\0']) {
        return Err(PathError::InvalidCharacter(segment.to_string()));
    }

    Ok(())
}

impl TryFrom<Vec<String>> for RelativePath {
    type Error = PathError;

    fn try_from(segments: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(segments)
    }
}

impl From<RelativePath> for Vec<String> {
    fn from(path: RelativePath) -> Self {
        path.segments
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}
