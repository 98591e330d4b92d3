//! HTML helpers for crawler extraction functions
//!
//! This module handles parsing fetched pages into a queryable document and the
//! small lookups every site adapter needs:
//! - Compiling CSS selectors
//! - Finding required elements and attributes (missing ones are errors)
//! - Resolving links against the page URL

use crate::sites::ExtractError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Parses a fetched page into a document
///
/// HTML parsing itself never fails; invalid UTF-8 is replaced.
pub fn parse_document(body: &[u8]) -> Html {
    Html::parse_document(&String::from_utf8_lossy(body))
}

/// Compiles a CSS selector
pub fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector {
        selector: css.to_string(),
        message: format!("{:?}", e),
    })
}

/// Returns the first element matching `css`, or an error if there is none
pub fn select_first<'a>(document: &'a Html, css: &str) -> Result<ElementRef<'a>, ExtractError> {
    let selector = selector(css)?;
    document
        .select(&selector)
        .next()
        .ok_or_else(|| ExtractError::MissingElement(css.to_string()))
}

/// Returns an attribute of an element, or an error if it is absent
pub fn attr<'a>(element: ElementRef<'a>, name: &str) -> Result<&'a str, ExtractError> {
    element
        .value()
        .attr(name)
        .ok_or_else(|| ExtractError::MissingAttribute {
            element: element.value().name().to_string(),
            attribute: name.to_string(),
        })
}

/// Returns the trimmed text content of an element
pub fn text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url),
        _ => None,
    }
}

/// Like `resolve_link`, but an unusable link is an error
pub fn require_link(href: &str, base_url: &Url) -> Result<Url, ExtractError> {
    resolve_link(href, base_url).ok_or_else(|| ExtractError::InvalidUrl(href.to_string()))
}
