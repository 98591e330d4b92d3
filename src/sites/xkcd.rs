use crate::crawler::parser::{attr, require_link, select_first};
use crate::sites::{url_extension, Crawler, ExtractError};
use crate::state::{FileJob, PageJob, RelativePath};
use scraper::Html;
use url::Url;

/// Comic 404 intentionally does not exist
const MISSING_COMIC: u32 = 404;

/// xkcd.com
///
/// Starting from any comic, the crawl hops to the front page (the newest
/// comic) and from there enqueues every comic number up to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xkcd;

/// Path of the canonical comic URL, e.g. "2228" for https://xkcd.com/2228/
fn canonical_path(document: &Html) -> Result<String, ExtractError> {
    let meta = select_first(document, r#"meta[property="og:url"]"#)?;
    let content = attr(meta, "content")?;
    let url = Url::parse(content).map_err(|_| ExtractError::InvalidUrl(content.to_string()))?;
    Ok(url.path().trim_matches('/').to_string())
}

impl Crawler for Xkcd {
    fn name(&self) -> &'static str {
        "xkcd"
    }

    fn domain(&self) -> &str {
        "xkcd.com"
    }

    fn extract_pages(&self, document: &Html, page_url: &Url) -> Result<Vec<PageJob>, ExtractError> {
        let next = attr(select_first(document, r#"a[rel="next"]"#)?, "href")?;

        if next != "#" {
            return Ok(vec![PageJob::new(require_link("/", page_url)?)]);
        }

        let newest = canonical_path(document)?;
        let newest: u32 = newest
            .parse()
            .map_err(|_| ExtractError::Unexpected(format!("'{}' is not a comic number", newest)))?;

        (1..newest)
            .filter(|number| *number != MISSING_COMIC)
            .map(|number| require_link(&format!("/{}/", number), page_url).map(PageJob::new))
            .collect()
    }

    fn extract_files(&self, document: &Html, page_url: &Url) -> Result<Vec<FileJob>, ExtractError> {
        let img = select_first(document, "div#comic img")?;
        let image_url = require_link(attr(img, "src")?, page_url)?;
        let name = format!("{}{}", canonical_path(document)?, url_extension(&image_url));

        Ok(vec![FileJob::new(image_url, RelativePath::new([name])?)])
    }
}
