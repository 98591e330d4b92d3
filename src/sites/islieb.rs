use crate::crawler::parser::{attr, require_link, resolve_link, selector};
use crate::sites::{Crawler, ExtractError};
use crate::state::{FileJob, PageJob, QueueState, RelativePath};
use scraper::Html;
use url::Url;

const ARCHIVE_PAGE: &str = "https://islieb.de/comic-archiv/";

/// islieb.de
///
/// Every page links back to the archive, which lists every comic. A resumed
/// crawl always restarts at the archive so newly published comics are found.
#[derive(Debug, Clone, Copy, Default)]
pub struct Islieb;

impl Crawler for Islieb {
    fn name(&self) -> &'static str {
        "islieb"
    }

    fn domain(&self) -> &str {
        "islieb.de"
    }

    fn extract_pages(&self, document: &Html, page_url: &Url) -> Result<Vec<PageJob>, ExtractError> {
        let mut pages = vec![PageJob::new(require_link(ARCHIVE_PAGE, page_url)?)];

        let archive = selector("ul#lcp_instance_0")?;
        let links = selector("a[href]")?;
        if let Some(list) = document.select(&archive).next() {
            pages.extend(
                list.select(&links)
                    .filter_map(|a| a.value().attr("href"))
                    .filter_map(|href| resolve_link(href, page_url))
                    .map(PageJob::new),
            );
        }

        Ok(pages)
    }

    fn extract_files(&self, document: &Html, page_url: &Url) -> Result<Vec<FileJob>, ExtractError> {
        let articles = selector("article")?;
        let img = selector("img")?;

        let mut files = Vec::new();
        for article in document.select(&articles) {
            let image = article
                .select(&img)
                .next()
                .ok_or_else(|| ExtractError::MissingElement("article img".to_string()))?;
            let url = require_link(attr(image, "src")?, page_url)?;

            // Uploads live under .../<year>/<month>/<name>
            let segments: Vec<&str> = url
                .path_segments()
                .map(|segments| segments.collect())
                .unwrap_or_default();
            let start = segments.len().saturating_sub(3);
            let path = RelativePath::new(segments[start..].iter().copied())?;

            files.push(FileJob::new(url, path));
        }

        Ok(files)
    }

    fn resume_page(&self, _state: &QueueState) -> Option<PageJob> {
        Url::parse(ARCHIVE_PAGE).ok().map(PageJob::new)
    }
}
