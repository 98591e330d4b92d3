use crate::crawler::parser::{attr, require_link, select_first, selector, text};
use crate::sites::{url_extension, Crawler, ExtractError};
use crate::state::{FileJob, PageJob, RelativePath};
use scraper::Html;
use url::Url;

/// www.mangareader.net
///
/// One image per page. Pages of the current chapter come first, then the
/// chapter links, oldest first, so a single worker reads chapters in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct MangaReader;

impl Crawler for MangaReader {
    fn name(&self) -> &'static str {
        "mangareader"
    }

    fn domain(&self) -> &str {
        "www.mangareader.net"
    }

    fn extract_pages(&self, document: &Html, page_url: &Url) -> Result<Vec<PageJob>, ExtractError> {
        let options = selector("option")?;
        let links = selector("a")?;

        let menu = select_first(document, "#pageMenu")?;
        let chapters = select_first(document, "#mangainfofooter table")?;

        let mut hrefs: Vec<&str> = menu
            .select(&options)
            .map(|option| attr(option, "value"))
            .collect::<Result<_, _>>()?;
        let chapter_links: Vec<&str> = chapters
            .select(&links)
            .map(|a| attr(a, "href"))
            .collect::<Result<_, _>>()?;
        hrefs.extend(chapter_links.into_iter().rev());

        hrefs
            .into_iter()
            .map(|href| require_link(href, page_url).map(PageJob::new))
            .collect()
    }

    fn extract_files(&self, document: &Html, page_url: &Url) -> Result<Vec<FileJob>, ExtractError> {
        let Some(img) = document.select(&selector("img#img")?).next() else {
            return Ok(vec![]);
        };

        let url = require_link(attr(img, "src")?, page_url)?;
        let chapter = text(select_first(document, "#mangainfo h1")?);
        let file = format!("{}{}", attr(img, "alt")?, url_extension(&url));

        Ok(vec![FileJob::new(url, RelativePath::new([chapter, file])?)])
    }
}
