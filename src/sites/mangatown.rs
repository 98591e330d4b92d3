use crate::crawler::parser::{attr, require_link, select_first, selector};
use crate::sites::{Crawler, ExtractError};
use crate::state::{FileJob, PageJob, RelativePath};
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use scraper::{Html, Selector};
use url::Url;

/// www.mangatown.com
///
/// Image requests are refused without a referer from the site itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct MangaTown;

fn main_image() -> Result<Selector, ExtractError> {
    selector("img.image, img#image")
}

impl Crawler for MangaTown {
    fn name(&self) -> &'static str {
        "mangatown"
    }

    fn domain(&self) -> &str {
        "www.mangatown.com"
    }

    fn extract_pages(&self, document: &Html, page_url: &Url) -> Result<Vec<PageJob>, ExtractError> {
        let menu = select_first(document, "div.go_page")?;
        let options = selector("option")?;

        menu.select(&options)
            .map(|option| require_link(attr(option, "value")?, page_url).map(PageJob::new))
            .collect()
    }

    fn extract_files(&self, document: &Html, page_url: &Url) -> Result<Vec<FileJob>, ExtractError> {
        let mut files = Vec::new();

        for img in document.select(&main_image()?) {
            let url = require_link(attr(img, "src")?, page_url)?;

            // .../<chapter>/compressed/<file>
            let segments: Vec<&str> = url
                .path_segments()
                .map(|segments| segments.collect())
                .unwrap_or_default();
            if segments.len() < 3 {
                return Err(ExtractError::Unexpected(format!(
                    "image URL {} has no chapter directory",
                    url
                )));
            }
            let chapter = segments[segments.len() - 3];
            let file = segments[segments.len() - 1];
            let path = RelativePath::new([chapter, file])?;

            files.push(FileJob::new(url, path));
        }

        Ok(files)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static("https://www.mangatown.com/"));
        headers
    }
}
