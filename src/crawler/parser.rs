//! Link extraction capability and its HTML implementation
//!
//! [`HtmlLinkExtractor`] parses fetched pages with scraper and returns the
//! absolute URLs of links worth following.

use crate::crawler::task::{ExtractError, Page};
use scraper::{Html, Selector};
use url::Url;

/// Extracts candidate URLs from a fetched page
///
/// Returned URLs must be absolute; the crawler normalizes them and drops any
/// it cannot parse.
pub trait LinkExtractor: Send + Sync {
    fn extract_links(&self, page: &Page) -> Result<Vec<String>, ExtractError>;
}

/// HTML link extractor
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links (same page anchors)
///
/// Relative links resolve against `<base href>` when present, otherwise
/// against the page's final URL. Non-HTML pages yield no links.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlLinkExtractor;

impl LinkExtractor for HtmlLinkExtractor {
    fn extract_links(&self, page: &Page) -> Result<Vec<String>, ExtractError> {
        if !page.is_html() {
            return Ok(Vec::new());
        }

        parse_links(&page.body, &page.final_url)
    }
}

/// Parses HTML content and extracts absolute link URLs
///
/// # Errors
///
/// Fails when the document declares a `<base href>` that cannot be resolved.
///
/// # Example
///
/// ```
/// use sumi_crawl::crawler::parse_links;
/// use url::Url;
///
/// let html = r#"<html><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let links = parse_links(html, &base_url).unwrap();
/// assert_eq!(links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_links(html: &str, page_url: &Url) -> Result<Vec<String>, ExtractError> {
    let document = Html::parse_document(html);
    let base_url = document_base(&document, page_url)?;

    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(absolute_url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, &base_url))
            {
                links.push(absolute_url);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(absolute_url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, &base_url))
            {
                links.push(absolute_url);
            }
        }
    }

    Ok(links)
}

/// Returns the URL relative links resolve against
fn document_base(document: &Html, page_url: &Url) -> Result<Url, ExtractError> {
    let base_href = Selector::parse("base[href]").ok().and_then(|selector| {
        document
            .select(&selector)
            .next()
            .and_then(|element| element.value().attr("href"))
            .map(str::to_string)
    });

    match base_href {
        Some(href) => page_url
            .join(href.trim())
            .map_err(|e| ExtractError(format!("invalid <base href=\"{}\">: {}", href, e))),
        None => Ok(page_url.clone()),
    }
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded.
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url.to_string()),
        _ => None,
    }
}
