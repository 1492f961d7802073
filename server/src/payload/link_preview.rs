//! Link previews for text messages containing a URL.
//!
//! Pages are fetched with a bounded timeout and a body-size cap. Every hop,
//! redirects included, must resolve to a public address and the connection
//! is pinned to the address that was checked. Title and description come
//! from the parsed HTML head.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{HeaderMap, LOCATION};
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::ssrf::{self, AddressError};
use super::types::LinkPreview;

/// Maximum bytes of a page read when looking for metadata.
pub const MAX_PREVIEW_BYTES: usize = 512 * 1024;

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 10;

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(http|https)://[^\s/$.?#].[^\s]*").expect("valid regex")
});

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Refused address: {0}")]
    Address(#[from] AddressError),
    #[error("Unexpected status {0}")]
    Status(u16),
    #[error("Redirect {0} without a usable Location")]
    Redirect(u16),
    #[error("More than {MAX_REDIRECTS} redirects")]
    TooManyRedirects,
    #[error("Page has no title or description")]
    Empty,
}

/// Whether `text` contains an http(s) URL.
pub fn contains_url(text: &str) -> bool {
    URL.is_match(text)
}

/// First http(s) URL in `text`.
pub fn first_url(text: &str) -> Option<&str> {
    URL.find(text).map(|m| m.as_str())
}

/// Title and description found in an HTML document.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PageMeta {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Extract title and description.
///
/// Title prefers `og:title` over the head `<title>`; description prefers
/// `og:description` over `description`.
pub fn parse_page_meta(html: &str) -> PageMeta {
    let doc = Html::parse_document(html);

    let title = meta_content(&doc, r#"meta[property="og:title"]"#).or_else(|| {
        let selector = Selector::parse("head > title").ok()?;
        doc.select(&selector)
            .map(|el| el.text().collect::<String>())
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty())
    });
    let description = meta_content(&doc, r#"meta[property="og:description"]"#)
        .or_else(|| meta_content(&doc, r#"meta[name="description"]"#));

    PageMeta { title, description }
}

/// First non-empty `content` of the elements matching `selector`.
fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(str::to_string)
}

/// Where a redirect response points, relative to the URL that produced it.
fn redirect_target(current: &Url, status: u16, headers: &HeaderMap) -> Result<Url, PreviewError> {
    headers
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|location| current.join(location).ok())
        .ok_or(PreviewError::Redirect(status))
}

/// Fetches pages for link previews.
#[derive(Debug, Clone)]
pub struct LinkPreviewFetcher {
    timeout: Duration,
}

impl LinkPreviewFetcher {
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Fetch `url` and build its preview.
    pub async fn fetch(&self, url: &str) -> Result<LinkPreview, PreviewError> {
        let mut target = Url::parse(url).map_err(AddressError::from)?;

        for _ in 0..=MAX_REDIRECTS {
            let resp = self.get(&target).await?;
            if !resp.status().is_redirection() {
                return read_preview(url, resp).await;
            }
            let next = redirect_target(&target, resp.status().as_u16(), resp.headers())?;
            debug!(from = %target, to = %next, "Following link preview redirect");
            target = next;
        }

        Err(PreviewError::TooManyRedirects)
    }

    /// Single GET against a verified public address, redirects not followed.
    async fn get(&self, target: &Url) -> Result<reqwest::Response, PreviewError> {
        let public = ssrf::resolve_public(target).await?;
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .resolve(&public.host, public.addr)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(client.get(target.clone()).send().await?)
    }
}

async fn read_preview(url: &str, mut resp: reqwest::Response) -> Result<LinkPreview, PreviewError> {
    if resp.status() != reqwest::StatusCode::OK {
        return Err(PreviewError::Status(resp.status().as_u16()));
    }

    let mut body = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        let room = MAX_PREVIEW_BYTES - body.len();
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if body.len() >= MAX_PREVIEW_BYTES {
            debug!(url, "Link preview body truncated");
            break;
        }
    }

    let meta = parse_page_meta(&String::from_utf8_lossy(&body));
    if meta.title.is_none() && meta.description.is_none() {
        return Err(PreviewError::Empty);
    }

    Ok(LinkPreview {
        url: url.to_string(),
        title: meta.title,
        description: meta.description,
    })
}
