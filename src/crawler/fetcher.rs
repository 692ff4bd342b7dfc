//! The `PageFetcher` seam (`§4.5` design note): the browser-rendering
//! engine is an external collaborator, so the crawler depends on this
//! trait rather than a concrete headless browser. [`ReqwestPageFetcher`]
//! provides the plain-HTTP implementation this crate actually ships.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PageError {
    #[error("page request timed out")]
    Timeout,
    #[error("page request failed: {0}")]
    Request(String),
    #[error("server returned status {0}")]
    Status(u16),
    #[error("response was not HTML (content-type: {0})")]
    NotHtml(String),
    #[error("response body exceeded the size limit")]
    TooLarge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub final_url: String,
    pub status: u16,
    pub html: String,
    /// `true` if the server responded with a redirect (3xx) to a
    /// different URL — the crawler treats this as a login/redirect
    /// heuristic skip rather than following it.
    pub was_redirected: bool,
}

/// Fetches one page's HTML body. Implementations should not follow
/// redirects themselves — [`FetchedPage::was_redirected`] lets the
/// crawler apply its own login/redirect heuristics.
pub trait PageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl std::future::Future<Output = Result<FetchedPage, PageError>> + Send;
}

const MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

pub struct ReqwestPageFetcher {
    client: reqwest::Client,
}

impl ReqwestPageFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl PageFetcher for ReqwestPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, PageError> {
        let resp = self.client.get(url).send().await.map_err(map_reqwest_err)?;
        let status = resp.status();
        let was_redirected = status.is_redirection();

        if !status.is_success() && !was_redirected {
            return Err(PageError::Status(status.as_u16()));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !was_redirected && !content_type.contains("html") && !content_type.is_empty() {
            return Err(PageError::NotHtml(content_type));
        }

        if let Some(len) = resp.content_length() {
            if len > MAX_BODY_BYTES {
                return Err(PageError::TooLarge);
            }
        }

        let final_url = resp.url().to_string();
        let html = resp.text().await.map_err(map_reqwest_err)?;
        if html.len() as u64 > MAX_BODY_BYTES {
            return Err(PageError::TooLarge);
        }

        Ok(FetchedPage { final_url, status: status.as_u16(), html, was_redirected })
    }
}

fn map_reqwest_err(err: reqwest::Error) -> PageError {
    if err.is_timeout() {
        PageError::Timeout
    } else {
        PageError::Request(err.to_string())
    }
}
