//! The `ImageProbe` seam (`§4.6`): a bounded HEAD-or-partial-GET that
//! never follows redirects, mirroring the crawler's `PageFetcher` seam
//! so the same SSRF posture applies to every outbound request the crawl
//! makes.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, RANGE};
use thiserror::Error;

use super::sniff_mime_from_magic;

/// Bytes read from the body when a magic-byte sniff is needed. Covers
/// every signature in [`super::sniff_mime_from_magic`] with headroom.
const SNIFF_BYTES: usize = 32;

#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error("image request timed out")]
    Timeout,
    #[error("image request failed: {0}")]
    Request(String),
    #[error("server returned status {0}")]
    Status(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageProbeResult {
    pub mime_type: String,
    pub size_bytes: u64,
    pub is_webp: bool,
}

/// Probes a single image URL for its MIME type, size, and WebP status.
pub trait ImageProbe: Send + Sync {
    fn probe(&self, url: &str) -> impl std::future::Future<Output = Result<ImageProbeResult, ProbeError>> + Send;
}

/// `reqwest`-backed [`ImageProbe`]. Redirects are disabled: a probe that
/// needed to follow one is simply reported against whatever the origin
/// server returned directly, never the redirect target.
pub struct ReqwestImageProbe {
    client: reqwest::Client,
}

impl ReqwestImageProbe {
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl ImageProbe for ReqwestImageProbe {
    async fn probe(&self, url: &str) -> Result<ImageProbeResult, ProbeError> {
        let head = self
            .client
            .head(url)
            .send()
            .await
            .map_err(map_reqwest_err)?;

        if !head.status().is_success() {
            return probe_via_ranged_get(&self.client, url).await;
        }

        let content_type = header_str(head.headers(), CONTENT_TYPE);
        let content_length = header_str(head.headers(), CONTENT_LENGTH).and_then(|s| s.parse::<u64>().ok());

        match (content_type, content_length) {
            (Some(mime), Some(size)) if mime_is_conclusive(&mime) => {
                Ok(ImageProbeResult { is_webp: super::is_webp(&mime, &[]), mime_type: mime, size_bytes: size })
            }
            _ => probe_via_ranged_get(&self.client, url).await,
        }
    }
}

async fn probe_via_ranged_get(client: &reqwest::Client, url: &str) -> Result<ImageProbeResult, ProbeError> {
    let resp = client
        .get(url)
        .header(RANGE, format!("bytes=0-{}", SNIFF_BYTES - 1))
        .send()
        .await
        .map_err(map_reqwest_err)?;

    if !resp.status().is_success() && resp.status().as_u16() != 206 {
        return Err(ProbeError::Status(resp.status().as_u16()));
    }

    let declared_mime = header_str(resp.headers(), CONTENT_TYPE);
    let size_bytes = total_size_from_headers(resp.headers());

    let mut leading = Vec::with_capacity(SNIFF_BYTES);
    let mut stream = resp.bytes_stream();
    while leading.len() < SNIFF_BYTES {
        match stream.next().await {
            Some(Ok(chunk)) => leading.extend_from_slice(&chunk),
            Some(Err(e)) => return Err(map_reqwest_err(e)),
            None => break,
        }
    }
    leading.truncate(SNIFF_BYTES);

    let mime_type = declared_mime
        .filter(|m| mime_is_conclusive(m))
        .or_else(|| sniff_mime_from_magic(&leading).map(str::to_owned))
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok(ImageProbeResult {
        is_webp: super::is_webp(&mime_type, &leading),
        size_bytes: size_bytes.unwrap_or(leading.len() as u64),
        mime_type,
    })
}

fn total_size_from_headers(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    if let Some(range) = headers.get(reqwest::header::CONTENT_RANGE).and_then(|v| v.to_str().ok()) {
        if let Some(total) = range.rsplit('/').next() {
            return total.parse().ok();
        }
    }
    header_str(headers, CONTENT_LENGTH).and_then(|s| s.parse().ok())
}

fn header_str(headers: &reqwest::header::HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers.get(name)?.to_str().ok().map(str::to_owned)
}

/// A generic `image/*` (or missing) content-type from `HEAD` isn't
/// conclusive enough to skip sniffing magic bytes for WebP detection.
fn mime_is_conclusive(mime: &str) -> bool {
    !mime.is_empty() && mime != "application/octet-stream" && mime != "binary/octet-stream"
}

fn map_reqwest_err(err: reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout
    } else {
        ProbeError::Request(err.to_string())
    }
}
