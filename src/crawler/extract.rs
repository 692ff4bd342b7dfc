//! Anchor and image-source extraction (`§4.5` step 5) via `scraper`
//! (the teacher's HTML-parsing dependency of choice, already used for
//! its own page-content extraction).

use scraper::{Html, Selector};
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedImage {
    pub url: String,
    pub alt_text: Option<String>,
}

/// Same-origin anchor targets, absolutized against `base` and stripped
/// of fragments. Cross-origin links are dropped: `§2`'s non-goal of
/// cross-origin crawling rules them out of the frontier entirely.
#[must_use]
pub fn extract_same_origin_links(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("static selector is valid");

    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .filter(|resolved| resolved.origin() == base.origin())
        .filter(|resolved| matches!(resolved.scheme(), "http" | "https"))
        .map(|mut resolved| {
            resolved.set_fragment(None);
            resolved.into()
        })
        .collect()
}

/// Image sources from `img[src]`, `img[srcset]` (first candidate),
/// `picture > source[srcset]`, and inline `style="background-image:
/// url(...)"` declarations, absolutized against `base`.
#[must_use]
pub fn extract_images(html: &str, base: &Url) -> Vec<ExtractedImage> {
    let document = Html::parse_document(html);
    let mut images = Vec::new();

    let img_selector = Selector::parse("img").expect("static selector is valid");
    for el in document.select(&img_selector) {
        let alt_text = el.value().attr("alt").map(str::to_string);
        if let Some(src) = el.value().attr("src") {
            push_resolved(&mut images, base, src, alt_text.clone());
        }
        if let Some(srcset) = el.value().attr("srcset") {
            if let Some(first) = first_srcset_candidate(srcset) {
                push_resolved(&mut images, base, first, alt_text);
            }
        }
    }

    let source_selector = Selector::parse("picture source[srcset]").expect("static selector is valid");
    for el in document.select(&source_selector) {
        if let Some(srcset) = el.value().attr("srcset") {
            if let Some(first) = first_srcset_candidate(srcset) {
                push_resolved(&mut images, base, first, None);
            }
        }
    }

    let styled_selector = Selector::parse("[style]").expect("static selector is valid");
    for el in document.select(&styled_selector) {
        if let Some(style) = el.value().attr("style") {
            if let Some(url) = extract_css_background_url(style) {
                push_resolved(&mut images, base, &url, None);
            }
        }
    }

    images
}

fn push_resolved(images: &mut Vec<ExtractedImage>, base: &Url, raw: &str, alt_text: Option<String>) {
    if let Ok(resolved) = base.join(raw) {
        images.push(ExtractedImage { url: resolved.into(), alt_text });
    }
}

fn first_srcset_candidate(srcset: &str) -> Option<&str> {
    srcset.split(',').next().map(str::trim).and_then(|candidate| candidate.split_whitespace().next())
}

fn extract_css_background_url(style: &str) -> Option<String> {
    let idx = style.find("background-image").or_else(|| style.find("background"))?;
    let rest = &style[idx..];
    let start = rest.find("url(")? + 4;
    let end = rest[start..].find(')')? + start;
    let raw = rest[start..end].trim().trim_matches(['"', '\'']);
    if raw.is_empty() { None } else { Some(raw.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.test/page").unwrap()
    }

    #[test]
    fn extracts_same_origin_links_and_drops_cross_origin() {
        let html = r#"<a href="/about">About</a><a href="https://other.test/x">Other</a>"#;
        let links = extract_same_origin_links(html, &base());
        assert_eq!(links, vec!["https://example.test/about".to_string()]);
    }

    #[test]
    fn strips_fragments_from_links() {
        let html = r#"<a href="/page#section">Jump</a>"#;
        let links = extract_same_origin_links(html, &base());
        assert_eq!(links, vec!["https://example.test/page".to_string()]);
    }

    #[test]
    fn extracts_img_src_with_alt_text() {
        let html = r#"<img src="/hero.png" alt="Hero banner">"#;
        let images = extract_images(html, &base());
        assert_eq!(images, vec![ExtractedImage { url: "https://example.test/hero.png".into(), alt_text: Some("Hero banner".into()) }]);
    }

    #[test]
    fn extracts_first_srcset_candidate() {
        let html = r#"<img srcset="/small.jpg 480w, /large.jpg 1080w">"#;
        let images = extract_images(html, &base());
        assert_eq!(images[0].url, "https://example.test/small.jpg");
    }

    #[test]
    fn extracts_css_background_image() {
        let html = r#"<div style="background-image: url('/bg.png');"></div>"#;
        let images = extract_images(html, &base());
        assert_eq!(images[0].url, "https://example.test/bg.png");
    }
}
