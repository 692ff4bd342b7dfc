//! Category bucketing (`§4.7`): first-match-wins regex classification
//! over an image's URL and alt text, in a fixed priority order.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageCategory {
    HeroAndBanners,
    ProductImages,
    Thumbnails,
    Icons,
    Backgrounds,
    Other,
}

impl ImageCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HeroAndBanners => "Hero & Banners",
            Self::ProductImages => "Product Images",
            Self::Thumbnails => "Thumbnails",
            Self::Icons => "Icons",
            Self::Backgrounds => "Backgrounds",
            Self::Other => "Other",
        }
    }
}

static RULES: Lazy<Vec<(ImageCategory, Regex)>> = Lazy::new(|| {
    let patterns: &[(ImageCategory, &str)] = &[
        (ImageCategory::HeroAndBanners, r"(?i)hero|banner|billboard|jumbotron"),
        (ImageCategory::ProductImages, r"(?i)product|sku|catalog|item[-_]?\d"),
        (ImageCategory::Thumbnails, r"(?i)thumb|thumbnail|preview|small"),
        (ImageCategory::Icons, r"(?i)icon|favicon|glyph|sprite"),
        (ImageCategory::Backgrounds, r"(?i)bg[-_]|background|backdrop|texture"),
    ];
    patterns
        .iter()
        .map(|(category, pattern)| (*category, Regex::new(pattern).expect("valid category regex")))
        .collect()
});

/// Classify an image by URL and (optional) alt text. The image URL and
/// alt text are checked together against each rule in priority order;
/// the first match wins. No match falls through to [`ImageCategory::Other`].
#[must_use]
pub fn categorize(image_url: &str, alt_text: Option<&str>) -> ImageCategory {
    let haystack = match alt_text {
        Some(alt) => format!("{image_url} {alt}"),
        None => image_url.to_string(),
    };
    for (category, pattern) in RULES.iter() {
        if pattern.is_match(&haystack) {
            return *category;
        }
    }
    ImageCategory::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_hero_banners_first() {
        assert_eq!(categorize("https://example.test/hero-banner.png", None), ImageCategory::HeroAndBanners);
    }

    #[test]
    fn matches_product_images() {
        assert_eq!(categorize("https://example.test/images/product-123.jpg", None), ImageCategory::ProductImages);
    }

    #[test]
    fn falls_back_to_alt_text() {
        assert_eq!(categorize("https://example.test/img/7f2a.jpg", Some("site icon")), ImageCategory::Icons);
    }

    #[test]
    fn unmatched_is_other() {
        assert_eq!(categorize("https://example.test/random.jpg", None), ImageCategory::Other);
    }

    #[test]
    fn priority_order_prefers_earlier_rule_on_ambiguous_input() {
        // Contains both a hero/banner term and a product term; hero wins.
        assert_eq!(categorize("https://example.test/hero-product-banner.png", None), ImageCategory::HeroAndBanners);
    }
}
