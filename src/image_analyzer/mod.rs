//! `[MODULE] ImageAnalyzer` — MIME/size/WebP-classification probe (`§4.6`).

mod cache;
mod probe;

pub use cache::ImageProbeCache;
pub use probe::{ImageProbe, ImageProbeResult, ProbeError, ReqwestImageProbe};

/// WebP classification rule: MIME `image/webp`, or the first bytes form a
/// `RIFF....WEBP` container header — whichever signal is available.
#[must_use]
pub fn is_webp(mime_type: &str, leading_bytes: &[u8]) -> bool {
    if mime_type.eq_ignore_ascii_case("image/webp") {
        return true;
    }
    has_riff_webp_magic(leading_bytes)
}

/// `RIFF` at offset 0, `WEBP` at offset 8 — the 12-byte container header
/// shared by every WebP file regardless of VP8/VP8L/VP8X payload.
#[must_use]
pub fn has_riff_webp_magic(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
}

/// Best-effort MIME sniff from the first bytes of a response body, used
/// when the server didn't send a usable `Content-Type`.
#[must_use]
pub fn sniff_mime_from_magic(bytes: &[u8]) -> Option<&'static str> {
    if has_riff_webp_magic(bytes) {
        return Some("image/webp");
    }
    if bytes.len() >= 8 && bytes[0..8] == [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A] {
        return Some("image/png");
    }
    if bytes.len() >= 3 && bytes[0..3] == [0xFF, 0xD8, 0xFF] {
        return Some("image/jpeg");
    }
    if bytes.len() >= 6 && (&bytes[0..6] == b"GIF87a" || &bytes[0..6] == b"GIF89a") {
        return Some("image/gif");
    }
    if bytes.len() >= 2 && bytes[0..2] == [b'B', b'M'] {
        return Some("image/bmp");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_declared_mime() {
        assert!(is_webp("image/webp", b""));
        assert!(is_webp("IMAGE/WEBP", b""));
    }

    #[test]
    fn classifies_by_magic_bytes_when_mime_is_unhelpful() {
        let mut header = b"RIFF".to_vec();
        header.extend_from_slice(&[0, 0, 0, 0]);
        header.extend_from_slice(b"WEBP");
        assert!(is_webp("application/octet-stream", &header));
    }

    #[test]
    fn rejects_non_webp_signatures() {
        assert!(!is_webp("image/png", &[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn sniffs_common_formats_from_magic() {
        assert_eq!(sniff_mime_from_magic(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]), Some("image/png"));
        assert_eq!(sniff_mime_from_magic(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_mime_from_magic(b"GIF89a"), Some("image/gif"));
        assert_eq!(sniff_mime_from_magic(&[0, 1, 2]), None);
    }
}
