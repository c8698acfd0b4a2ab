use scraper::{Html, Selector};
use tracing::warn;

use super::media::is_media_url;

/// Signature of a third-party embedding-protection service; sources carrying
/// it cannot be scanned and are skipped.
pub const PROTECTION_MARKER: &str = "incapsula";

pub fn is_protected(url: &str) -> bool {
    url.to_lowercase().contains(PROTECTION_MARKER)
}

/// Media sources declared directly in a document's markup. Both kinds are
/// reported independently: the extractor may transcribe the video and the
/// iframe in the same pass.
#[derive(Debug, Default, PartialEq)]
pub struct EmbeddedMedia {
    /// First `<video>` src that is unprotected and a recognized media file.
    pub video: Option<String>,
    /// First `<iframe>` src that is unprotected. Whether it points at a
    /// direct media file is re-validated at transcription time.
    pub iframe: Option<String>,
}

impl EmbeddedMedia {
    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.iframe.is_none()
    }
}

/// Scan the raw document for directly declared media elements. Only the
/// first element of each kind with a non-empty src is considered; a
/// protected or invalid candidate drops that kind, not the whole scan.
pub fn find_media(doc: &Html) -> EmbeddedMedia {
    EmbeddedMedia {
        video: first_src(doc, "video")
            .filter(|src| {
                if is_protected(src) {
                    warn!("skipping protection-marked video source: {}", src);
                    return false;
                }
                true
            })
            .filter(|src| {
                if !is_media_url(src) {
                    warn!("skipping unsupported video source: {}", src);
                    return false;
                }
                true
            }),
        iframe: first_src(doc, "iframe").filter(|src| {
            if is_protected(src) {
                warn!("skipping protection-marked iframe source: {}", src);
                return false;
            }
            true
        }),
    }
}

fn first_src(doc: &Html, element: &str) -> Option<String> {
    let selector = Selector::parse(element).ok()?;
    doc.select(&selector)
        .find_map(|el| el.value().attr("src"))
        .map(str::to_string)
        .filter(|src| !src.is_empty())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(html: &str) -> EmbeddedMedia {
        find_media(&Html::parse_document(html))
    }

    #[test]
    fn video_found_and_protected_iframe_ignored() {
        let found = scan(
            r#"<html><body>
                <video src="https://x/a.mp4"></video>
                <iframe src="https://host/protected-incapsula-embed"></iframe>
            </body></html>"#,
        );
        assert_eq!(found.video.as_deref(), Some("https://x/a.mp4"));
        assert_eq!(found.iframe, None);
    }

    #[test]
    fn iframe_reported_alongside_video() {
        let found = scan(
            r#"<video src="https://x/a.webm"></video>
               <iframe src="https://host/embed/player"></iframe>"#,
        );
        assert_eq!(found.video.as_deref(), Some("https://x/a.webm"));
        assert_eq!(found.iframe.as_deref(), Some("https://host/embed/player"));
    }

    #[test]
    fn video_with_unsupported_extension_rejected() {
        let found = scan(r#"<video src="https://x/stream.m3u8"></video>"#);
        assert_eq!(found.video, None);
    }

    #[test]
    fn protected_video_dropped_iframe_still_scanned() {
        let found = scan(
            r#"<video src="https://cdn.incapsula.example/a.mp4"></video>
               <iframe src="https://host/embed"></iframe>"#,
        );
        assert_eq!(found.video, None);
        assert_eq!(found.iframe.as_deref(), Some("https://host/embed"));
    }

    #[test]
    fn empty_and_missing_srcs_are_not_found() {
        assert!(scan(r#"<video src=""></video><iframe></iframe>"#).is_empty());
        assert!(scan("<p>just text</p>").is_empty());
    }

    #[test]
    fn only_first_element_of_each_kind_considered() {
        // Second video is valid, but only the first is scanned.
        let found = scan(
            r#"<video src="https://x/stream.m3u8"></video>
               <video src="https://x/b.mp4"></video>"#,
        );
        assert_eq!(found.video, None);
    }
}
