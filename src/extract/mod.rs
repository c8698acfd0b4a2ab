pub mod embedded;
pub mod media;
pub mod pdf;
pub mod rendered;

use std::io::Cursor;

use rusqlite::Connection;
use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::Settings;
use crate::db;
use crate::deepgram::DeepgramClient;
use crate::error::ExtractError;
use embedded::EmbeddedMedia;
use media::truncate_chars;

/// Source identifier recorded when media was resolved by rendering the page
/// and no concrete URL is known.
pub const RENDERED_SOURCE: &str = "js-loaded";

/// Visible page text is bounded like transcripts are.
const PAGE_TEXT_LIMIT: usize = 2000;

// ── Content classification ──

/// Content-type signal derived from the URL's file extension, mirroring a
/// mimetype guess. Extensionless URLs are `Unknown` and dispatch as HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Pdf,
    Video,
    Audio,
    Html,
    Unknown,
}

const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".webm", ".avi"];
const AUDIO_EXTENSIONS: &[&str] = &[".m4a", ".mp3", ".wav"];

impl ContentKind {
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if lower.ends_with(".pdf") {
            ContentKind::Pdf
        } else if VIDEO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            ContentKind::Video
        } else if AUDIO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            ContentKind::Audio
        } else if lower.ends_with(".html") || lower.ends_with(".htm") {
            ContentKind::Html
        } else {
            ContentKind::Unknown
        }
    }
}

// ── Transcript segments ──

/// One unit of extracted content. Serializes to the persisted JSON shape:
/// `{"type":"text","transcript":...}` or
/// `{"type":"video","transcript":...,"video":<source>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Segment {
    Text { transcript: String },
    Video { transcript: String, video: String },
}

impl Segment {
    pub fn transcript(&self) -> &str {
        match self {
            Segment::Text { transcript } => transcript,
            Segment::Video { transcript, .. } => transcript,
        }
    }
}

/// Newline-join every segment transcript in production order. `None` when
/// no segment was produced or nothing but whitespace came out.
pub fn combine(segments: &[Segment]) -> Option<String> {
    if segments.is_empty() {
        return None;
    }
    let joined = segments
        .iter()
        .map(Segment::transcript)
        .collect::<Vec<_>>()
        .join("\n");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ── HTML fallback chain ──

/// Ordered extraction strategies for HTML pages. Each is tried in order and
/// either produces a segment or is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HtmlStrategy {
    EmbeddedVideo,
    EmbeddedIframe,
    RenderedScan,
    VisibleText,
}

const HTML_CHAIN: &[HtmlStrategy] = &[
    HtmlStrategy::EmbeddedVideo,
    HtmlStrategy::EmbeddedIframe,
    HtmlStrategy::RenderedScan,
    HtmlStrategy::VisibleText,
];

impl HtmlStrategy {
    /// Whether this strategy should run at all, given what the static scan
    /// found and what earlier strategies produced.
    ///
    /// The embedded iframe runs even when the embedded video already
    /// produced a segment (both may fire in one pass); only the expensive
    /// rendered scan is gated on "nothing embedded, no segment yet".
    fn warranted(self, found: &EmbeddedMedia, segments: &[Segment]) -> bool {
        match self {
            HtmlStrategy::EmbeddedVideo => found.video.is_some(),
            HtmlStrategy::EmbeddedIframe => found.iframe.is_some(),
            HtmlStrategy::RenderedScan => found.is_empty() && segments.is_empty(),
            HtmlStrategy::VisibleText => true,
        }
    }
}

// ── Extraction ──

/// Turn a resource URL into segments and a combined text blob, persisting
/// the structured transcript when any segment was produced.
///
/// A failed fetch of the resource itself aborts extraction (nothing is
/// persisted); failures inside individual strategies are swallowed at
/// those boundaries and the chain continues.
pub async fn extract(
    settings: &Settings,
    http: &reqwest::Client,
    deepgram: &DeepgramClient,
    conn: &Connection,
    url: &str,
    resource_id: i64,
) -> Option<String> {
    let segments = match fetch_and_extract(settings, http, deepgram, url).await {
        Ok(segments) => segments,
        Err(e) => {
            error!("error fetching content for {}: {}", url, e);
            return None;
        }
    };

    persist_and_combine(conn, resource_id, &segments)
}

/// Persist the structured transcript and return the combined text. Producing
/// no segments is a clean miss: nothing is written.
fn persist_and_combine(conn: &Connection, resource_id: i64, segments: &[Segment]) -> Option<String> {
    if segments.is_empty() {
        return None;
    }
    if let Err(e) = db::save_transcript(conn, resource_id, segments) {
        error!("failed to save transcript for resource {}: {}", resource_id, e);
        return None;
    }
    info!("transcript saved for resource {}", resource_id);

    combine(segments)
}

async fn fetch_and_extract(
    settings: &Settings,
    http: &reqwest::Client,
    deepgram: &DeepgramClient,
    url: &str,
) -> Result<Vec<Segment>, ExtractError> {
    let response = http
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(ExtractError::Fetch)?;

    match ContentKind::from_url(url) {
        ContentKind::Pdf => {
            let bytes = response.bytes().await.map_err(ExtractError::Fetch)?;
            pdf_segments(&bytes)
        }
        ContentKind::Video | ContentKind::Audio => {
            // The fetch above validated reachability; the download utility
            // re-resolves the URL itself.
            let mut segments = Vec::new();
            if let Some(transcript) = media::transcribe_media(deepgram, url).await {
                segments.push(Segment::Video {
                    transcript,
                    video: url.to_string(),
                });
            }
            Ok(segments)
        }
        ContentKind::Html | ContentKind::Unknown => {
            let body = response.text().await.map_err(ExtractError::Fetch)?;
            Ok(extract_html(settings, deepgram, url, &body).await)
        }
    }
}

fn pdf_segments(bytes: &[u8]) -> Result<Vec<Segment>, ExtractError> {
    let mut segments = Vec::new();
    if let Some(text) = pdf::extract_text(bytes)? {
        segments.push(Segment::Text { transcript: text });
    }
    Ok(segments)
}

async fn extract_html(
    settings: &Settings,
    deepgram: &DeepgramClient,
    url: &str,
    body: &str,
) -> Vec<Segment> {
    // The parsed document is scoped to the static scan; everything after
    // works from the candidates it yielded.
    let found = {
        let doc = Html::parse_document(body);
        embedded::find_media(&doc)
    };

    let mut segments = Vec::new();
    for strategy in HTML_CHAIN {
        if !strategy.warranted(&found, &segments) {
            continue;
        }
        match strategy {
            HtmlStrategy::EmbeddedVideo => {
                let src = found.video.as_deref().unwrap_or_default();
                if let Some(transcript) = media::transcribe_media(deepgram, src).await {
                    segments.push(Segment::Video {
                        transcript,
                        video: src.to_string(),
                    });
                }
            }
            HtmlStrategy::EmbeddedIframe => {
                let src = found.iframe.as_deref().unwrap_or_default();
                if let Some(transcript) = media::transcribe_embedded(deepgram, src).await {
                    segments.push(Segment::Video {
                        transcript,
                        video: src.to_string(),
                    });
                }
            }
            HtmlStrategy::RenderedScan => {
                if let Some(transcript) =
                    rendered::render_and_find_media(settings, deepgram, url).await
                {
                    segments.push(Segment::Video {
                        transcript,
                        video: RENDERED_SOURCE.to_string(),
                    });
                }
            }
            HtmlStrategy::VisibleText => {
                if let Some(segment) = page_text_segment(body) {
                    segments.push(segment);
                }
            }
        }
    }
    segments
}

/// Visible text of the document, bounded to 2000 characters; `None` when
/// the page renders to nothing but whitespace.
fn page_text_segment(body: &str) -> Option<Segment> {
    let text = html2text::from_read(Cursor::new(body.as_bytes()), 80);
    let text = truncate_chars(text.trim(), PAGE_TEXT_LIMIT);
    if text.is_empty() {
        None
    } else {
        Some(Segment::Text { transcript: text })
    }
}

// ── Tests ──
