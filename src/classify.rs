use std::collections::HashSet;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use rusqlite::Connection;
use serde::Deserialize;
use tracing::{error, warn};

use crate::db;
use crate::extract::ContentKind;
use crate::gemini::GeminiClient;

static BRACKETED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[.*?\]").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static FILLER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(uh|um|erm|hmm)\b").unwrap());
static JSON_OBJECT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*?\}").unwrap());

/// Tags derived purely from the content-type signal, independent of any
/// backend call. Unknown signals get none (mirrors a failed mimetype guess).
pub fn pre_tags(kind: ContentKind) -> Vec<String> {
    match kind {
        ContentKind::Pdf => vec!["pdf".to_string()],
        ContentKind::Video => vec!["video".to_string()],
        ContentKind::Html => vec!["e-book".to_string()],
        ContentKind::Audio | ContentKind::Unknown => Vec::new(),
    }
}

/// Normalize extracted text before it is used as model input: strip
/// bracketed annotations (timestamps and the like), drop filler words,
/// collapse whitespace runs.
pub fn clean_transcript(text: &str) -> String {
    let text = BRACKETED_RE.replace_all(text, "");
    let text = FILLER_RE.replace_all(&text, "");
    let text = WHITESPACE_RE.replace_all(&text, " ");
    text.trim().to_string()
}

fn build_prompt(vocabulary: &[String], content: &str) -> String {
    format!(
        "You are classifying educational resources. The only allowed tags are:\n\n\
         {}\n\n\
         Assign all relevant tags to this resource from the list above — you must \
         match the tag text exactly.\n\n\
         Content:\n{}\n\n\
         Return only a JSON object in this format:\n\
         {{\"tags\": [\"tag1\", \"tag2\", \"tag3\"]}}",
        vocabulary.join(", "),
        content
    )
}

#[derive(Deserialize, Default)]
struct TagResponse {
    #[serde(default)]
    tags: Vec<String>,
}

/// Pull the tag list out of the backend's free-form reply. The backend is
/// not guaranteed to return clean JSON, so the first object-looking
/// substring is tried; any parse failure degrades to an empty list.
pub fn parse_tag_response(raw: &str) -> Vec<String> {
    let Some(candidate) = JSON_OBJECT_RE.find(raw) else {
        warn!("no JSON object found in classification response");
        return Vec::new();
    };
    match serde_json::from_str::<TagResponse>(candidate.as_str()) {
        Ok(parsed) => parsed.tags,
        Err(e) => {
            warn!("failed to parse classification response: {}", e);
            Vec::new()
        }
    }
}

/// Validation gate: only tags present in the vocabulary snapshot taken
/// before the call survive. Everything else is a hallucination — dropped
/// and logged, never persisted.
pub fn validate_tags(snapshot: &HashSet<String>, candidates: Vec<String>) -> Vec<String> {
    candidates
        .into_iter()
        .filter(|tag| {
            if snapshot.contains(tag) {
                true
            } else {
                warn!("ignoring unknown tag from classifier: {}", tag);
                false
            }
        })
        .collect()
}

/// Classify a resource from its extracted text.
///
/// Deterministic pre-tags always apply. The classification backend is
/// consulted only for non-empty input, and its output is validated against
/// the vocabulary snapshot; any backend failure degrades to the pre-tags.
/// The returned set is deduplicated and sorted.
pub async fn classify(
    gemini: &GeminiClient,
    conn: &Connection,
    url: &str,
    extracted: Option<&str>,
) -> Result<Vec<String>> {
    let mut tags: HashSet<String> = pre_tags(ContentKind::from_url(url)).into_iter().collect();

    let content = extracted.map(clean_transcript).unwrap_or_default();
    if content.is_empty() {
        return Ok(sorted(tags));
    }

    let vocabulary = db::fetch_tag_names(conn)?;
    let snapshot: HashSet<String> = vocabulary.iter().cloned().collect();
    let prompt = build_prompt(&vocabulary, &content);

    match gemini.generate(&prompt).await {
        Ok(reply) => {
            tags.extend(validate_tags(&snapshot, parse_tag_response(&reply)));
        }
        Err(e) => {
            error!("classification backend failed for {}: {}", url, e);
        }
    }

    Ok(sorted(tags))
}

fn sorted(tags: HashSet<String>) -> Vec<String> {
    let mut tags: Vec<String> = tags.into_iter().collect();
    tags.sort();
    tags
}

// ── Tests ──
