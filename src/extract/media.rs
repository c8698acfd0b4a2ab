use std::path::Path;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::deepgram::DeepgramClient;
use crate::error::ExtractError;

/// Direct media file types the transcriber accepts.
const MEDIA_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".webm", ".m4a"];
/// Hosting-site page patterns the download utility can resolve itself.
const HOST_PATTERNS: &[&str] = &["youtube.com", "youtu.be"];
/// Transcripts are bounded to keep downstream prompts small.
const TRANSCRIPT_LIMIT: usize = 2000;

/// True for URLs that end in a recognized media file extension.
pub fn is_media_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    MEDIA_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// True for direct media files and known video-hosting pages.
pub fn is_transcribable(url: &str) -> bool {
    let lower = url.to_lowercase();
    is_media_url(url) || HOST_PATTERNS.iter().any(|host| lower.contains(host))
}

/// Truncate to the first `max` characters on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Download the best audio track of `url` and transcribe it.
///
/// Returns text bounded to 2000 characters, or `None` for unsupported
/// input, no detected speech, or any failure along the way. Never raises
/// past this boundary; the temporary download is removed on every path.
pub async fn transcribe_media(deepgram: &DeepgramClient, url: &str) -> Option<String> {
    if !is_transcribable(url) {
        warn!("skipping unsupported media URL: {}", url);
        return None;
    }

    let temp_path = std::env::temp_dir().join(format!("media_{}.mp4", Uuid::new_v4()));
    transcribe_media_at(deepgram, url, &temp_path).await
}

async fn transcribe_media_at(
    deepgram: &DeepgramClient,
    url: &str,
    temp_path: &Path,
) -> Option<String> {
    let result = download_and_transcribe(deepgram, url, temp_path).await;
    remove_temp(temp_path);

    match result {
        Ok(Some(transcript)) => Some(truncate_chars(&transcript, TRANSCRIPT_LIMIT)),
        Ok(None) => {
            warn!("no speech detected in {}", url);
            None
        }
        Err(e) => {
            error!("transcription flow failed for {}: {}", url, e);
            None
        }
    }
}

/// Transcribe an embedded (iframe) source. Hosting pages are not accepted
/// here — the source must be a direct media file.
pub async fn transcribe_embedded(deepgram: &DeepgramClient, url: &str) -> Option<String> {
    if !is_media_url(url) {
        warn!("skipping non-media embedded URL: {}", url);
        return None;
    }
    transcribe_media(deepgram, url).await
}

async fn download_and_transcribe(
    deepgram: &DeepgramClient,
    url: &str,
    temp_path: &Path,
) -> Result<Option<String>, ExtractError> {
    info!("downloading audio from: {}", url);
    download_audio(url, temp_path).await?;

    let buffer = tokio::fs::read(temp_path).await?;
    info!("downloaded {} bytes, submitting for transcription", buffer.len());
    deepgram.transcribe_buffer(buffer, "audio/mp4").await
}

/// Resolve and download the best audio-only stream via yt-dlp.
async fn download_audio(url: &str, target: &Path) -> Result<(), ExtractError> {
    let output = tokio::process::Command::new("yt-dlp")
        .arg("--quiet")
        .arg("-f")
        .arg("bestaudio/best")
        .arg("-o")
        .arg(target)
        .arg(url)
        .output()
        .await
        .map_err(|e| ExtractError::Download(format!("failed to spawn yt-dlp: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractError::Download(format!(
            "yt-dlp exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    if !target.exists() {
        return Err(ExtractError::Download(
            "yt-dlp reported success but produced no file".to_string(),
        ));
    }
    Ok(())
}

fn remove_temp(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("failed to remove temp file {:?}: {}", path, e);
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn dummy_client() -> DeepgramClient {
        DeepgramClient::new(&Settings::offline(), reqwest::Client::new())
    }

    #[test]
    fn media_extension_matching() {
        assert!(is_media_url("https://x/a.mp4"));
        assert!(is_media_url("https://x/a.MOV"));
        assert!(is_media_url("https://x/a.webm"));
        assert!(is_media_url("https://x/a.m4a"));
        assert!(!is_media_url("https://x/a.html"));
        assert!(!is_media_url("https://x/mp4"));
    }

    #[test]
    fn hosting_pages_are_transcribable_but_not_media_files() {
        assert!(is_transcribable("https://www.youtube.com/watch?v=abc"));
        assert!(is_transcribable("https://youtu.be/abc"));
        assert!(!is_media_url("https://www.youtube.com/watch?v=abc"));
        assert!(!is_transcribable("https://example.com/article.html"));
    }

    #[test]
    fn truncation_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars(&"x".repeat(3000), TRANSCRIPT_LIMIT).len(), 2000);
    }

    #[tokio::test]
    async fn unsupported_url_returns_none_without_download() {
        // The gate fires before any download or network use, so a client
        // with no real key is safe here.
        let client = dummy_client();
        assert_eq!(transcribe_media(&client, "https://example.com/page.html").await, None);
        assert_eq!(transcribe_embedded(&client, "https://example.com/embed/player").await, None);
    }

    #[tokio::test]
    async fn staged_download_is_removed_when_the_flow_fails() {
        // A stale file at the staging path stands in for a partial
        // download. The loopback target fails fast whether or not the
        // download utility is installed; the staging path must be gone
        // afterwards.
        let client = dummy_client();
        let temp_path = std::env::temp_dir().join(format!("media_{}.mp4", Uuid::new_v4()));
        std::fs::write(&temp_path, b"partial download").unwrap();

        let out = transcribe_media_at(&client, "https://127.0.0.1:9/clip.mp4", &temp_path).await;
        assert_eq!(out, None);
        assert!(!temp_path.exists());
    }

    #[tokio::test]
    async fn embedded_rejects_hosting_pages() {
        // Hosting pages pass the general gate but not the embedded one.
        let client = dummy_client();
        assert_eq!(
            transcribe_embedded(&client, "https://www.youtube.com/watch?v=abc").await,
            None
        );
    }
}
