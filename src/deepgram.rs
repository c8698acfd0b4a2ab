use serde::Deserialize;
use tracing::warn;

use crate::config::Settings;
use crate::error::ExtractError;

const LISTEN_URL: &str = "https://api.deepgram.com/v1/listen";
const MODEL: &str = "nova-3";

/// Client for the prerecorded transcription endpoint. Takes a raw audio
/// buffer plus its mimetype; quality options are fixed (high-accuracy model,
/// automatic formatting).
pub struct DeepgramClient {
    http: reqwest::Client,
    api_key: String,
}

/// The backend's response nests the transcript several levels deep and any
/// level may be absent. Every level is modelled as optional/defaulted so an
/// absence reads as "no speech detected", never as a parse error.
#[derive(Debug, Default, Deserialize)]
struct ListenResponse {
    #[serde(default)]
    results: Option<ListenResults>,
}

#[derive(Debug, Default, Deserialize)]
struct ListenResults {
    #[serde(default)]
    channels: Vec<Channel>,
}

#[derive(Debug, Default, Deserialize)]
struct Channel {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Default, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: Option<String>,
}

impl DeepgramClient {
    pub fn new(settings: &Settings, http: reqwest::Client) -> Self {
        DeepgramClient {
            http,
            api_key: settings.deepgram_api_key.clone(),
        }
    }

    /// Submit an audio buffer for transcription. `Ok(None)` means the
    /// backend found no speech; `Err` is a transport or protocol failure.
    pub async fn transcribe_buffer(
        &self,
        buffer: Vec<u8>,
        mimetype: &str,
    ) -> Result<Option<String>, ExtractError> {
        let response = self
            .http
            .post(LISTEN_URL)
            .query(&[("model", MODEL), ("smart_format", "true")])
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", mimetype)
            .body(buffer)
            .send()
            .await
            .map_err(|e| ExtractError::Transcription(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ExtractError::Transcription(format!(
                "listen endpoint returned {}",
                response.status()
            )));
        }

        let parsed: ListenResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Transcription(e.to_string()))?;

        Ok(extract_transcript(parsed))
    }
}

/// Walk the nested response; absence at any level is a valid "no speech"
/// outcome rather than an error.
fn extract_transcript(response: ListenResponse) -> Option<String> {
    let channels = match response.results {
        Some(r) if !r.channels.is_empty() => r.channels,
        _ => {
            warn!("no speech detected: response has no channels");
            return None;
        }
    };

    let alternatives = &channels[0].alternatives;
    let Some(first) = alternatives.first() else {
        warn!("no transcription alternatives returned");
        return None;
    };

    match &first.transcript {
        Some(t) if !t.is_empty() => Some(t.clone()),
        _ => {
            warn!("no transcript text in first alternative");
            None
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Option<String> {
        extract_transcript(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn full_response_yields_transcript() {
        let json = r#"{"results":{"channels":[{"alternatives":[{"transcript":"hello world"}]}]}}"#;
        assert_eq!(parse(json).as_deref(), Some("hello world"));
    }

    #[test]
    fn missing_levels_are_no_speech_not_errors() {
        assert_eq!(parse(r#"{}"#), None);
        assert_eq!(parse(r#"{"results":{}}"#), None);
        assert_eq!(parse(r#"{"results":{"channels":[]}}"#), None);
        assert_eq!(parse(r#"{"results":{"channels":[{"alternatives":[]}]}}"#), None);
        assert_eq!(
            parse(r#"{"results":{"channels":[{"alternatives":[{}]}]}}"#),
            None
        );
        assert_eq!(
            parse(r#"{"results":{"channels":[{"alternatives":[{"transcript":""}]}]}}"#),
            None
        );
    }
}
