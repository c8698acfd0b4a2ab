use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::ExtractError;

const GENERATE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Client for the generative classification backend. One prompt in,
/// free-form text out; the caller owns all parsing and validation.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

// Response fields are optional/defaulted throughout; the backend enforces
// no schema on its side.
#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    pub fn new(settings: &Settings, http: reqwest::Client) -> Self {
        GeminiClient {
            http,
            api_key: settings.gemini_api_key.clone(),
            model: settings.gemini_model.clone(),
        }
    }

    /// Send a prompt and return the first candidate's text.
    pub async fn generate(&self, prompt: &str) -> Result<String, ExtractError> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let url = format!("{}/{}:generateContent", GENERATE_URL, self.model);
        let response = self
            .http
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractError::Classification(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ExtractError::Classification(format!(
                "generateContent returned {}",
                response.status()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Classification(e.to_string()))?;

        first_candidate_text(parsed)
            .ok_or_else(|| ExtractError::Classification("empty candidate list".to_string()))
    }
}

fn first_candidate_text(response: GenerateResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .next()
        .map(|p| p.text)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_text_extracted() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"{\"tags\": []}"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            first_candidate_text(parsed).as_deref(),
            Some("{\"tags\": []}")
        );
    }

    #[test]
    fn missing_candidates_yield_none() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(first_candidate_text(parsed), None);
        let parsed: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{}]}"#).unwrap();
        assert_eq!(first_candidate_text(parsed), None);
    }
}
