use serde::{Deserialize, Serialize};

use crate::chat::AnalysisBackend;
use crate::error::{Error, Result};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Stand-in reply when the API answers 200 but carries no candidate text.
const FALLBACK_REPLY: &str = "Sorry, I couldn't process that request.";

/// Connection settings for the Gemini `generateContent` API.
///
/// Threaded explicitly from `main` into the server state; nothing reads the
/// key from a global.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        GeminiConfig {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Read the configuration from `GEMINI_API_KEY`, `GEMINI_MODEL` and
    /// `GEMINI_ENDPOINT`. Only the key is required.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| Error::Config("GEMINI_API_KEY is not set".to_string()))?;
        let mut config = GeminiConfig::new(api_key);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        if let Ok(endpoint) = std::env::var("GEMINI_ENDPOINT") {
            config.endpoint = endpoint;
        }
        Ok(config)
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        GeminiClient {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Issue one single-turn request and return the raw reply text.
    ///
    /// Non-success statuses become [`Error::Api`] carrying the status code
    /// and the error message from the response body when one is present.
    async fn generate_content(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 2048,
            },
        };

        let response = self
            .http
            .post(self.config.url())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .map(|detail| detail.message)
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response.json().await?;
        Ok(reply_text(body))
    }
}

impl AnalysisBackend for GeminiClient {
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send {
        self.generate_content(prompt)
    }
}

fn reply_text(body: GenerateResponse) -> String {
    body.candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .unwrap_or_else(|| FALLBACK_REPLY.to_string())
}
