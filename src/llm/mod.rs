//! Language model provider adapter
//!
//! OpenAI-compatible client covering the four endpoints the service uses:
//! chat completion (with optional JSON mode and temperature control),
//! embeddings at a fixed 2048 dimensions, audio transcription, and speech
//! synthesis. The `LanguageModel` trait is the seam tests substitute fakes
//! through.
//!
//! Every call is a single attempt; retry policy belongs to the caller (and
//! nothing in this service retries).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

/// A single chat message in provider wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Per-call options. JSON mode forces structured output; temperature stays
/// low for deterministic analysis calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub json: bool,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run a chat completion and return the assistant message content.
    async fn chat(&self, messages: &[ChatMessage], opts: ChatOptions) -> Result<String>;

    /// Embed a text into a fixed-dimension vector.
    async fn embed(&self, input: &str) -> Result<Vec<f32>>;

    /// Transcribe an audio payload to text.
    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String>;

    /// Synthesize speech for a text, returning the audio bytes.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

// ============================================
// WIRE TYPES
// ============================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
}

// ============================================
// CLIENT
// ============================================

pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
    config: LlmConfig,
}

impl OpenAiClient {
    /// Build a client from config; the API key comes from the environment
    /// variable named there.
    pub fn new(config: LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("missing API key in ${}", config.api_key_env))?;

        Ok(Self {
            http: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            config,
        })
    }

    #[cfg(test)]
    pub fn with_base_url(config: LlmConfig, base_url: &str, api_key: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn chat(&self, messages: &[ChatMessage], opts: ChatOptions) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.config.chat_model,
            messages,
            temperature: opts.temperature,
            response_format: opts.json.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let response = self
            .http
            .post(self.url("/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("chat completion request failed")?
            .error_for_status()
            .context("chat completion returned error status")?;

        let body: ChatCompletionResponse = response
            .json()
            .await
            .context("malformed chat completion response")?;

        let Some(choice) = body.choices.into_iter().next() else {
            bail!("chat completion returned no choices");
        };
        Ok(choice.message.content)
    }

    async fn embed(&self, input: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            input,
            dimensions: self.config.embedding_dimensions,
        };

        let response = self
            .http
            .post(self.url("/embeddings"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("embedding request failed")?
            .error_for_status()
            .context("embedding returned error status")?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .context("malformed embedding response")?;

        let Some(data) = body.data.into_iter().next() else {
            bail!("embedding response contained no data");
        };
        if data.embedding.len() != self.config.embedding_dimensions {
            bail!(
                "embedding dimension mismatch: expected {}, got {}",
                self.config.embedding_dimensions,
                data.embedding.len()
            );
        }
        Ok(data.embedding)
    }

    async fn transcribe(&self, audio: Vec<u8>, filename: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(audio).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .text("model", self.config.transcription_model.clone())
            .part("file", part);

        let response = self
            .http
            .post(self.url("/audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("transcription request failed")?
            .error_for_status()
            .context("transcription returned error status")?;

        let body: TranscriptionResponse = response
            .json()
            .await
            .context("malformed transcription response")?;
        Ok(body.text)
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let request = SpeechRequest {
            model: &self.config.speech_model,
            input: text,
            voice: &self.config.speech_voice,
        };

        let response = self
            .http
            .post(self.url("/audio/speech"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("speech synthesis request failed")?
            .error_for_status()
            .context("speech synthesis returned error status")?;

        let bytes = response
            .bytes()
            .await
            .context("reading speech synthesis audio")?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, dimensions: usize) -> OpenAiClient {
        let config = LlmConfig {
            embedding_dimensions: dimensions,
            ..LlmConfig::default()
        };
        OpenAiClient::with_base_url(config, &server.uri(), "test-key")
    }

    #[tokio::test]
    async fn test_chat_sends_json_mode_and_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"ok\":true}"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let content = client(&server, 4)
            .chat(
                &[ChatMessage::user("hi")],
                ChatOptions {
                    temperature: Some(0.2),
                    json: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(content, "{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_chat_with_no_choices_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let err = client(&server, 4)
            .chat(&[ChatMessage::user("hi")], ChatOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }

    #[tokio::test]
    async fn test_embed_enforces_configured_dimensions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({"dimensions": 4})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.1, 0.2]}]
            })))
            .mount(&server)
            .await;

        let err = client(&server, 4).embed("hello").await.unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[tokio::test]
    async fn test_embed_returns_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"embedding": [0.1, 0.2, 0.3, 0.4]}]
            })))
            .mount(&server)
            .await;

        let vector = client(&server, 4).embed("hello").await.unwrap();
        assert_eq!(vector.len(), 4);
    }

    #[tokio::test]
    async fn test_error_status_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client(&server, 4)
            .chat(&[ChatMessage::user("hi")], ChatOptions::default())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("error status"));
    }
}
