use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;

use vendi_agent::llm::GenerativeClient;
use vendi_core::config::GenerativeConfig;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One NDJSON line of a streamed generation reply.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

/// Client for an Ollama-style `/api/generate` endpoint. The connect timeout
/// is short; the read timeout is long enough to sit through token-by-token
/// streaming. No retry and no cancellation: a call runs to completion or to
/// timeout.
pub struct OllamaClient {
    http: Client,
    generate_url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl OllamaClient {
    pub fn new(config: &GenerativeConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            generate_url: generate_url(&config.base_url),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

fn generate_url(base_url: &str) -> String {
    format!("{}/api/generate", base_url.trim_end_matches('/'))
}

#[async_trait]
impl GenerativeClient for OllamaClient {
    /// Accumulates the `response` fragment of every streamed line until the
    /// terminal `done` marker. A non-success handshake yields a fixed
    /// error-shaped string instead of an `Err`, so callers can relay it.
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut request = self
            .http
            .post(&self.generate_url)
            .json(&GenerateRequest { model: &self.model, prompt, stream: true });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "generative.handshake_failed",
                status = %status,
                "generation backend returned non-success status"
            );
            return Ok(format!("Generation backend error. Status: {status}, Response: {body}"));
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut output = String::new();

        'chunks: while let Some(chunk) = stream.next().await {
            buffer.push_str(&String::from_utf8_lossy(&chunk?));

            while let Some(newline_index) = buffer.find('\n') {
                let line = buffer[..newline_index].trim().to_owned();
                buffer.drain(..=newline_index);
                if line.is_empty() {
                    continue;
                }

                match serde_json::from_str::<GenerateChunk>(&line) {
                    Ok(decoded) => {
                        output.push_str(&decoded.response);
                        if decoded.done {
                            break 'chunks;
                        }
                    }
                    Err(decode_error) => {
                        warn!(
                            event_name = "generative.bad_chunk",
                            error = %decode_error,
                            "skipping undecodable stream line"
                        );
                    }
                }
            }
        }

        Ok(output.trim().to_owned())
    }
}
