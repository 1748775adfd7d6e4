//! OpenAI-compatible embedding client backing the `TextEmbedder` seam.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::TextEmbedder;

/// Blocking embeddings client that talks to OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    max_input_chars: usize,
    max_retries: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    /// Builds a new embeddings client.
    ///
    /// Inputs longer than `max_input_chars` are truncated at a character
    /// boundary before submission.
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        max_input_chars: usize,
        timeout: Duration,
        max_retries: usize,
        batch_size: usize,
    ) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing embedding API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");
        anyhow::ensure!(batch_size > 0, "batch size must be at least 1");
        anyhow::ensure!(max_input_chars > 0, "max input chars must be at least 1");

        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid embedding API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build embedding HTTP client")?;
        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            endpoint,
            model,
            max_input_chars,
            max_retries,
            batch_size,
        })
    }

    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let mut attempt = 0usize;
        loop {
            let request = EmbeddingRequest {
                model: &self.model,
                input: inputs,
            };
            let response = self.client.post(&self.endpoint).json(&request).send();
            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let mut parsed: EmbeddingResponse =
                            resp.json().context("failed to parse embedding response")?;
                        parsed.data.sort_by_key(|entry| entry.index);
                        anyhow::ensure!(
                            parsed.data.len() == inputs.len(),
                            "endpoint returned {} embeddings for {} inputs",
                            parsed.data.len(),
                            inputs.len()
                        );
                        return Ok(parsed
                            .data
                            .into_iter()
                            .map(|entry| entry.embedding)
                            .collect());
                    }

                    let body = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if should_retry(status) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    anyhow::bail!("embedding request failed ({}): {}", status, body);
                }
                Err(err) => {
                    if is_retryable_error(&err) && attempt + 1 < self.max_retries {
                        attempt += 1;
                        thread::sleep(retry_backoff(attempt));
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }

    fn truncate<'a>(&self, text: &'a str) -> &'a str {
        match text.char_indices().nth(self.max_input_chars) {
            Some((boundary, _)) => &text[..boundary],
            None => text,
        }
    }
}

impl TextEmbedder for OpenAiEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inputs: Vec<&str> = texts.iter().map(|text| self.truncate(text)).collect();
        info!(
            count = inputs.len(),
            model = %self.model,
            "requesting embeddings"
        );

        let mut vectors = Vec::with_capacity(inputs.len());
        for chunk in inputs.chunks(self.batch_size) {
            let batch = self.embed_batch(chunk)?;
            debug!(batch = batch.len(), "embedding batch complete");
            vectors.extend(batch);
        }

        if let Some(first) = vectors.first() {
            let dimension = first.len();
            anyhow::ensure!(
                vectors.iter().all(|vector| vector.len() == dimension),
                "endpoint returned embeddings of inconsistent dimension"
            );
        }

        Ok(vectors)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_request() || err.is_decode()
}

fn retry_backoff(attempt: usize) -> Duration {
    let capped = attempt.min(5) as u32;
    Duration::from_millis(500 * (1 << capped))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder(max_chars: usize) -> OpenAiEmbedder {
        OpenAiEmbedder::new(
            "test-key".to_string(),
            "https://api.example.test/v1".to_string(),
            "test-model".to_string(),
            max_chars,
            Duration::from_secs(5),
            1,
            16,
        )
        .expect("client builds")
    }

    #[test]
    fn truncates_long_input_at_char_boundary() {
        let client = embedder(4);
        assert_eq!(client.truncate("abcdef"), "abcd");
        // Multi-byte characters must not be split.
        assert_eq!(client.truncate("日本語のテキスト"), "日本語の");
    }

    #[test]
    fn short_input_is_untouched() {
        let client = embedder(100);
        assert_eq!(client.truncate("short"), "short");
    }

    #[test]
    fn rejects_blank_credentials() {
        let result = OpenAiEmbedder::new(
            "  ".to_string(),
            "https://api.example.test/v1".to_string(),
            "model".to_string(),
            100,
            Duration::from_secs(5),
            1,
            16,
        );
        assert!(result.is_err());
    }
}
