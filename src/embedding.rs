//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`GeminiProvider`]**: Google Generative Language `embedContent` (default).
//! - **[`OpenAIProvider`]**: OpenAI `/v1/embeddings`.
//! - **[`OllamaProvider`]**: a local Ollama instance's `/api/embed`.
//! - **[`DisabledProvider`]**: never called; chunks are stored without vectors.
//!
//! [`embed_batch`] drives a provider over a batch of chunk texts, one
//! request at a time, each gated by the caller's [`RateLimiter`]. A failed
//! request is logged and replaced by an empty vector so that results stay
//! aligned with their chunks.
//!
//! # Retry Strategy
//!
//! HTTP providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::rate_limit::RateLimiter;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"embedding-001"`).
    fn model_name(&self) -> &str;
    /// Returns the expected vector dimensionality.
    fn dims(&self) -> usize;
    /// Whether the provider produces vectors at all.
    fn is_enabled(&self) -> bool {
        true
    }
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embed `texts` sequentially under `limiter`.
///
/// Always returns exactly one vector per input. Failed calls yield an
/// empty vector. A disabled provider yields empty vectors without making
/// any calls or consuming rate-limit slots.
pub async fn embed_batch(
    provider: &dyn EmbeddingProvider,
    limiter: &RateLimiter,
    texts: &[String],
) -> Vec<Vec<f32>> {
    if !provider.is_enabled() {
        return vec![Vec::new(); texts.len()];
    }

    let mut embeddings = Vec::with_capacity(texts.len());
    for (i, text) in texts.iter().enumerate() {
        limiter.acquire().await;
        match provider.embed(text).await {
            Ok(vec) => {
                if vec.len() != provider.dims() {
                    tracing::debug!(
                        expected = provider.dims(),
                        got = vec.len(),
                        "embedding dimensionality differs from config"
                    );
                }
                embeddings.push(vec);
            }
            Err(e) => {
                tracing::warn!(position = i, error = %e, "embedding failed, storing placeholder");
                embeddings.push(Vec::new());
            }
        }
    }
    embeddings
}

// ============ Disabled Provider ============

/// Provider used when `embedding.provider = "disabled"`.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    fn is_enabled(&self) -> bool {
        false
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ Gemini Provider ============

/// Embedding provider using the Google Generative Language API.
///
/// Calls `POST {base}/v1beta/models/{model}:embedContent`. Requires
/// `GOOGLE_API_KEY`.
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: usize,
    api_key: String,
    max_retries: u32,
}

impl GeminiProvider {
    pub fn new(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        let (model, dims) = model_and_dims(config, "Gemini")?;
        if api_key.trim().is_empty() {
            bail!("GOOGLE_API_KEY is empty");
        }
        Ok(Self {
            client: http_client(config)?,
            base_url: base_url(config, GEMINI_BASE_URL),
            model,
            dims,
            api_key,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!(
            "{}/v1beta/models/{}:embedContent",
            self.base_url, self.model
        );
        let body = json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
        });
        let json = send_with_retry("Gemini", self.max_retries, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await?;
        parse_gemini_response(&json)
    }
}

/// Extract `embedding.values` from an `embedContent` response.
pub fn parse_gemini_response(json: &Value) -> Result<Vec<f32>> {
    let values = json
        .get("embedding")
        .and_then(|e| e.get("values"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing embedding.values"))?;
    Ok(to_f32_vec(values))
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API. Requires `OPENAI_API_KEY`.
pub struct OpenAIProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: usize,
    api_key: String,
    max_retries: u32,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        let (model, dims) = model_and_dims(config, "OpenAI")?;
        if api_key.trim().is_empty() {
            bail!("OPENAI_API_KEY is empty");
        }
        Ok(Self {
            client: http_client(config)?,
            base_url: base_url(config, OPENAI_BASE_URL),
            model,
            dims,
            api_key,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": [text],
        });
        let json = send_with_retry("OpenAI", self.max_retries, || {
            self.client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
        })
        .await?;
        parse_openai_response(&json)
    }
}

/// Extract `data[0].embedding` from an OpenAI embeddings response.
pub fn parse_openai_response(json: &Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data[0].embedding"))?;
    Ok(to_f32_vec(embedding))
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Requires Ollama to be running with an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model, dims) = model_and_dims(config, "Ollama")?;
        Ok(Self {
            client: http_client(config)?,
            base_url: base_url(config, OLLAMA_BASE_URL),
            model,
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);
        let body = json!({
            "model": self.model,
            "input": [text],
        });
        let json = send_with_retry("Ollama", self.max_retries, || {
            self.client.post(&url).json(&body)
        })
        .await
        .with_context(|| format!("is Ollama running at {}?", self.base_url))?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .and_then(|e| e.first())
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings[0]"))?;
    Ok(to_f32_vec(embedding))
}

// ============ Shared plumbing ============

/// Instantiate the provider named by `config.provider`, reading API keys
/// from the environment.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "gemini" => {
            let key = std::env::var("GOOGLE_API_KEY")
                .map_err(|_| anyhow!("GOOGLE_API_KEY environment variable not set"))?;
            Ok(Box::new(GeminiProvider::new(config, key)?))
        }
        "openai" => {
            let key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
            Ok(Box::new(OpenAIProvider::new(config, key)?))
        }
        "ollama" => Ok(Box::new(OllamaProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

fn model_and_dims(config: &EmbeddingConfig, provider: &str) -> Result<(String, usize)> {
    let model = config
        .model
        .clone()
        .ok_or_else(|| anyhow!("embedding.model required for {} provider", provider))?;
    let dims = config
        .dims
        .ok_or_else(|| anyhow!("embedding.dims required for {} provider", provider))?;
    Ok((model, dims))
}

fn base_url(config: &EmbeddingConfig, default: &str) -> String {
    config
        .url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

fn http_client(config: &EmbeddingConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

/// Send the request built by `build`, retrying transient failures.
async fn send_with_retry<F>(label: &str, max_retries: u32, build: F) -> Result<Value>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(provider = label, attempt, ?delay, "retrying embedding request");
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!("{} API error {}: {}", label, status, body_text));
                    continue;
                }

                bail!("{} API error {}: {}", label, status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} embedding failed after retries", label)))
}

fn to_f32_vec(values: &[Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        fn model_name(&self) -> &str {
            "flaky"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("fail") {
                bail!("upstream refused");
            }
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    fn limiter() -> RateLimiter {
        RateLimiter::new(100, Duration::from_secs(1)).unwrap()
    }

    #[tokio::test]
    async fn failed_calls_become_placeholders_in_place() {
        let provider = FlakyProvider {
            calls: AtomicUsize::new(0),
        };
        let texts = vec!["ok".to_string(), "fail me".to_string(), "fine".to_string()];
        let out = embed_batch(&provider, &limiter(), &texts).await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[0], vec![2.0, 1.0]);
        assert!(out[1].is_empty());
        assert_eq!(out[2], vec![4.0, 1.0]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn disabled_provider_makes_no_calls() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let out = embed_batch(&DisabledProvider, &limiter(), &texts).await;
        assert_eq!(out, vec![Vec::<f32>::new(), Vec::new()]);
        assert!(DisabledProvider.embed("a").await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn each_call_waits_for_a_rate_limit_slot() {
        let provider = FlakyProvider {
            calls: AtomicUsize::new(0),
        };
        let limiter = RateLimiter::new(1, Duration::from_secs(60)).unwrap();
        let texts = vec!["one".to_string(), "two".to_string(), "three".to_string()];

        let start = tokio::time::Instant::now();
        let out = embed_batch(&provider, &limiter, &texts).await;
        assert_eq!(out.len(), 3);
        assert!(start.elapsed() >= Duration::from_secs(120));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_provider_leaves_slots_free() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60)).unwrap();
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let start = tokio::time::Instant::now();
        embed_batch(&DisabledProvider, &limiter, &texts).await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn parses_gemini_response() {
        let json = json!({ "embedding": { "values": [0.5, -1.0, 2.25] } });
        assert_eq!(parse_gemini_response(&json).unwrap(), vec![0.5, -1.0, 2.25]);
        assert!(parse_gemini_response(&json!({ "error": "nope" })).is_err());
    }

    #[test]
    fn parses_openai_response() {
        let json = json!({ "data": [{ "index": 0, "embedding": [1.0, 2.0] }] });
        assert_eq!(parse_openai_response(&json).unwrap(), vec![1.0, 2.0]);
        assert!(parse_openai_response(&json!({ "data": [] })).is_err());
    }

    #[test]
    fn parses_ollama_response() {
        let json = json!({ "embeddings": [[0.25, 0.75]] });
        assert_eq!(parse_ollama_response(&json).unwrap(), vec![0.25, 0.75]);
    }

    #[test]
    fn create_provider_by_name() {
        let config = EmbeddingConfig {
            provider: "disabled".to_string(),
            ..EmbeddingConfig::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "disabled");
        assert!(!provider.is_enabled());

        let config = EmbeddingConfig {
            provider: "carrier-pigeon".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_provider(&config).is_err());
    }

    #[test]
    fn gemini_requires_key() {
        let config = EmbeddingConfig::default();
        assert!(GeminiProvider::new(&config, "  ".to_string()).is_err());
        let provider = GeminiProvider::new(&config, "k".to_string()).unwrap();
        assert_eq!(provider.model_name(), "embedding-001");
        assert_eq!(provider.dims(), 768);
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }
}
