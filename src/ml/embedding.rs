//! Embedding providers
//!
//! [`EmbeddingProvider`] is the seam to whatever turns text into vectors. Three
//! backends are available:
//! - [`OpenAiEmbedding`] calls an OpenAI-compatible `/embeddings` endpoint
//!   through `async-openai`.
//! - [`OllamaEmbedding`] posts to a local Ollama server's `/api/embed`.
//! - [`HashEmbedding`] is deterministic and offline, for tests and dry runs.
//!
//! Use [`create_provider`] to build the one named in the configuration.

use crate::error::{DbotError, Result};
use async_openai::config::OpenAIConfig;
use async_openai::types::CreateEmbeddingRequestArgs;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Embedding vector type
pub type Embedding = Vec<f32>;

/// Dimension used by [`HashEmbedding`] when none is configured
pub const HASH_DEFAULT_DIMENSION: usize = 384;

/// Which backend produces embeddings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Openai,
    Ollama,
    Hash,
}

/// Configuration for embedding generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    /// Model identifier sent to the provider
    pub model: String,
    /// Override for the provider's base URL
    pub api_base: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Expected vector dimension; required for the hash provider's output size
    pub dimension: Option<usize>,
    /// Texts per provider request
    pub batch_size: usize,
    /// Requests in flight at once
    pub concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Openai,
            model: "text-embedding-3-small".to_string(),
            api_base: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            dimension: None,
            batch_size: 64,
            concurrency: 4,
        }
    }
}

impl EmbeddingConfig {
    /// Offline configuration backed by [`HashEmbedding`]
    pub fn hash(dimension: usize) -> Self {
        Self {
            provider: ProviderKind::Hash,
            model: "hash".to_string(),
            dimension: Some(dimension),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(DbotError::Config("embedding.batch_size must be greater than zero".to_string()));
        }
        if self.concurrency == 0 {
            return Err(DbotError::Config("embedding.concurrency must be greater than zero".to_string()));
        }
        if self.dimension == Some(0) {
            return Err(DbotError::Config("embedding.dimension must be greater than zero".to_string()));
        }
        if self.provider != ProviderKind::Hash && self.model.trim().is_empty() {
            return Err(DbotError::Config("embedding.model is required".to_string()));
        }
        Ok(())
    }
}

/// Identity of the provider that produced an index's vectors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub provider: ProviderKind,
    pub model: String,
    pub dimension: usize,
}

/// Turns text into fixed-dimension vectors
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Model identifier, e.g. `text-embedding-3-small`
    fn model_name(&self) -> &str;

    /// Output dimension when known before the first request
    fn dimension(&self) -> Option<usize>;

    /// One vector per input text, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbotError::EmbeddingProvider("Empty embedding response".to_string()))
    }
}

fn check_response(expected: usize, embeddings: &[Embedding], dimension: Option<usize>) -> Result<()> {
    if embeddings.len() != expected {
        return Err(DbotError::EmbeddingProvider(format!(
            "Requested {} embeddings, received {}",
            expected,
            embeddings.len()
        )));
    }
    if let Some(dimension) = dimension {
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(DbotError::EmbeddingProvider(format!(
                "Expected dimension {}, received {}",
                dimension,
                bad.len()
            )));
        }
    }
    Ok(())
}

// ============ OpenAI ============

/// Embeddings from an OpenAI-compatible API
pub struct OpenAiEmbedding {
    client: async_openai::Client<OpenAIConfig>,
    model: String,
    dimension: Option<usize>,
}

impl OpenAiEmbedding {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            DbotError::Config(format!("{} environment variable not set", config.api_key_env))
        })?;

        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = &config.api_base {
            openai_config = openai_config.with_api_base(base);
        }

        Ok(Self {
            client: async_openai::Client::with_config(openai_config),
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Openai
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(texts.to_vec())
            .build()?;

        let response = self.client.embeddings().create(request).await?;

        let mut data = response.data;
        data.sort_by_key(|item| item.index);
        let embeddings: Vec<Embedding> = data.into_iter().map(|item| item.embedding).collect();

        check_response(texts.len(), &embeddings, self.dimension)?;
        Ok(embeddings)
    }
}

// ============ Ollama ============

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaResponse {
    embeddings: Vec<Embedding>,
}

/// Embeddings from an Ollama server
pub struct OllamaEmbedding {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: Option<usize>,
}

impl OllamaEmbedding {
    pub const DEFAULT_BASE: &'static str = "http://localhost:11434";

    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base = config
            .api_base
            .as_deref()
            .unwrap_or(Self::DEFAULT_BASE)
            .trim_end_matches('/');

        Ok(Self {
            client: reqwest::Client::builder().build()?,
            endpoint: format!("{}/api/embed", base),
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response: OllamaResponse = self
            .client
            .post(&self.endpoint)
            .json(&OllamaRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        check_response(texts.len(), &response.embeddings, self.dimension)?;
        Ok(response.embeddings)
    }
}

// ============ Hash ============

/// Deterministic bag-of-words embedding; identical text gives identical vectors
#[derive(Debug, Clone)]
pub struct HashEmbedding {
    dimension: usize,
}

impl HashEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn fnv1a(bytes: &[u8]) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in bytes {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash
    }

    pub fn encode(&self, text: &str) -> Embedding {
        let mut embedding = vec![0.0f32; self.dimension];

        for word in text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| !w.is_empty())
        {
            let hash = Self::fnv1a(word.to_lowercase().as_bytes());
            // four signed buckets per token
            for j in 0..4 {
                let bits = hash >> (j * 16);
                let idx = (bits as usize & 0x7fff) % self.dimension;
                let sign = if bits & 0x8000 == 0 { 1.0 } else { -1.0 };
                embedding[idx] += sign;
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 1e-12 {
            for val in &mut embedding {
                *val /= norm;
            }
        }
        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Hash
    }

    fn model_name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.encode(t)).collect())
    }
}

/// Build the provider named by `config.provider`
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    config.validate()?;
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        ProviderKind::Openai => Arc::new(OpenAiEmbedding::new(config)?),
        ProviderKind::Ollama => Arc::new(OllamaEmbedding::new(config)?),
        ProviderKind::Hash => Arc::new(HashEmbedding::new(
            config.dimension.unwrap_or(HASH_DEFAULT_DIMENSION),
        )),
    };
    log::debug!(
        "Using {:?} embedding provider with model {}",
        provider.kind(),
        provider.model_name()
    );
    Ok(provider)
}
