use crate::chunking::ChunkProfile;
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Fallback Ollama base URL used when `OLLAMA_URL` is unset.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the Filing Digest server.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for filing chunks.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Completion model used for chunk, section, and report synthesis.
    pub completion_model: String,
    /// Base URL of the Ollama runtime serving completions and embeddings.
    pub ollama_url: Option<String>,
    /// Base URL of the filing source that resolves (ticker, accession) to text.
    pub filing_source_url: String,
    /// Optional directory for filesystem-backed chunk/report text storage.
    pub storage_dir: Option<String>,
    /// Concurrency bound for chunk-level summarization calls.
    pub map_concurrency: usize,
    /// Concurrency bound for per-section synthesis calls.
    pub section_concurrency: usize,
    /// Batch size used when embedding retrieval chunks.
    pub embed_batch_size: usize,
    /// Default number of chunks retrieved per question.
    pub qa_top_k: usize,
    /// Optional allow-list of canonical section names fed to summarization.
    pub summary_sections: Option<Vec<String>>,
    /// Optional override for the summarization chunk profile, in characters.
    pub summary_chunk_max: Option<usize>,
    /// Optional override for the embedding chunk profile, in characters.
    pub embed_chunk_max: Option<usize>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the pipeline.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Deterministic hash encoder, useful offline and in tests.
    Deterministic,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env("QDRANT_COLLECTION_NAME")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: load_env("EMBEDDING_PROVIDER")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: parse_env("EMBEDDING_DIMENSION", load_env("EMBEDDING_DIMENSION")?)?,
            completion_model: load_env("COMPLETION_MODEL")?,
            ollama_url: load_env_optional("OLLAMA_URL"),
            filing_source_url: load_env("FILING_SOURCE_URL")?,
            storage_dir: load_env_optional("STORAGE_DIR"),
            map_concurrency: parse_env_or("MAP_CONCURRENCY", 4)?,
            section_concurrency: parse_env_or("SECTION_CONCURRENCY", 3)?,
            embed_batch_size: parse_env_or("EMBED_BATCH_SIZE", 32)?,
            qa_top_k: parse_env_or("QA_TOP_K", 5)?,
            summary_sections: load_env_optional("SUMMARY_SECTIONS").map(|csv| {
                csv.split(',')
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect()
            }),
            summary_chunk_max: load_env_optional("SUMMARY_CHUNK_MAX")
                .map(|value| parse_env("SUMMARY_CHUNK_MAX", value))
                .transpose()?,
            embed_chunk_max: load_env_optional("EMBED_CHUNK_MAX")
                .map(|value| parse_env("EMBED_CHUNK_MAX", value))
                .transpose()?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| parse_env("SERVER_PORT", value))
                .transpose()?,
        })
    }

    /// Ollama base URL, falling back to the local default when unset.
    pub fn ollama_base_url(&self) -> String {
        self.ollama_url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
    }

    /// Chunk profile applied when cutting summarization chunks.
    pub fn summary_profile(&self) -> ChunkProfile {
        match self.summary_chunk_max {
            Some(max) => ChunkProfile::scaled_to(max),
            None => ChunkProfile::summarization(),
        }
    }

    /// Chunk profile applied when cutting retrieval chunks.
    pub fn embedding_profile(&self) -> ChunkProfile {
        match self.embed_chunk_max {
            Some(max) => ChunkProfile::scaled_to(max),
            None => ChunkProfile::embedding(),
        }
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => parse_env(key, value),
        None => Ok(default),
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "deterministic" => Ok(Self::Deterministic),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        server_port = ?config.server_port,
        embedding_provider = ?config.embedding_provider,
        completion_model = %config.completion_model,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::{Config, DEFAULT_OLLAMA_URL, EmbeddingProvider};

    fn base_config() -> Config {
        Config {
            qdrant_url: "http://localhost:6333".into(),
            qdrant_collection_name: "filing-chunks".into(),
            qdrant_api_key: None,
            embedding_provider: EmbeddingProvider::Deterministic,
            embedding_model: "nomic-embed-text".into(),
            embedding_dimension: 32,
            completion_model: "llama3".into(),
            ollama_url: None,
            filing_source_url: "http://localhost:9000".into(),
            storage_dir: None,
            map_concurrency: 4,
            section_concurrency: 3,
            embed_batch_size: 32,
            qa_top_k: 5,
            summary_sections: None,
            summary_chunk_max: None,
            embed_chunk_max: None,
            server_port: None,
        }
    }

    #[test]
    fn ollama_url_falls_back_to_the_local_default() {
        let mut config = base_config();
        assert_eq!(config.ollama_base_url(), DEFAULT_OLLAMA_URL);
        config.ollama_url = Some("http://ollama.internal:11434".into());
        assert_eq!(config.ollama_base_url(), "http://ollama.internal:11434");
    }

    #[test]
    fn provider_parses_known_values() {
        assert!(matches!(
            "ollama".parse::<EmbeddingProvider>(),
            Ok(EmbeddingProvider::Ollama)
        ));
        assert!(matches!(
            "Deterministic".parse::<EmbeddingProvider>(),
            Ok(EmbeddingProvider::Deterministic)
        ));
        assert!("openai-ish".parse::<EmbeddingProvider>().is_err());
    }
}
