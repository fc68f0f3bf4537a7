use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_COLLECTION_NAME: &str = "document_embeddings";
const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
const DEFAULT_CHUNK_MAX_WORDS: usize = 512;
const DEFAULT_OCR_MAX_IMAGE_DIMENSION: u32 = 2000;
const DEFAULT_PDF_RENDER_WIDTH: u32 = 1700;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// A setting is larger than the limit another setting imposes on it.
    #[error("{key} ({value}) must not exceed {limit_key} ({limit})")]
    ExceedsLimit {
        /// Variable holding the offending value.
        key: &'static str,
        /// Configured value.
        value: usize,
        /// Variable holding the limit.
        limit_key: &'static str,
        /// Configured limit.
        limit: usize,
    },
}

/// Runtime configuration for the docsift pipeline and server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Vector store backend used by the index.
    pub vector_backend: VectorBackend,
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: Option<String>,
    /// Name of the single Qdrant collection holding document chunks.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the Ollama runtime (embeddings and completions).
    pub ollama_url: Option<String>,
    /// API key for OpenAI-compatible endpoints.
    pub openai_api_key: Option<String>,
    /// Base URL for OpenAI-compatible endpoints.
    pub openai_base_url: Option<String>,
    /// Completion backend used for theme summaries.
    pub completion_provider: CompletionProvider,
    /// Model identifier passed to the completion backend.
    pub completion_model: String,
    /// Maximum number of words per chunk.
    pub chunk_max_words: usize,
    /// Largest width or height handed to OCR; bigger images are downscaled.
    pub ocr_max_image_dimension: u32,
    /// Path or name of the tesseract executable.
    pub tesseract_bin: String,
    /// Tesseract language pack.
    pub tesseract_lang: String,
    /// Optional directory containing the pdfium shared library.
    pub pdfium_library_path: Option<PathBuf>,
    /// Target pixel width used when rasterizing PDF pages.
    pub pdf_render_width: u32,
    /// Default number of results returned by a query.
    pub search_top_k: usize,
    /// Upper bound applied to caller supplied `top_k`.
    pub search_max_top_k: usize,
    /// Number of candidates retrieved before clustering themes.
    pub theme_candidates: usize,
    /// Default number of theme clusters.
    pub theme_clusters: usize,
    /// Seed for reproducible clustering.
    pub theme_seed: u64,
    /// Number of files processed concurrently during batch ingestion.
    pub batch_concurrency: usize,
    /// Root directory for uploaded files, the metadata record list, and default logs.
    pub data_dir: PathBuf,
    /// Log file override; defaults to `logs/docsift.log` under `data_dir`.
    pub log_file: Option<PathBuf>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Vector store backends supported by the index layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Remote Qdrant instance over REST.
    Qdrant,
    /// Process-local index, lost on restart.
    Memory,
}

/// Supported embedding backends for the processing pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local deterministic feature hashing.
    Hashing,
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI-compatible embeddings API.
    OpenAI,
}

/// Supported completion backends for theme summaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionProvider {
    /// Local Ollama chat endpoint.
    Ollama,
    /// Hosted OpenAI-compatible chat completions API.
    OpenAI,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vector_backend = match load_env_optional("VECTOR_BACKEND") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("VECTOR_BACKEND".into()))?,
            None => VectorBackend::Qdrant,
        };
        let qdrant_url = load_env_optional("QDRANT_URL");
        if vector_backend == VectorBackend::Qdrant && qdrant_url.is_none() {
            return Err(ConfigError::MissingVariable("QDRANT_URL".into()));
        }

        let embedding_provider = match load_env_optional("EMBEDDING_PROVIDER") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".into()))?,
            None => EmbeddingProvider::Hashing,
        };
        let completion_provider = match load_env_optional("COMPLETION_PROVIDER") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("COMPLETION_PROVIDER".into()))?,
            None => CompletionProvider::Ollama,
        };
        let completion_model = load_env_optional("COMPLETION_MODEL").unwrap_or_else(|| {
            match completion_provider {
                CompletionProvider::Ollama => "llama3.2".to_string(),
                CompletionProvider::OpenAI => "gpt-3.5-turbo".to_string(),
            }
        });

        let config = Self {
            vector_backend,
            qdrant_url,
            qdrant_collection_name: load_env_optional("QDRANT_COLLECTION_NAME")
                .unwrap_or_else(|| DEFAULT_COLLECTION_NAME.to_string()),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider,
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension: parse_or("EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION)?,
            ollama_url: load_env_optional("OLLAMA_URL"),
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_optional("OPENAI_BASE_URL"),
            completion_provider,
            completion_model,
            chunk_max_words: parse_or("CHUNK_MAX_WORDS", DEFAULT_CHUNK_MAX_WORDS)?,
            ocr_max_image_dimension: parse_or(
                "OCR_MAX_IMAGE_DIMENSION",
                DEFAULT_OCR_MAX_IMAGE_DIMENSION,
            )?,
            tesseract_bin: load_env_optional("TESSERACT_BIN")
                .unwrap_or_else(|| "tesseract".to_string()),
            tesseract_lang: load_env_optional("TESSERACT_LANG")
                .unwrap_or_else(|| "eng".to_string()),
            pdfium_library_path: load_env_optional("PDFIUM_LIBRARY_PATH").map(PathBuf::from),
            pdf_render_width: parse_or("PDF_RENDER_WIDTH", DEFAULT_PDF_RENDER_WIDTH)?,
            search_top_k: parse_or("SEARCH_TOP_K", 5)?,
            search_max_top_k: parse_or("SEARCH_MAX_TOP_K", 100)?,
            theme_candidates: parse_or("THEME_CANDIDATES", 15)?,
            theme_clusters: parse_or("THEME_CLUSTERS", 3)?,
            theme_seed: parse_or("THEME_SEED", 42)?,
            batch_concurrency: parse_or("BATCH_CONCURRENCY", 4)?,
            data_dir: load_env_optional("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            log_file: load_env_optional("LOG_FILE").map(PathBuf::from),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        };

        if config.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if config.chunk_max_words == 0 {
            return Err(ConfigError::InvalidValue("CHUNK_MAX_WORDS".into()));
        }
        check_limit(
            "THEME_CANDIDATES",
            config.theme_candidates,
            "SEARCH_MAX_TOP_K",
            config.search_max_top_k,
        )?;
        check_limit(
            "SEARCH_TOP_K",
            config.search_top_k,
            "SEARCH_MAX_TOP_K",
            config.search_max_top_k,
        )?;

        Ok(config)
    }

    /// Resolved log file path.
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("logs").join("docsift.log"))
    }
}

fn check_limit(
    key: &'static str,
    value: usize,
    limit_key: &'static str,
    limit: usize,
) -> Result<(), ConfigError> {
    if value > limit {
        return Err(ConfigError::ExceedsLimit {
            key,
            value,
            limit_key,
            limit,
        });
    }
    Ok(())
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl FromStr for VectorBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "qdrant" => Ok(Self::Qdrant),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hashing" => Ok(Self::Hashing),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(()),
        }
    }
}

impl FromStr for CompletionProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
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
        backend = ?config.vector_backend,
        collection = %config.qdrant_collection_name,
        embedding_provider = ?config.embedding_provider,
        embedding_dimension = config.embedding_dimension,
        completion_provider = ?config.completion_provider,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
