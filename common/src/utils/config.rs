use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    /// Key material for the session cookie. The only value without a default.
    pub secret_key: String,
    #[serde(default = "default_vector_store_path")]
    pub vector_store_path: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_api_key")]
    pub openai_api_key: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_embedding_backend")]
    pub embedding_backend: String,
    /// Optional backend-specific model override.
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default = "default_upload_max_body_bytes")]
    pub upload_max_body_bytes: usize,
    /// Indexes older than this are deleted by the retention sweep. 0 disables.
    #[serde(default = "default_index_retention_hours")]
    pub index_retention_hours: u64,
    /// Exact origin allowed to call the API with credentials. Unset disables CORS.
    #[serde(default)]
    pub cors_allowed_origin: Option<String>,
}

fn default_vector_store_path() -> String {
    std::env::temp_dir()
        .join("pdf-session-indexes")
        .to_string_lossy()
        .into_owned()
}

fn default_http_port() -> u16 {
    5001
}

fn default_base_url() -> String {
    // Ollama's OpenAI-compatible endpoint
    "http://localhost:11434/v1".to_string()
}

fn default_api_key() -> String {
    // Local Ollama ignores the key but the client requires one
    "ollama".to_string()
}

fn default_chat_model() -> String {
    "qwen2.5:latest".to_string()
}

fn default_embedding_backend() -> String {
    "fastembed".to_string()
}

fn default_embedding_dimensions() -> u32 {
    768
}

fn default_upload_max_body_bytes() -> usize {
    10_000_000
}

fn default_index_retention_hours() -> u64 {
    24
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
