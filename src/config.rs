//! Configuration management with YAML support

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub vector: VectorConfig,

    #[serde(default)]
    pub guidance: GuidanceConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Language model provider configuration (OpenAI-compatible endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key (never stored in the file)
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Fixed embedding width; the vector index is created with the same value
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: usize,

    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    #[serde(default = "default_speech_model")]
    pub speech_model: String,

    #[serde(default = "default_speech_voice")]
    pub speech_voice: String,
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    #[serde(default)]
    pub base_url: String,

    #[serde(default = "default_vector_key_env")]
    pub api_key_env: String,

    /// Namespace for conversation memory records
    #[serde(default = "default_memory_namespace")]
    pub memory_namespace: String,

    /// Namespace for knowledge-base documents
    #[serde(default = "default_knowledge_namespace")]
    pub knowledge_namespace: String,
}

/// Therapeutic guidance corpus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidanceConfig {
    #[serde(default = "default_guidance_path")]
    pub path: String,
}

// Default value functions
fn default_database_path() -> String {
    "~/.local/share/harbor/harbor.db".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}

fn default_embedding_dimensions() -> usize {
    2048
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_speech_model() -> String {
    "tts-1".to_string()
}

fn default_speech_voice() -> String {
    "nova".to_string()
}

fn default_vector_key_env() -> String {
    "PINECONE_API_KEY".to_string()
}

fn default_memory_namespace() -> String {
    "conversations".to_string()
}

fn default_knowledge_namespace() -> String {
    "knowledge".to_string()
}

fn default_guidance_path() -> String {
    "~/.config/harbor/guidance.md".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key_env: default_llm_key_env(),
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            embedding_dimensions: default_embedding_dimensions(),
            transcription_model: default_transcription_model(),
            speech_model: default_speech_model(),
            speech_voice: default_speech_voice(),
        }
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key_env: default_vector_key_env(),
            memory_namespace: default_memory_namespace(),
            knowledge_namespace: default_knowledge_namespace(),
        }
    }
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            path: default_guidance_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            llm: LlmConfig::default(),
            vector: VectorConfig::default(),
            guidance: GuidanceConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./harbor.yaml (current directory)
    /// 3. ~/.config/harbor/harbor.yaml
    pub fn load(path: &str) -> Result<Self> {
        let search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "harbor.yaml".to_string(),
            shellexpand::tilde("~/.config/harbor/harbor.yaml").to_string(),
        ];

        for search_path in &search_paths {
            if std::path::Path::new(search_path).exists() {
                let content = std::fs::read_to_string(search_path)?;
                let config: Config = serde_yaml::from_str(&content)?;
                return Ok(config);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.database.path).to_string();
        PathBuf::from(expanded)
    }

    /// Get the guidance corpus path, expanding ~ to home directory
    pub fn guidance_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.guidance.path).to_string();
        PathBuf::from(expanded)
    }
}
