use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::PathBuf;

use crate::pipeline::RunSettings;
use crate::providers::TranslationSettings;
use crate::validation::ValidationConfig;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Target language code (ISO)
    pub target_language: String,

    /// Regional variant of the target language ("BR", "419")
    #[serde(default)]
    pub regional_variant: Option<String>,

    /// Drop sound descriptions and speaker labels
    #[serde(default)]
    pub remove_accessibility_aids: bool,

    /// Chunk window and retry settings
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Translator selection
    #[serde(default)]
    pub translator: TranslatorConfig,

    /// Advisory thresholds
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Directory holding run directories
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Output directory; next to the input when unset
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Chunk window and retry settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChunkingConfig {
    // @field: Owned blocks per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    // @field: Overlap blocks on each side
    #[serde(default = "default_overlap_size")]
    pub overlap_size: usize,

    // @field: Attempts per chunk before the run aborts
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap_size: default_overlap_size(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Translator type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslatorKind {
    // @translator: Returns chunks unchanged
    #[default]
    Passthrough,
    // @translator: External program
    Command,
    // @translator: Remote HTTP agent
    Http,
}

impl TranslatorKind {
    // @returns: Lowercase translator identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Passthrough => "passthrough".to_string(),
            Self::Command => "command".to_string(),
            Self::Http => "http".to_string(),
        }
    }
}

// Implement Display trait for TranslatorKind
impl std::fmt::Display for TranslatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

// Implement FromStr trait for TranslatorKind
impl std::str::FromStr for TranslatorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "passthrough" | "none" => Ok(Self::Passthrough),
            "command" | "cmd" => Ok(Self::Command),
            "http" => Ok(Self::Http),
            _ => Err(anyhow!("Invalid translator type: {}", s)),
        }
    }
}

/// Translator configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct TranslatorConfig {
    /// Translator to use
    #[serde(default)]
    pub kind: TranslatorKind,

    /// Settings for the command translator
    #[serde(default)]
    pub command: CommandConfig,

    /// Settings for the HTTP translator
    #[serde(default)]
    pub http: HttpConfig,
}

/// External command settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct CommandConfig {
    // @field: Program to run
    #[serde(default = "String::new")]
    pub program: String,

    // @field: Arguments, with {input} {output} {context} {amendment} placeholders
    #[serde(default)]
    pub args: Vec<String>,
}

/// Remote agent settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HttpConfig {
    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Bearer token
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching `log` filter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(anyhow!("Invalid log level: {}", s)),
        }
    }
}

fn default_chunk_size() -> usize {
    150
}

fn default_overlap_size() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".chunkwise")
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate languages as they will be handed to the translator
        let settings = self.translation_settings();
        let _target_name = crate::language_utils::get_language_name(&settings.target_language)?;
        if let Some(variant) = &settings.regional_variant {
            crate::language_utils::validate_regional_variant(variant)?;
        }

        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(anyhow!("chunk_size must be at least 1"));
        }
        if chunking.overlap_size >= chunking.chunk_size {
            return Err(anyhow!(
                "overlap_size ({}) must be smaller than chunk_size ({})",
                chunking.overlap_size,
                chunking.chunk_size
            ));
        }
        if chunking.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be at least 1"));
        }

        match self.translator.kind {
            TranslatorKind::Command => {
                if self.translator.command.program.trim().is_empty() {
                    return Err(anyhow!("A program is required for the command translator"));
                }
            }
            TranslatorKind::Http => {
                url::Url::parse(&self.translator.http.endpoint).map_err(|e| {
                    anyhow!("Invalid translator endpoint '{}': {}", self.translator.http.endpoint, e)
                })?;
            }
            TranslatorKind::Passthrough => {}
        }

        Ok(())
    }

    /// Settings handed to the translator with every chunk
    pub fn translation_settings(&self) -> TranslationSettings {
        TranslationSettings {
            target_language: self.target_language.trim().to_string(),
            regional_variant: self
                .regional_variant
                .as_ref()
                .map(|v| v.trim().to_uppercase())
                .filter(|v| !v.is_empty()),
            remove_accessibility_aids: self.remove_accessibility_aids,
        }
    }

    /// Settings of a run built from this configuration
    pub fn run_settings(&self, fresh: bool) -> RunSettings {
        RunSettings::new(self.translation_settings())
            .with_window(self.chunking.chunk_size, self.chunking.overlap_size)
            .with_max_attempts(self.chunking.max_attempts)
            .with_validation(self.validation.clone())
            .with_fresh(fresh)
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            target_language: "fr".to_string(),
            regional_variant: None,
            remove_accessibility_aids: false,
            chunking: ChunkingConfig::default(),
            translator: TranslatorConfig::default(),
            validation: ValidationConfig::default(),
            work_dir: default_work_dir(),
            output_dir: None,
            log_level: LogLevel::default(),
        }
    }
}
