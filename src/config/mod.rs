use std::env;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub langbase: LangbaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub pipes: PipeConfig,
    pub labels: LabelConfig,
}

/// Langbase API configuration
#[derive(Debug, Clone)]
pub struct LangbaseConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Langbase pipe name configuration
#[derive(Debug, Clone)]
pub struct PipeConfig {
    /// Pipe that produces assistant replies.
    pub chat: String,
    /// Pipe that proposes short node captions.
    pub label: String,
}

/// Node label generation settings
#[derive(Debug, Clone)]
pub struct LabelConfig {
    /// When false, every node gets the local fallback label and the label pipe is never called.
    pub enabled: bool,
    /// Number of preceding turns handed to the label pipe as context.
    pub context_turns: usize,
    /// Hard cap on label length in characters.
    pub max_chars: usize,
    /// Number of leading words used by the fallback label.
    pub fallback_words: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let langbase = LangbaseConfig {
            api_key: env::var("LANGBASE_API_KEY").map_err(|_| AppError::Config {
                message: "LANGBASE_API_KEY is required".to_string(),
            })?,
            base_url: env::var("LANGBASE_BASE_URL")
                .unwrap_or_else(|_| "https://api.langbase.com".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: parse_env("REQUEST_TIMEOUT_MS", 30000),
            max_retries: parse_env("MAX_RETRIES", 3),
            retry_delay_ms: parse_env("RETRY_DELAY_MS", 1000),
        };

        let defaults = PipeConfig::default();
        let pipes = PipeConfig {
            chat: env::var("PIPE_CHAT").unwrap_or(defaults.chat),
            label: env::var("PIPE_LABEL").unwrap_or(defaults.label),
        };

        let label_defaults = LabelConfig::default();
        let labels = LabelConfig {
            enabled: env::var("LABELS_ENABLED")
                .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "off" | "no"))
                .unwrap_or(label_defaults.enabled),
            context_turns: parse_env("LABEL_CONTEXT_TURNS", label_defaults.context_turns),
            max_chars: parse_env("LABEL_MAX_CHARS", label_defaults.max_chars),
            fallback_words: parse_env("LABEL_FALLBACK_WORDS", label_defaults.fallback_words),
        };

        Ok(Config {
            langbase,
            logging,
            request,
            pipes,
            labels,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            chat: "branching-chat-v1".to_string(),
            label: "branch-label-v1".to_string(),
        }
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            context_turns: 4,
            max_chars: 40,
            fallback_words: 6,
        }
    }
}
