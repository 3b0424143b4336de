//! Command-line interface.

use clap::{Parser, Subcommand};

use crate::config::{Config, LogFormat};

/// Branching chat MCP server.
#[derive(Parser, Debug)]
#[command(name = "branching-chat", version, about)]
pub struct Cli {
    /// Subcommand to run; defaults to `serve`.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run the MCP server on stdio
    Serve,
    /// Print the resolved configuration
    Config,
}

impl Cli {
    /// The subcommand to run, with `serve` as the default.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}

/// Render the configuration for display, with the API key redacted.
pub fn render_config(config: &Config) -> String {
    let mut output = String::new();

    output.push_str("\nBranching Chat Configuration\n");
    output.push_str("════════════════════════════════════════\n\n");

    output.push_str("Langbase:\n");
    output.push_str(&format!("  Base URL: {}\n", config.langbase.base_url));
    output.push_str(&format!("  API Key: {}\n", redact(&config.langbase.api_key)));
    output.push('\n');

    output.push_str("Requests:\n");
    output.push_str(&format!("  Timeout: {}ms\n", config.request.timeout_ms));
    output.push_str(&format!("  Max Retries: {}\n", config.request.max_retries));
    output.push_str(&format!("  Retry Delay: {}ms\n", config.request.retry_delay_ms));
    output.push('\n');

    output.push_str("Pipes:\n");
    output.push_str(&format!("  Chat: {}\n", config.pipes.chat));
    output.push_str(&format!("  Label: {}\n", config.pipes.label));
    output.push('\n');

    output.push_str("Labels:\n");
    output.push_str(&format!(
        "  Enabled: {}\n",
        if config.labels.enabled { "YES" } else { "NO" }
    ));
    output.push_str(&format!("  Context Turns: {}\n", config.labels.context_turns));
    output.push_str(&format!("  Max Chars: {}\n", config.labels.max_chars));
    output.push_str(&format!("  Fallback Words: {}\n", config.labels.fallback_words));
    output.push('\n');

    output.push_str("Logging:\n");
    output.push_str(&format!("  Level: {}\n", config.logging.level));
    output.push_str(&format!(
        "  Format: {}\n",
        match config.logging.format {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        }
    ));

    output
}

/// Keep the last four characters of a secret.
fn redact(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{}", tail)
}
