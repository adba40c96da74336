use std::path::PathBuf;

use clap::Parser;
use dashmind::{BackendId, ReportTarget, parse_backend_id};

/// Analytics dashboard generator backed by tool-calling language models.
#[derive(Parser, Debug)]
#[command(name = "dashmind", version, about)]
pub struct Cli {
    /// TOML config file. Built-in defaults apply when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory of the analytics MCP server project.
    #[arg(long, default_value = ".")]
    pub mcp_server_dir: PathBuf,

    /// Website domain to analyze.
    #[arg(long, default_value = "example.com")]
    pub website: String,

    /// Start date (YYYY-MM-DD).
    #[arg(long, default_value = "2025-06-01")]
    pub start_date: String,

    /// End date (YYYY-MM-DD).
    #[arg(long, default_value = "2025-07-01")]
    pub end_date: String,

    /// Timezone for the analysis.
    #[arg(long, default_value = "UTC")]
    pub timezone: String,

    /// Backend to try first: cloudflare, ollama or openai.
    #[arg(long, value_parser = backend_arg)]
    pub backend: Option<BackendId>,

    /// Ask follow-up questions after the report.
    #[arg(long)]
    pub chat: bool,

    /// Model invocations allowed per question. Overrides the config file.
    #[arg(long)]
    pub max_turns: Option<u32>,

    /// Debug logging, and the tool server's stderr on the terminal.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn target(&self) -> ReportTarget {
        ReportTarget::new(
            self.website.as_str(),
            self.start_date.as_str(),
            self.end_date.as_str(),
            self.timezone.as_str(),
        )
    }
}

fn backend_arg(value: &str) -> Result<BackendId, String> {
    parse_backend_id(value)
        .ok_or_else(|| format!("unknown backend '{value}' (expected cloudflare, ollama or openai)"))
}

/// What one line typed at the chat prompt asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Exit,
    Retry,
    Ask(String),
}

impl ChatCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "quit" | "exit" | "q" => Self::Exit,
            "retry" => Self::Retry,
            _ => Self::Ask(trimmed.to_string()),
        }
    }
}
