use chrono::NaiveDate;
use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "aicost",
    about = "Token usage and cost reporting for AI coding tools"
)]
pub struct Cli {
    /// Start date filter (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// End date filter (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Output format: table (default), json
    #[arg(long, default_value = "table")]
    pub format: OutputFormat,

    /// Filter by project name (substring match, case-insensitive)
    #[arg(long)]
    pub project: Option<String>,

    /// Filter by tool (e.g. gemini, codex, opencode, amp, cline, roo, kilo)
    #[arg(long)]
    pub tool: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, PartialEq)]
pub enum OutputFormat {
    Table,
    Json,
}
