//! CLI argument parsing

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "opsentry")]
#[command(author, version, about = "Security-persona agent REPL")]
pub struct Args {
    /// Initial prompt, executed as the first turn
    pub prompt: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Model to use (overrides config and OPSENTRY_MODEL)
    #[arg(long)]
    pub model: Option<String>,

    /// Persona agent to start with
    #[arg(long)]
    pub agent: Option<String>,

    /// Turn limit for this session
    #[arg(long)]
    pub max_turns: Option<u32>,

    /// Parallel fan-out count
    #[arg(long)]
    pub parallel: Option<u32>,

    /// Output directory for session data
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
