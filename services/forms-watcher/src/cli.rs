//! CLI argument definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Get notified when Microsoft Forms go live.
#[derive(Parser, Debug)]
#[command(name = "forms-watcher", version, about)]
pub struct Cli {
    /// Config file (default: $FORMS_WATCHER_CONFIG or ./forms-watcher.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level commands. Without one, `poll` runs.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with your Microsoft account
    Auth(AuthArgs),
    /// Add form URLs to watch
    Add(AddArgs),
    /// Show watched forms
    List,
    /// Remove all watched forms
    Clear(ClearArgs),
    /// Start polling (default)
    Poll(PollArgs),
}

#[derive(Args, Debug)]
pub struct AuthArgs {
    /// Azure AD tenant ID (default: from config, else "common")
    #[arg(long)]
    pub tenant: Option<String>,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Form URLs (forms.office.com/r/xxx)
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Label for each form, matched to URLs by position
    #[arg(long = "name", value_name = "LABEL")]
    pub names: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Also delete the saved sign-in tokens
    #[arg(long)]
    pub tokens: bool,
}

#[derive(Args, Debug, Default)]
pub struct PollArgs {
    /// Seconds between checks (default: from config, else 5)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,
}
