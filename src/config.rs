use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{env, path::PathBuf};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Ephemeral in-memory file sharing")]
pub struct Args {
    /// Host to bind to (overrides SHARE_HOST)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port to bind to (overrides SHARE_PORT)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the share server (default)
    Serve,

    /// Follow a share server as a viewer and log the shared files
    Watch {
        /// Base URL of the share server
        #[arg(long, env = "SHARE_SERVER", default_value = "http://127.0.0.1:3000")]
        server: String,

        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Session token for the initial status check (random when omitted)
        #[arg(long)]
        session_id: Option<String>,

        /// Directory to mirror shared files into while they are shared
        #[arg(long)]
        mirror_dir: Option<PathBuf>,
    },

    /// Upload files as the uploader
    Upload {
        /// Base URL of the share server
        #[arg(long, env = "SHARE_SERVER", default_value = "http://127.0.0.1:3000")]
        server: String,

        /// Uploader session token (random when omitted)
        #[arg(long)]
        session_id: Option<String>,

        /// Clear everything already shared before uploading
        #[arg(long)]
        replace: bool,

        /// Files to share
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the
    /// requested command.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("SHARE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("SHARE_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing SHARE_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading SHARE_PORT"),
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
        };

        Ok((cfg, args.command.unwrap_or(Command::Serve)))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
