//! CLI argument definitions using clap
//!
//! Commands:
//! - bookshelf serve
//! - bookshelf migrate
//! - bookshelf openapi
//! - bookshelf token issue --sub <sub> --name <name> [--level <level>]
//! - bookshelf token verify <token>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bookshelf - book catalogue query service
#[derive(Parser, Debug)]
#[command(name = "bookshelf")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory holding base.toml and the environment overlays
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Environment overlay to apply (local, staging, production)
    #[arg(long, global = true)]
    pub env: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server until interrupted
    Serve,

    /// Apply outstanding schema migrations and exit
    Migrate,

    /// Print the merged OpenAPI document
    Openapi,

    /// Issue or check access tokens
    Token {
        #[command(subcommand)]
        action: TokenCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Issue a token for a subject
    Issue {
        #[arg(long)]
        sub: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "reader")]
        level: String,
    },

    /// Verify a token and print its claims
    Verify {
        /// Token, with or without a `Bearer ` prefix
        token: String,
    },
}
