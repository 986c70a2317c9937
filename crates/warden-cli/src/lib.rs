//! policyctl library
//!
//! Commands for working with Warden policy files: compile a rule from a
//! natural-language description, validate a file, and explain a single
//! evaluation.

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// policyctl - Warden policy tooling
#[derive(Parser, Debug)]
#[command(name = "policyctl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a natural-language rule into a policy document
    Compile(commands::compile::CompileArgs),
    /// Validate a policy file
    Validate(commands::validate::ValidateArgs),
    /// Explain the decision for one access request
    Explain(commands::explain::ExplainArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Compile(args) => commands::compile::run(args).await,
            Commands::Validate(args) => commands::validate::run(args),
            Commands::Explain(args) => commands::explain::run(args).await,
        }
    }
}
