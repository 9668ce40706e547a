use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::error::Result;

#[derive(Parser, Debug)]
#[clap(version, about = "A line-numbered BASIC interpreter")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a BASIC program
    Run {
        /// Path to the source file
        file: PathBuf,

        /// Message printed when the program reaches END
        #[arg(long)]
        end_message: Option<String>,

        /// Print the token list before running
        #[arg(long)]
        tokens: bool,

        /// Print the parsed lines before running
        #[arg(long)]
        ast: bool,
    },

    /// Check a source file for lexical and syntax errors
    Check {
        /// Path to the source file to check
        file: PathBuf,
    },

    /// Print a source file in canonical form
    List {
        /// Path to the source file to list
        file: PathBuf,
    },

    /// Start an interactive session
    Repl,
}

/// Process exit status for the outcome of a subcommand: 0 on success, 1
/// when tokenizing, parsing or running failed.
pub fn exit_status(result: &Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}
