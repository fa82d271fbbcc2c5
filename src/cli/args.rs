//! CLI argument definitions using clap.
//!
//! Each subcommand reads exactly one JSON request object from stdin and
//! writes exactly one JSON response object to stdout; there is no shared
//! on-disk state between invocations, so every request carries whatever
//! seed namespaces/documents/indexes it needs alongside its operation.

use clap::{Parser, Subcommand};

/// polydb - a document-oriented query execution core
#[derive(Parser, Debug)]
#[command(name = "polydb")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a normal or capped namespace.
    CreateNamespace,
    /// Insert one document into a namespace.
    Insert,
    /// Add a compound index to a normal namespace.
    CreateIndex,
    /// Run a query and print its results plus an explain report.
    Query,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
