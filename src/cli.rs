//! Command line interface for the `wireline` binary.
//!
//! `serve` runs the school directory server until interrupted; `call` sends
//! one request and prints the response envelope.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command line arguments for the `wireline` binary.
#[derive(Debug, Parser)]
#[command(
    name = "wireline",
    version,
    about = "Newline-delimited JSON request server and client"
)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands of the `wireline` binary.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the school directory server until interrupted.
    Serve {
        /// Listen address, overriding `server.address`.
        #[arg(short, long)]
        address: Option<String>,
    },
    /// Send one request and print the response.
    Call {
        /// Server address, overriding `client.address`.
        #[arg(short, long)]
        address: Option<String>,
        /// Request type, for example `list_schools`.
        request_type: String,
        /// JSON payload sent with the request.
        payload: Option<String>,
    },
}
