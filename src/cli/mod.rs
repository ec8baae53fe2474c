//! CLI module for the Records API

pub mod serve;

use clap::{Parser, Subcommand};

/// Records API - accounts, payments and activity tracking backend
#[derive(Parser)]
#[command(name = "crm-records-api")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API server
    Serve,
}
