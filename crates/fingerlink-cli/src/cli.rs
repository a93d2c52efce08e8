//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Name of a simulated reader to attach (repeatable)
    #[arg(short, long = "reader", default_value = "Mock Reader")]
    pub readers: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List attached readers
    Readers,

    /// Run an acquisition, printing each event as a JSON line
    Acquire {
        /// Acquisition options: a bare enroll flag or {"enroll": bool, "continuous": bool}
        #[arg(short, long, default_value = "false")]
        options: String,

        /// Reader to select by name
        #[arg(short, long)]
        select: Option<String>,

        /// Simulated finger presses, each a JSON byte array
        #[arg(short, long = "finger")]
        fingers: Vec<String>,
    },

    /// Compare a feature against an enrolled template
    Compare {
        /// Feature record as a JSON byte array
        feature: String,

        /// Template record as a JSON byte array
        template: String,
    },

    /// Find which enrolled template matches a feature
    Identify {
        /// Feature record as a JSON byte array
        feature: String,

        /// Template records, each a JSON byte array
        #[arg(required = true)]
        templates: Vec<String>,
    },
}
