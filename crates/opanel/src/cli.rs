use clap::{Parser, Subcommand, ValueEnum};
use opanel_client::panel::DEFAULT_LIMIT;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sets the level of tracing
    #[arg(long, value_enum, ignore_case = true, default_value_t = TraceLevel::Info)]
    pub trace: TraceLevel,

    /// TOML file holding `polygon_api_key`, read when POLYGON_API_KEY is unset
    #[arg(long, default_value = "secrets.toml")]
    pub secrets: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the options price dashboard.
    Serve {
        /// Address to bind the web server to.
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
    },

    /// Fetch option contracts for a ticker and print their previous-day prices.
    Fetch {
        /// Underlying ticker, e.g. AAPL.
        ticker: String,

        /// Number of contracts to display (1-50).
        #[arg(short, long, default_value_t = DEFAULT_LIMIT as u64, value_parser = clap::value_parser!(u64).range(1..=50))]
        limit: u64,

        /// Print the panel as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraceLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}
