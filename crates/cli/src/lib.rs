pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "islandhop",
    about = "Islandhop operator CLI",
    long_about = "Price transfers offline and check that the tour feed proxy is ready to serve.",
    after_help = "Examples:\n  islandhop quote --pickup \"Sangster Airport\" --dropoff \"Tryall\" --distance-miles 15 --passengers 2\n  islandhop config\n  islandhop doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Price a transfer with the configured pricing table")]
    Quote(QuoteArgs),
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, the pricing table, and tour origin reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

#[derive(Debug, Clone, Args)]
pub struct QuoteArgs {
    #[arg(long, help = "Pickup location as typed by the customer")]
    pub pickup: String,
    #[arg(long, help = "Dropoff location as typed by the customer")]
    pub dropoff: String,
    #[arg(long, help = "Driving distance in miles")]
    pub distance_miles: f64,
    #[arg(long, default_value_t = 0, help = "Driving duration in seconds")]
    pub duration_seconds: u64,
    #[arg(long, help = "Passenger count; invalid values fall back to the configured default")]
    pub passengers: Option<String>,
    #[arg(long, help = "Emit machine-readable JSON output")]
    pub json: bool,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Quote(args) => commands::quote::run(&args),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
