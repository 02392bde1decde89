mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use log::LevelFilter;
use std::process;

use commands::margin::{CalculateArgs, IrrArgs};

/// All-in margin and weighted average life for infrastructure loans
#[derive(Parser)]
#[command(
    name = "aim",
    version,
    about = "All-in margin and weighted average life for infrastructure loans",
    long_about = "Builds a period-by-period amortization schedule from draw, repayment \
                  and fee rules, then reports the annualised IRR of the lender cash flows \
                  (spread, upfront fee, commitment fee, reserves) and the weighted \
                  average life. All arithmetic uses decimal precision."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Increase log verbosity on stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Calculate all-in margin, component breakdown, WAL and validation
    Calculate(CalculateArgs),
    /// Print the amortization schedule (use --output csv for the export table)
    Schedule(CalculateArgs),
    /// IRR of a periodic cash-flow list, annualised by frequency
    Irr(IrrArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Calculate(args) => commands::margin::run_calculate(args),
        Commands::Schedule(args) => commands::margin::run_schedule(args),
        Commands::Irr(args) => commands::margin::run_irr(args),
        Commands::Version => {
            println!("aim {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
