mod commands;
mod input;
mod logging;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::lcoe::{CashflowArgs, LcoeArgs};
use commands::sensitivity::SensitivityArgs;
use output::RenderOptions;

/// Solar PV levelized cost of electricity and project cashflow modelling
#[derive(Parser)]
#[command(
    name = "lcoe",
    version,
    about = "Solar PV LCOE and project finance cashflow modelling",
    long_about = "Computes the breakeven tariff (LCOE) at which post-tax equity IRR \
                  equals the cost of equity, and the full period-by-period project \
                  cashflow with DSCR-sculpted or fixed-split debt, in decimal precision."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Lay the cashflow out with one column per period
    #[arg(long, global = true)]
    transpose: bool,

    /// Significant figures for table and CSV cashflow cells (0 prints raw values)
    #[arg(long, default_value_t = 5, global = true)]
    sig_figs: u32,

    /// Log solver progress to stderr (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve for the breakeven tariff (LCOE)
    Lcoe(LcoeArgs),
    /// Build the project cashflow at a tariff, or at breakeven when none is given
    Cashflow(CashflowArgs),
    /// Sweep one assumption and report the LCOE at each value
    Sensitivity(SensitivityArgs),
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

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Lcoe(args) => commands::lcoe::run_lcoe(args),
        Commands::Cashflow(args) => commands::lcoe::run_cashflow(args),
        Commands::Sensitivity(args) => commands::sensitivity::run_sensitivity(args),
        Commands::Version => {
            println!("lcoe {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    let options = RenderOptions {
        transpose: cli.transpose,
        sig_figs: (cli.sig_figs > 0).then_some(cli.sig_figs),
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value, &options);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
