//! Command line scanner of in-block arbitrages.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use arbtrace::config::Config;
use arbtrace::history::SwapHistory;
use arbtrace::scanner::Scanner;
use arbtrace::store::{dump_arbitrages, OutputFormat};
use arbtrace::utils::logger::setup_logger;
use clap::{Args, Parser, Subcommand};
use eyre::{bail, eyre, Result};
use log::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Swap history document [env: ARB_SWAP_HISTORY]
    #[arg(long, global = true)]
    swap_history: Option<PathBuf>,
    /// Output file [env: ARB_OUTPUT]
    #[arg(long, global = true)]
    output: Option<PathBuf>,
    /// Output format, guessed from the output extension by default
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,
    /// Transactions a cycle may reach ahead [env: ARB_MAX_CROSS_TRANSACTION]
    #[arg(long, global = true)]
    max_cross_transaction: Option<u64>,
    /// Blocks processed at the same time [env: ARB_WORKERS]
    #[arg(long, global = true)]
    workers: Option<NonZeroUsize>,
    /// Node budget of each search of a block [env: ARB_SEARCH_BUDGET]
    #[arg(long, global = true)]
    search_budget: Option<u64>,
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan every block and dump the arbitrages (default)
    Scan(ScanArgs),
    /// Process a single block and print its arbitrages
    Block {
        /// Block number
        number: u64,
    },
}

#[derive(Args, Default)]
struct ScanArgs {
    /// Process the blocks one after the other
    #[arg(long)]
    sequential: bool,
    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
    /// Exit with an error if any block failed
    #[arg(long)]
    strict: bool,
}

impl Cli {
    /// Flags override the environment
    fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.swap_history {
            config.swap_history.clone_from(path);
        }
        if let Some(path) = &self.output {
            config.output.clone_from(path);
        }
        if let Some(max) = self.max_cross_transaction {
            config.max_cross_transaction = max;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.search_budget.is_some() {
            config.search_budget = self.search_budget;
        }
    }
}

async fn scan(config: &Config, format: OutputFormat, args: &ScanArgs) -> Result<()> {
    let history = SwapHistory::load(&config.swap_history)?;
    let scanner = Scanner::new(config.detector(), config.workers).with_progress(!args.no_progress);
    let outcome = if args.sequential {
        scanner.scan_sequential(history)
    } else {
        scanner.scan(history).await
    };

    info!("There are {} arbitrages in total", outcome.arbitrages.len());
    dump_arbitrages(&config.output, &outcome.arbitrages, format)?;

    if args.strict && !outcome.failures.is_empty() {
        bail!("{} blocks failed", outcome.failures.len());
    }
    Ok(())
}

fn block(config: &Config, number: u64) -> Result<()> {
    let history = SwapHistory::load(&config.swap_history)?;
    let swaps = history
        .block(number)
        .ok_or_else(|| eyre!("Block {number} has no swaps"))?
        .to_vec();
    let report = config.detector().detect(number, swaps)?;
    info!(
        "Block {number}: {} swaps, {} cycles, {} elementary arbitrages, {} arbitrages",
        report.swap_count,
        report.cycle_count,
        report.elementary_count,
        report.records.len()
    );
    println!("{}", serde_json::to_string_pretty(&report.records)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    setup_logger(cli.verbose)?;

    let mut config = Config::from_env()?;
    cli.apply(&mut config);
    let format = cli
        .format
        .unwrap_or_else(|| OutputFormat::from_path(&config.output));

    match cli.command.unwrap_or_else(|| Commands::Scan(ScanArgs::default())) {
        Commands::Scan(args) => scan(&config, format, &args).await?,
        Commands::Block { number } => block(&config, number)?,
    }

    Ok(())
}
