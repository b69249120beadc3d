use chrono::Local;
use eyre::Result;
use fern::Dispatch;
use log::LevelFilter;

/// Parses a `RUST_LOG` style level, falling back to Info
fn level_from(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|level| level.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Sets up the application logger with console output.
///
/// # Arguments
/// * `verbose` - Forces the Debug level regardless of `RUST_LOG`
///
/// # Returns
/// * `Result<()>` - Success or failure of logger setup
///
/// # Errors
/// * If a logger is already set
pub fn setup_logger(verbose: bool) -> Result<()> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        level_from(std::env::var("RUST_LOG").ok().as_deref())
    };

    Dispatch::new()
        .level(level)
        .chain(std::io::stdout())
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                message
            ));
        })
        .apply()?;
    Ok(())
}
