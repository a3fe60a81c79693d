mod commands;
pub mod exit_codes;
mod output;

pub use commands::Cli;

use anyhow::Result;

use output::OutputMode;

/// run a command; unclassified errors exit with [`exit_codes::ERROR`]
pub fn run(cli: Cli) -> Result<()> {
    let mode = OutputMode::from_flags(cli.json, cli.no_json, cli.quiet);
    if let Err(e) = commands::execute(cli) {
        commands::exit_with(mode, exit_codes::ERROR, &format!("{:#}", e), vec![]);
    }
    Ok(())
}

/// start logging to stderr; RUST_LOG overrides the configured level
pub(crate) fn init_logging(level: &str) {
    let level = level.parse().unwrap_or(log::LevelFilter::Info);
    // a second init (tests) is harmless
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}
