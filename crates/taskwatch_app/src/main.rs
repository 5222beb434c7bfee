mod platform;

use std::path::PathBuf;

use clap::Parser;

/// Terminal client for watching download jobs and following their logs.
#[derive(Debug, Parser)]
#[command(name = "taskwatch", version)]
struct Args {
    /// RON config file; defaults apply when it does not exist.
    #[arg(short, long, default_value = "taskwatch.ron")]
    config: PathBuf,

    /// Overrides the service base URL from the config file.
    #[arg(long)]
    base_url: Option<String>,

    /// Also log to the terminal instead of only to the log file.
    #[arg(long)]
    log_to_terminal: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    platform::run_app(platform::RunOptions {
        config_path: args.config,
        base_url: args.base_url,
        log_to_terminal: args.log_to_terminal,
    })
}
