//! HabitCoach - habit progression engine with proactive daily check-ins.

use clap::Parser;
use std::process::ExitCode;

use habitcoach::cli::Commands;
use habitcoach::{load_settings_or_default, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Commands::parse();
    let settings = load_settings_or_default();

    // The guard flushes the file writer on exit.
    let _guard = match logging::init(&settings.logging) {
        Ok((guard, _)) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match args.run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
