use std::process::ExitCode;

use clap::Parser;

use provider_dashboard_lib::cli::{run, Cli};
use provider_dashboard_lib::error::ErrorReport;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let report = ErrorReport::from(&e);
            eprintln!("Error: {}", report.message);
            eprintln!("{}", report.recovery_suggestion);
            ExitCode::FAILURE
        }
    }
}
