use std::process::ExitCode;
use taxi_ingest::cli::{EXIT_UNKNOWN_MODE, Invocation, Mode};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();
}

fn main() -> ExitCode {
    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "taxi-ingest".to_string());

    let mode = match args.next().unwrap_or_default().parse::<Mode>() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_UNKNOWN_MODE);
        }
    };

    let invocation = match Invocation::try_parse(mode, &program, args) {
        Ok(invocation) => invocation,
        Err(e) => e.exit(),
    };

    init_tracing();
    match invocation.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(%mode, "run failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}
