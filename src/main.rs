use repostat::cli::Cli;
use repostat::output;
use std::process::ExitCode;
use tracing_subscriber::prelude::*;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.common.verbose);

    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(&err);
            ExitCode::FAILURE
        }
    }
}

// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "repostat=debug" } else { "repostat=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}
