use std::io::{self, BufReader};
use std::process::ExitCode;
use std::sync::Arc;

use cota_link::device::Collaborators;
use cota_link::{Shell, StructuredHealthReporter, SystemConfigLoader, bootstrap_with};

fn main() -> ExitCode {
    let reporter = Arc::new(StructuredHealthReporter::new());
    let engine = match bootstrap_with(&SystemConfigLoader, reporter, Collaborators::default()) {
        Ok(engine) => engine,
        Err(error) => {
            eprintln!("cota-link: {error}");
            return ExitCode::FAILURE;
        }
    };

    let stdout = io::stdout();
    match Shell::new(engine, stdout.lock()).run(BufReader::new(io::stdin())) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "shell failed");
            ExitCode::FAILURE
        }
    }
}
