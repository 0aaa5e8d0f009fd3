mod cli;
mod controller;
mod error;
mod logging;
mod proc;

use clap::Parser;
use cli::Cli;
use std::process::ExitCode;
use tracing::error;

use crate::error::ServiceError;

fn run() -> Result<(), ServiceError> {
    let cli = Cli::parse();

    logging::init()?;
    controller::controller(cli)?;

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(ServiceError::Logging(e)) => {
            eprintln!("pronound: could not set up logging: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
