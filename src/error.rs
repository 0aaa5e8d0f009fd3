use thiserror::Error;
use tracing_subscriber::util::TryInitError;

use crate::controller::ControllerError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Controller(#[from] ControllerError),
    #[error("could not set up logging: {0}")]
    Logging(#[from] TryInitError),
}
