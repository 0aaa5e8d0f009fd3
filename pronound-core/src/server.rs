use crate::bounded::{self, strip, Bounded};
use crate::config::Config;
use crate::identity::{self, UserDirectory};
use crate::pronouns;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task;
use tokio::time::timeout;
use tracing::{debug, warn};

// ---------------------- EXAMPLES ----------------------
//
// Ask for a user by name:
//   $ echo alice | nc localhost 731
//   she/her
//
// Or by uid:
//   $ echo 1000 | nc localhost 731
//   she/her
//
// Unknown accounts:
//   $ echo 999999 | nc localhost 731
//   user not found

/// Largest request accepted, in bytes.
pub const MAX_REQUEST: usize = 256;

/// Upper bound on each of the request read and the response write.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub const NOT_FOUND: &str = "user not found\n";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("client did not complete within {0:?}")]
    TimedOut(Duration),
}

/// Response line for a raw request.
///
/// The user database is queried on the blocking pool, since getpw* may go out to NSS.
pub async fn respond<D>(request: &Bounded, config: &Config, directory: Arc<D>) -> String
where
    D: UserDirectory + ?Sized + 'static,
{
    if request.overflowed {
        debug!(limit = MAX_REQUEST, "rejecting oversized request");
        return NOT_FOUND.to_owned();
    }

    let token = strip(&request.to_text()).to_owned();
    let resolved = task::spawn_blocking(move || identity::resolve(&*directory, &token)).await;

    match resolved {
        Ok(Ok(identity)) => pronouns::lookup(&identity, config).await,
        Ok(Err(_)) => NOT_FOUND.to_owned(),
        Err(e) => {
            warn!(error = %e, "user lookup task failed");
            NOT_FOUND.to_owned()
        }
    }
}

/// One request, one response, then the connection is closed.
pub async fn handle_client<D>(
    mut stream: TcpStream,
    config: Arc<Config>,
    directory: Arc<D>,
) -> Result<(), ServerError>
where
    D: UserDirectory + ?Sized + 'static,
{
    let request = timeout(REQUEST_TIMEOUT, bounded::read_once(&mut stream, MAX_REQUEST))
        .await
        .map_err(|_| ServerError::TimedOut(REQUEST_TIMEOUT))??;

    let response = respond(&request, &config, directory).await;

    timeout(REQUEST_TIMEOUT, stream.write_all(response.as_bytes()))
        .await
        .map_err(|_| ServerError::TimedOut(REQUEST_TIMEOUT))??;
    stream.shutdown().await?;

    Ok(())
}

/// Accept connections forever. Each client is served on its own task against the configuration
/// snapshot that was live when it was accepted.
///
/// Dropping the returned future closes the listening socket.
pub async fn serve<D>(
    listener: TcpListener,
    snapshots: watch::Receiver<Arc<Config>>,
    directory: Arc<D>,
) where
    D: UserDirectory + ?Sized + 'static,
{
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };

        let config: Arc<Config> = snapshots.borrow().clone();
        let directory = Arc::clone(&directory);

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, config, directory).await {
                warn!(%peer, error = %e, "client error");
            }
        });
    }
}
