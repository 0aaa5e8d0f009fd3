use pronound_core::config::{self, Config, ConfigError};
use pronound_core::identity::SystemDirectory;
use pronound_core::server;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[cfg(target_os = "openbsd")]
use pledge::pledge_promises;

use crate::cli::Cli;
use crate::logging;
use crate::proc::{self, ProcError};

/// Start the daemon and serve until SIGINT or SIGTERM.
///
/// Startup order matters: daemonise before any thread exists, bind while still root, drop
/// privileges, and only then start the async runtime.
pub fn controller(cli: Cli) -> Result<(), ControllerError> {
    proc::ignore_hangup()?;
    proc::require_root()?;

    let config = Config::default().load(&cli.config)?;

    let daemonized = cli.daemon || config.daemonize;
    if daemonized {
        proc::daemonize()?;
        logging::switch_to_syslog();
    }

    let listener = proc::bind(config.port)?;
    let user = proc::drop_privileges(&config.run_as_user)?;

    #[cfg(target_os = "openbsd")]
    pledge_promises![Stdio Rpath Inet Getpw]
        .map_err(|e| ControllerError::Pledge(format!("{e:?}")))?;

    info!(
        port = config.port,
        user = %user.name,
        config = %cli.config.display(),
        daemonized,
        "starting"
    );

    let control = Control::new(config, config::reload_path(), daemonized);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(control, listener))
}

async fn run(control: Control, listener: std::net::TcpListener) -> Result<(), ControllerError> {
    let listener = TcpListener::from_std(listener)?;

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let server = server::serve(listener, control.subscribe(), Arc::new(SystemDirectory));
    tokio::pin!(server);

    loop {
        tokio::select! {
            _ = &mut server => break,
            _ = sighup.recv() => {
                info!(path = %control.reload_path.display(), "received SIGHUP; reloading configuration");
                if let Err(e) = control.reload().await {
                    error!(error = %e, "reload failed; keeping previous configuration");
                }
            }
            _ = sigint.recv() => {
                info!("received SIGINT; terminating");
                break;
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM; terminating");
                break;
            }
        }
    }

    // Dropping `server` closes the listening socket.
    Ok(())
}

/// Owner of the live configuration snapshot.
struct Control {
    config: watch::Sender<Arc<Config>>,
    reload_path: PathBuf,
    bound_port: u16,
    daemonized: bool,
}

impl Control {
    fn new(config: Config, reload_path: PathBuf, daemonized: bool) -> Self {
        let bound_port = config.port;
        let (config, _) = watch::channel(Arc::new(config));

        Control {
            config,
            reload_path,
            bound_port,
            daemonized,
        }
    }

    fn subscribe(&self) -> watch::Receiver<Arc<Config>> {
        self.config.subscribe()
    }

    /// Re-read the configuration file and install the result as the live snapshot. The socket
    /// and the process identity stay as they are.
    async fn reload(&self) -> Result<(), ConfigError> {
        let current: Arc<Config> = self.config.borrow().clone();
        let next = current.load_async(&self.reload_path).await?;

        if next.port != self.bound_port {
            warn!(
                listening = self.bound_port,
                configured = next.port,
                "port changes take effect on restart"
            );
        }
        if next.daemonize && !self.daemonized {
            warn!("daemonise takes effect on restart");
        }
        if next.run_as_user != current.run_as_user {
            warn!(user = %next.run_as_user, "user changes take effect on restart");
        }

        self.config.send_replace(Arc::new(next));
        info!("configuration reloaded");

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Proc(#[from] ProcError),
    #[error("could not load configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[cfg(target_os = "openbsd")]
    #[error("pledge failed: {0}")]
    Pledge(String),
}
