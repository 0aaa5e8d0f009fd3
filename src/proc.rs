use nix::errno::Errno;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::stat::{umask, Mode};
use nix::unistd::{dup2, fork, setgid, setsid, setuid, ForkResult, Uid, User};
use std::fs::OpenOptions;
use std::io;
use std::net::{Ipv4Addr, TcpListener};
use std::os::fd::{AsRawFd, RawFd};
use thiserror::Error;

const STDIO: [RawFd; 3] = [0, 1, 2];

#[derive(Debug, Error)]
pub enum ProcError {
    #[error("pronound must be run as root")]
    NotRoot,
    #[error("could not ignore SIGHUP: {0}")]
    Signal(Errno),
    #[error("fork failed: {0}")]
    Fork(Errno),
    #[error("setsid failed: {0}")]
    Setsid(Errno),
    #[error("could not change directory to /: {0}")]
    Chdir(io::Error),
    #[error("could not redirect standard streams to /dev/null: {0}")]
    DevNull(io::Error),
    #[error("could not bind port {port}: {source}")]
    Bind { port: u16, source: io::Error },
    #[error("could not look up user {name}: {source}")]
    Lookup { name: String, source: Errno },
    #[error("user {0} not found")]
    NoSuchUser(String),
    #[error("setgroups failed: {0}")]
    Setgroups(Errno),
    #[error("setgid failed: {0}")]
    Setgid(Errno),
    #[error("setuid failed: {0}")]
    Setuid(Errno),
}

type Result<T> = std::result::Result<T, ProcError>;

pub fn require_root() -> Result<()> {
    if Uid::current().is_root() {
        Ok(())
    } else {
        Err(ProcError::NotRoot)
    }
}

/// Ignore SIGHUP until the control loop installs its reload handler, so a hangup during startup
/// cannot kill the process. The disposition survives fork.
pub fn ignore_hangup() -> Result<()> {
    unsafe { signal::signal(Signal::SIGHUP, SigHandler::SigIgn) }.map_err(ProcError::Signal)?;
    Ok(())
}

/// Detach from the controlling terminal. Only the child returns.
///
/// Must run before any threads exist, i.e. before the async runtime is built.
pub fn daemonize() -> Result<()> {
    match unsafe { fork() }.map_err(ProcError::Fork)? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }

    setsid().map_err(ProcError::Setsid)?;
    umask(Mode::empty());

    // Keep the working directory from pinning a mount.
    std::env::set_current_dir("/").map_err(ProcError::Chdir)?;

    let null = OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")
        .map_err(ProcError::DevNull)?;

    for fd in STDIO {
        dup2(null.as_raw_fd(), fd).map_err(|e| ProcError::DevNull(e.into()))?;
    }

    Ok(())
}

/// Bind the listening socket on all IPv4 addresses. Called while still privileged so ports below
/// 1024 are available.
///
/// IPv4 only: a `::` wildcard is IPv6-only on hosts without dual-stack sockets (OpenBSD).
pub fn bind(port: u16) -> Result<TcpListener> {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
        .map_err(|source| ProcError::Bind { port, source })?;

    listener
        .set_nonblocking(true)
        .map_err(|source| ProcError::Bind { port, source })?;

    Ok(listener)
}

/// Switch groups, then gid, then uid to `name`. There is no way back.
pub fn drop_privileges(name: &str) -> Result<User> {
    let user = User::from_name(name)
        .map_err(|source| ProcError::Lookup {
            name: name.to_owned(),
            source,
        })?
        .ok_or_else(|| ProcError::NoSuchUser(name.to_owned()))?;

    #[cfg(not(any(target_os = "macos", target_os = "ios")))]
    nix::unistd::setgroups(&[user.gid]).map_err(ProcError::Setgroups)?;

    setgid(user.gid).map_err(ProcError::Setgid)?;
    setuid(user.uid).map_err(ProcError::Setuid)?;

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_ephemeral_port() {
        let listener = bind(0).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(addr.ip(), Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn hangup_is_ignored_during_startup() {
        ignore_hangup().unwrap();
        signal::raise(Signal::SIGHUP).unwrap();

        let previous = unsafe { signal::signal(Signal::SIGHUP, SigHandler::SigIgn) }.unwrap();
        assert_eq!(previous, SigHandler::SigIgn);
    }

    #[test]
    fn bind_port_in_use() {
        let first = bind(0).unwrap();
        let port = first.local_addr().unwrap().port();

        // std sets SO_REUSEADDR but not SO_REUSEPORT, so a second listener is refused.
        match bind(port) {
            Err(ProcError::Bind { port: p, .. }) => assert_eq!(p, port),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn drop_to_missing_user() {
        match drop_privileges("pronound-no-such-account") {
            Err(ProcError::NoSuchUser(name)) => assert_eq!(name, "pronound-no-such-account"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
