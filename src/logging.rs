//! Log output for the daemon.
//!
//! Events go to stderr until [`switch_to_syslog`] is called after the daemon transition, and to
//! syslog(3) with the `LOG_DAEMON` facility from then on.

use nix::libc;
use std::ffi::{CStr, CString};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, Metadata};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

// openlog(3) keeps the pointer, so the ident must live forever.
static IDENT: &CStr = c"pronound";

static SYSLOG: AtomicBool = AtomicBool::new(false);

/// Install the global subscriber. The level defaults to `info` and follows `RUST_LOG`.
pub fn init() -> Result<(), TryInitError> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(LogSink))
        .try_init()
}

/// Route every later event to syslog.
pub fn switch_to_syslog() {
    unsafe {
        libc::openlog(
            IDENT.as_ptr(),
            libc::LOG_PID | libc::LOG_NDELAY,
            libc::LOG_DAEMON,
        );
    }

    SYSLOG.store(true, Ordering::Release);
}

struct LogSink;

impl LogSink {
    fn writer(&self, level: Level) -> Sink {
        if SYSLOG.load(Ordering::Acquire) {
            Sink::Syslog(SyslogLine {
                priority: priority(level),
                buf: Vec::new(),
            })
        } else {
            Sink::Console(io::stderr())
        }
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = Sink;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer(Level::INFO)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        self.writer(*meta.level())
    }
}

fn priority(level: Level) -> libc::c_int {
    match level {
        Level::ERROR => libc::LOG_ERR,
        Level::WARN => libc::LOG_WARNING,
        Level::INFO => libc::LOG_INFO,
        Level::DEBUG | Level::TRACE => libc::LOG_DEBUG,
    }
}

enum Sink {
    Console(io::Stderr),
    Syslog(SyslogLine),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Console(stderr) => stderr.write(buf),
            Sink::Syslog(line) => {
                line.buf.extend_from_slice(buf);
                Ok(buf.len())
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Console(stderr) => stderr.flush(),
            Sink::Syslog(_) => Ok(()),
        }
    }
}

/// One formatted event, handed to syslog when the writer is dropped.
struct SyslogLine {
    priority: libc::c_int,
    buf: Vec<u8>,
}

impl Drop for SyslogLine {
    fn drop(&mut self) {
        let mut bytes = std::mem::take(&mut self.buf);
        while bytes.last() == Some(&b'\n') {
            bytes.pop();
        }
        bytes.retain(|&b| b != 0);

        if bytes.is_empty() {
            return;
        }

        if let Ok(msg) = CString::new(bytes) {
            unsafe {
                libc::syslog(self.priority, c"%s".as_ptr(), msg.as_ptr());
            }
        }
    }
}
