//! Mapping request tokens onto accounts in the system user database.

use nix::unistd::{Uid, User};
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Authoritative account details, as recorded by the user database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub home_directory: PathBuf,
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Identity {
            uid: user.uid.as_raw(),
            home_directory: user.dir,
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("user not found")]
pub struct NotFound;

/// How a token is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Empty,
    /// Decimal digits with at most one leading `-`.
    Numeric,
    Name,
}

impl TokenKind {
    pub fn classify(token: &str) -> TokenKind {
        if token.is_empty() {
            return TokenKind::Empty;
        }

        let digits = token.strip_prefix('-').unwrap_or(token);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            TokenKind::Numeric
        } else {
            TokenKind::Name
        }
    }
}

/// Source of account records.
pub trait UserDirectory: Send + Sync {
    fn by_uid(&self, uid: u32) -> io::Result<Option<Identity>>;
    fn by_name(&self, name: &str) -> io::Result<Option<Identity>>;
}

/// The host's user database (`getpwuid(3)` / `getpwnam(3)`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDirectory;

impl UserDirectory for SystemDirectory {
    fn by_uid(&self, uid: u32) -> io::Result<Option<Identity>> {
        Ok(User::from_uid(Uid::from_raw(uid))?.map(Identity::from))
    }

    fn by_name(&self, name: &str) -> io::Result<Option<Identity>> {
        if name.contains('\0') {
            return Ok(None);
        }

        Ok(User::from_name(name)?.map(Identity::from))
    }
}

/// Resolve a request token to an account. Every call queries `directory` afresh.
pub fn resolve<D>(directory: &D, token: &str) -> Result<Identity, NotFound>
where
    D: UserDirectory + ?Sized,
{
    let found = match TokenKind::classify(token) {
        TokenKind::Empty => return Err(NotFound),
        // "-0" is uid 0; other negative and overflowing ids cannot name an account.
        TokenKind::Numeric => match token.parse::<i64>().map(u32::try_from) {
            Ok(Ok(uid)) => directory.by_uid(uid),
            _ => return Err(NotFound),
        },
        TokenKind::Name => directory.by_name(token),
    };

    match found {
        Ok(Some(identity)) => Ok(identity),
        Ok(None) => Err(NotFound),
        Err(e) => {
            debug!(token, error = %e, "user lookup failed");
            Err(NotFound)
        }
    }
}
