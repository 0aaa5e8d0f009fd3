use clap::Parser;
use std::io::{self, Write};
use std::process::ExitCode;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Ask a pronound server for a user's pronouns
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// <username|uid>@<hostname>
    target: String,

    /// Server port
    #[arg(default_value_t = 731)]
    port: u16,
}

#[derive(Debug, Error)]
enum ClientError {
    #[error("username or uid is required")]
    MissingUser,
    #[error("hostname is required")]
    MissingHost,
    #[error("could not connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        source: io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn split_target(target: &str) -> Result<(&str, &str), ClientError> {
    let (user, host) = target.split_once('@').unwrap_or((target, ""));

    if user.is_empty() {
        return Err(ClientError::MissingUser);
    }
    if host.is_empty() {
        return Err(ClientError::MissingHost);
    }

    Ok((user, host))
}

async fn query(cli: &Cli) -> Result<Vec<u8>, ClientError> {
    let (user, host) = split_target(&cli.target)?;

    let mut stream = TcpStream::connect((host, cli.port))
        .await
        .map_err(|source| ClientError::Connect {
            host: host.to_owned(),
            port: cli.port,
            source,
        })?;

    stream.write_all(format!("{user}\n").as_bytes()).await?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;

    Ok(response)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match query(&cli).await {
        Ok(response) => {
            let mut stdout = io::stdout();
            if stdout.write_all(&response).and_then(|_| stdout.flush()).is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("pronoun: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn target_parts() {
        assert_eq!(split_target("alice@example.org").unwrap(), ("alice", "example.org"));
        assert_eq!(split_target("1000@::1").unwrap(), ("1000", "::1"));
        assert!(matches!(split_target("@host"), Err(ClientError::MissingUser)));
        assert!(matches!(split_target("alice"), Err(ClientError::MissingHost)));
        assert!(matches!(split_target("alice@"), Err(ClientError::MissingHost)));
    }

    #[tokio::test]
    async fn sends_one_line_and_returns_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).await.unwrap();
            stream.write_all(b"she/her\n").await.unwrap();
            buf[..n].to_vec()
        });

        let cli = Cli {
            target: "alice@127.0.0.1".to_owned(),
            port,
        };
        let response = query(&cli).await.unwrap();

        assert_eq!(response, b"she/her\n");
        assert_eq!(server.await.unwrap(), b"alice\n");
    }
}
