//! Minimal operator console: relays stdin lines to the display and prints
//! whatever feedback comes back.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{info, warn};

/// Queries sent on connect so the console starts from the display's state.
pub const RESYNC: &[&str] = &[
    "POSITIONS?",
    "TEAMS?",
    "COLOURS?",
    "SCORES?",
    "LEFT STATE?",
    "RIGHT STATE?",
];

pub async fn run(addr: SocketAddr) -> Result<()> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("could not connect to display at {addr}"))?;
    info!(%addr, "connected to display");
    let (reader, mut writer) = stream.into_split();
    for query in RESYNC {
        writer.write_all(format!("{query}\n").as_bytes()).await?;
    }

    let mut feedback = BufReader::new(reader).lines();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        tokio::select! {
            line = input.next_line() => match line? {
                Some(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        writer.write_all(format!("{line}\n").as_bytes()).await?;
                    }
                }
                None => break,
            },
            message = feedback.next_line() => match message? {
                Some(message) => {
                    stdout.write_all(format!("{message}\n").as_bytes()).await?;
                    stdout.flush().await?;
                    if is_shutdown(&message) {
                        info!("display is shutting down");
                        break;
                    }
                }
                None => {
                    warn!("display closed the connection");
                    break;
                }
            },
        }
    }
    Ok(())
}

pub fn is_shutdown(message: &str) -> bool {
    message.split_whitespace().next() == Some("QUIT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Command, Kind};

    #[test]
    fn recognises_shutdown() {
        assert!(is_shutdown("QUIT"));
        assert!(is_shutdown("  QUIT now"));
        assert!(!is_shutdown("left QUIT"));
        assert!(!is_shutdown("QUITE"));
    }

    #[test]
    fn resync_lines_are_queries() {
        for line in RESYNC {
            let command = Command::parse(line).unwrap();
            let scoped = matches!(command.verb.as_str(), "left" | "right");
            let query = if scoped {
                Command::from_tokens(command.args).unwrap()
            } else {
                command
            };
            assert_eq!(query.kind, Kind::Query, "{line}");
        }
    }
}
