//! Line-oriented TCP transport. Each connected console may send instruction
//! lines and receives every feedback line the engine publishes.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::channel::{CommandSender, FeedbackReceiver};

/// Feedback lines buffered per console before a slow one starts missing them.
const FEEDBACK_BACKLOG: usize = 256;

pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("command listener bind failed on {addr}"))?;
    info!(addr = %listener.local_addr()?, "command listener ready");
    Ok(listener)
}

/// Accepts consoles until the process exits.
pub async fn serve(listener: TcpListener, commands: CommandSender, mut feedback: FeedbackReceiver) {
    let (fan_out, _) = broadcast::channel::<String>(FEEDBACK_BACKLOG);
    let pump = fan_out.clone();
    tokio::spawn(async move {
        while let Some(message) = feedback.recv().await {
            // No consoles connected is fine.
            let _ = pump.send(message);
        }
    });

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!(%addr, "console connected");
                let commands = commands.clone();
                let feedback = fan_out.subscribe();
                tokio::spawn(async move {
                    handle_client(stream, commands, feedback).await;
                    info!(%addr, "console disconnected");
                });
            }
            Err(err) => warn!(%err, "error accepting console"),
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    commands: CommandSender,
    mut feedback: broadcast::Receiver<String>,
) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    debug!(instruction = trimmed, "instruction received");
                    if commands.enqueue(trimmed).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(%err, "console read error");
                    break;
                }
            },
            message = feedback.recv() => match message {
                Ok(message) => {
                    let line = format!("{message}\n");
                    if let Err(err) = writer.write_all(line.as_bytes()).await {
                        warn!(%err, "console write error");
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => warn!(missed, "console fell behind on feedback"),
                Err(RecvError::Closed) => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::channel::{command_channel, feedback_channel};

    #[tokio::test]
    async fn relays_instructions_and_feedback() {
        let listener = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (commands, mut instructions) = command_channel(8);
        let (publisher, feedback) = feedback_channel();
        tokio::spawn(serve(listener, commands, feedback));

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        writer.write_all(b"TEAMS?\n\n  score 0 +1  \n").await.unwrap();

        let mut received = Vec::new();
        for _ in 0..100 {
            received.extend(instructions.drain());
            if received.len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(received, vec!["TEAMS?", "score 0 +1"]);

        publisher.publish(r#"TEAMS "Owls""#);
        let mut lines = BufReader::new(reader).lines();
        let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line.as_deref(), Some(r#"TEAMS "Owls""#));
    }

    #[tokio::test]
    async fn bind_reports_the_address() {
        let first = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let taken = first.local_addr().unwrap();
        let err = bind(taken).await.unwrap_err();
        assert!(err.to_string().contains(&taken.to_string()));
    }
}
