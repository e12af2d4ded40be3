//! The two queues crossing the thread boundary between the transport and the
//! render/dispatch loop. Everything else is owned by the loop thread.

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[cfg(test)]
    #[error("instruction queue is full")]
    Full,
    #[error("instruction queue is closed")]
    Closed,
}

pub fn command_channel(capacity: usize) -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (CommandSender { tx }, CommandReceiver { rx })
}

pub fn feedback_channel() -> (FeedbackSender, FeedbackReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FeedbackSender { tx }, FeedbackReceiver { rx })
}

/// Producer side of the Command Channel. Cheap to clone; one per connection.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<String>,
}

impl CommandSender {
    /// Waits for room when the queue is full; the loop drains it every tick.
    pub async fn enqueue(&self, command: impl Into<String>) -> Result<(), ChannelError> {
        self.tx
            .send(command.into())
            .await
            .map_err(|_| ChannelError::Closed)
    }

    /// Never blocks.
    #[cfg(test)]
    pub fn try_enqueue(&self, command: impl Into<String>) -> Result<(), ChannelError> {
        self.tx.try_send(command.into()).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => ChannelError::Full,
            mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
        })
    }
}

#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::Receiver<String>,
}

impl CommandReceiver {
    /// Takes everything queued right now, in arrival order, without waiting.
    pub fn drain(&mut self) -> Vec<String> {
        let mut commands = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(command) => commands.push(command),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        commands
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackSender {
    tx: mpsc::UnboundedSender<String>,
}

impl FeedbackSender {
    /// Fire and forget; a missing consumer is not the loop's problem.
    pub fn publish(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(%message, "feedback.publish");
        if self.tx.send(message).is_err() {
            tracing::trace!("feedback consumer gone; message dropped");
        }
    }
}

#[derive(Debug)]
pub struct FeedbackReceiver {
    rx: mpsc::UnboundedReceiver<String>,
}

impl FeedbackReceiver {
    #[cfg(test)]
    pub fn dequeue_all(&mut self) -> Vec<String> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_arrival_order() {
        let (tx, mut rx) = command_channel(8);
        for line in ["name 0 a", "score 0 +1", "scores?"] {
            tx.try_enqueue(line).unwrap();
        }
        assert_eq!(rx.drain(), vec!["name 0 a", "score 0 +1", "scores?"]);
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn try_enqueue_reports_a_full_queue() {
        let (tx, mut rx) = command_channel(1);
        tx.try_enqueue("first").unwrap();
        assert_eq!(tx.try_enqueue("second"), Err(ChannelError::Full));
        assert_eq!(rx.drain(), vec!["first"]);
        tx.try_enqueue("third").unwrap();
        assert_eq!(rx.drain(), vec!["third"]);
    }

    #[test]
    fn closed_queue_is_reported() {
        let (tx, rx) = command_channel(1);
        drop(rx);
        assert_eq!(tx.try_enqueue("lost"), Err(ChannelError::Closed));
    }

    #[tokio::test]
    async fn producers_on_other_tasks_are_not_lost() {
        let (tx, mut rx) = command_channel(4);
        let mut handles = Vec::new();
        for worker in 0..3 {
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                for n in 0..2 {
                    tx.enqueue(format!("w{worker} {n}")).await.unwrap();
                }
            }));
        }
        let mut seen = Vec::new();
        while seen.len() < 6 {
            seen.extend(rx.drain());
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap();
        }
        seen.sort();
        assert_eq!(seen, vec!["w0 0", "w0 1", "w1 0", "w1 1", "w2 0", "w2 1"]);
    }

    #[tokio::test]
    async fn feedback_is_drained_independently() {
        let (tx, mut rx) = feedback_channel();
        tx.publish("TEAMS \"Haddock\"");
        tx.publish("SCORES 0");
        assert_eq!(rx.dequeue_all(), vec!["TEAMS \"Haddock\"", "SCORES 0"]);
        tx.publish("QUIT");
        assert_eq!(rx.recv().await.as_deref(), Some("QUIT"));
    }
}
