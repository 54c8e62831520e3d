//! Message delivery between contexts.
//!
//! Two primitives:
//!
//! - [`Endpoint`] - request/reply to exactly one receiver (a page agent or
//!   the coordinator's runtime handler). The reply is sent asynchronously,
//!   after whatever I/O the receiver needs to do.
//! - [`Broadcaster`] - best-effort publish to zero or more subscribers.
//!   Publishing with nobody listening is normal, not an error.

use crate::protocol::{Message, Reply};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::trace;

const ENDPOINT_CAPACITY: usize = 32;
const BROADCAST_CAPACITY: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Could not establish connection. Receiving end does not exist.")]
    NoReceiver,

    #[error("The message port closed before a response was received.")]
    NoReply,
}

/// A message in flight together with the channel its reply goes back on.
#[derive(Debug)]
pub struct Envelope {
    pub message: Message,
    pub reply: oneshot::Sender<Reply>,
}

impl Envelope {
    /// Sends the reply; a caller that stopped waiting is not an error.
    pub fn respond(self, reply: Reply) {
        let _ = self.reply.send(reply);
    }
}

#[derive(Debug, Clone)]
pub struct Endpoint {
    tx: mpsc::Sender<Envelope>,
}

impl Endpoint {
    pub fn channel() -> (Endpoint, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(ENDPOINT_CAPACITY);
        (Endpoint { tx }, rx)
    }

    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }

    pub async fn request(&self, message: Message) -> Result<Reply, DeliveryError> {
        trace!("Delivering {}", message.action());
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                message,
                reply: reply_tx,
            })
            .await
            .map_err(|_| DeliveryError::NoReceiver)?;
        reply_rx.await.map_err(|_| DeliveryError::NoReply)
    }
}

#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<Message>,
}

impl Broadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.tx.subscribe()
    }

    /// Returns how many subscribers the message reached.
    pub fn publish(&self, message: Message) -> usize {
        let action = message.action();
        match self.tx.send(message) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!("No subscribers for {}", action);
                0
            }
        }
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RateLimitInfo;

    #[tokio::test]
    async fn test_request_reply() {
        let (endpoint, mut rx) = Endpoint::channel();
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                envelope.respond(Reply::Ready);
            }
        });

        assert_eq!(endpoint.request(Message::Ping).await, Ok(Reply::Ready));
    }

    #[tokio::test]
    async fn test_request_without_receiver() {
        let (endpoint, rx) = Endpoint::channel();
        drop(rx);

        assert!(!endpoint.is_connected());
        assert_eq!(
            endpoint.request(Message::Ping).await,
            Err(DeliveryError::NoReceiver)
        );
    }

    #[tokio::test]
    async fn test_receiver_drops_reply() {
        let (endpoint, mut rx) = Endpoint::channel();
        tokio::spawn(async move {
            let envelope = rx.recv().await;
            drop(envelope);
        });

        assert_eq!(
            endpoint.request(Message::Ping).await,
            Err(DeliveryError::NoReply)
        );
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let broadcaster = Broadcaster::new();
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        let message = Message::UpdateRateLimit {
            info: RateLimitInfo::default(),
        };
        assert_eq!(broadcaster.publish(message.clone()), 2);
        assert_eq!(first.recv().await.unwrap(), message);
        assert_eq!(second.recv().await.unwrap(), message);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let broadcaster = Broadcaster::new();
        assert_eq!(broadcaster.publish(Message::Ping), 0);
    }
}
