//! Single-slot token handoff
//!
//! Connects the `/token` handler (producer) to the session's wait (consumer).
//! The slot is write-once: the first `send` takes the underlying oneshot
//! sender, later sends are dropped without blocking. The receiver is consumed
//! by `recv`, so a value is observed at most once.

use std::sync::{Arc, Mutex, PoisonError};

use common::Secret;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

/// Create a connected sender/receiver pair with an empty slot.
pub fn token_slot() -> (TokenSender, TokenReceiver) {
    let (tx, rx) = oneshot::channel();
    (
        TokenSender {
            slot: Arc::new(Mutex::new(Some(tx))),
        },
        TokenReceiver { rx },
    )
}

/// Producer half. Cheap to clone; every clone writes into the same slot.
#[derive(Clone, Debug)]
pub struct TokenSender {
    slot: Arc<Mutex<Option<oneshot::Sender<String>>>>,
}

impl TokenSender {
    /// Offer a token to the slot.
    ///
    /// Returns `true` when this call filled the slot and `false` when an
    /// earlier call already had. Never blocks.
    pub fn send(&self, token: String) -> bool {
        let tx = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match tx {
            Some(tx) => {
                if tx.send(token).is_err() {
                    debug!("token receiver already gone, delivery dropped");
                }
                true
            }
            None => {
                debug!("token slot already filled, dropping duplicate delivery");
                false
            }
        }
    }

    /// Whether a token has already been written.
    #[cfg(test)]
    pub(crate) fn is_filled(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Consumer half.
#[derive(Debug)]
pub struct TokenReceiver {
    rx: oneshot::Receiver<String>,
}

impl TokenReceiver {
    /// Wait for the token or for `cancel` to fire, whichever comes first.
    ///
    /// An empty token or a slot whose senders were all dropped resolves to
    /// `Error::TokenNotReceived`.
    pub async fn recv(self, cancel: &CancellationToken) -> Result<Secret<String>> {
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            delivered = self.rx => match delivered {
                Ok(token) if !token.is_empty() => Ok(Secret::new(token)),
                Ok(_) | Err(_) => Err(Error::TokenNotReceived),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn delivers_first_token() {
        let (tx, rx) = token_slot();
        assert!(!tx.is_filled());
        assert!(tx.send("abc123".into()));
        assert!(tx.is_filled());

        let token = rx.recv(&CancellationToken::new()).await.unwrap();
        assert_eq!(token.expose(), "abc123");
    }

    #[tokio::test]
    async fn second_send_is_dropped_without_blocking() {
        let (tx, rx) = token_slot();
        assert!(tx.send("first".into()));
        assert!(!tx.clone().send("second".into()));

        let token = rx.recv(&CancellationToken::new()).await.unwrap();
        assert_eq!(token.expose(), "first");
    }

    #[tokio::test]
    async fn empty_token_is_not_a_token() {
        let (tx, rx) = token_slot();
        tx.send(String::new());

        let err = rx.recv(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::TokenNotReceived), "got: {err:?}");
    }

    #[tokio::test]
    async fn closed_slot_fails_the_wait() {
        let (tx, rx) = token_slot();
        drop(tx);

        let err = rx.recv(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::TokenNotReceived), "got: {err:?}");
    }

    #[tokio::test]
    async fn cancellation_wins_when_nothing_arrives() {
        let (_tx, rx) = token_slot();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(1), rx.recv(&cancel))
            .await
            .expect("recv must return promptly after cancellation");
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn send_from_another_task_is_observed() {
        let (tx, rx) = token_slot();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send("from-handler".into());
        });

        let token = rx.recv(&CancellationToken::new()).await.unwrap();
        assert_eq!(token.expose(), "from-handler");
    }
}
