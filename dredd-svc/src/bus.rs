//! NATS bus adapter
//!
//! Thin wrapper over the swarm's message bus. Publishing is fire-and-forget
//! JSON; subscription hands each message to a spawned task so no handler IO
//! ever runs on the drain loop.

use dredd_common::{Error, Result};
use futures::StreamExt;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

/// Connected bus handle. Cheap to clone.
#[derive(Clone)]
pub struct Bus {
    client: async_nats::Client,
}

impl Bus {
    /// Connects to the bus, optionally with a token.
    pub async fn connect(url: &str, token: &str) -> Result<Self> {
        let mut opts = async_nats::ConnectOptions::new()
            .retry_on_initial_connect()
            .reconnect_delay_callback(|attempts| {
                Duration::from_secs(2).min(Duration::from_millis(100 * attempts as u64))
            });
        if !token.is_empty() {
            opts = opts.token(token.to_string());
        }

        let client = opts
            .connect(url)
            .await
            .map_err(|e| Error::Internal(format!("nats connect: {e}")))?;

        Ok(Self { client })
    }

    /// Publishes a JSON payload. Delivery is at-most-once from Dredd's side;
    /// the bus owns redelivery.
    pub async fn publish_json<T: Serialize>(&self, subject: &str, payload: &T) -> Result<()> {
        let bytes =
            serde_json::to_vec(payload).map_err(|e| Error::Internal(format!("marshal: {e}")))?;
        self.client
            .publish(subject.to_string(), bytes.into())
            .await
            .map_err(|e| Error::Internal(format!("publish {subject}: {e}")))?;
        Ok(())
    }

    /// Subscribes to a subject (wildcards allowed) and dispatches every
    /// message to `handler` in its own task. The drain loop itself does no
    /// work beyond the hand-off.
    pub async fn subscribe<F, Fut>(&self, subject: &str, handler: F) -> Result<()>
    where
        F: Fn(String, Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut sub = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| Error::Internal(format!("subscribe {subject}: {e}")))?;

        tracing::info!(subject, "subscribed");

        tokio::spawn(async move {
            while let Some(msg) = sub.next().await {
                let fut = handler(msg.subject.to_string(), msg.payload.to_vec());
                tokio::spawn(fut);
            }
        });

        Ok(())
    }
}
