use anyhow::Result;
use eventsource_client::{self as es, Client};
use futures_util::stream::StreamExt;
use log::*;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub enum StreamItem {
    Event {
        event_type: String,
        data: Value,
    },
    Comment(String),
}

pub struct Connection {
    pub session_id: String,
    item_rx: mpsc::UnboundedReceiver<StreamItem>,
    _handle: tokio::task::JoinHandle<()>,
}

impl Connection {
    /// Open the SSE stream and learn the session identity from the opening
    /// comment the server writes.
    pub async fn establish(base_url: &str) -> Result<Self> {
        let url = format!("{}/stream", base_url);
        let (tx, rx) = mpsc::unbounded_channel();

        let client = es::ClientBuilder::for_url(&url)?.build();

        let handle = tokio::spawn(async move {
            let mut stream = client.stream();

            loop {
                match stream.next().await {
                    Some(Ok(es::SSE::Event(event))) => {
                        if let Ok(data) = serde_json::from_str(&event.data) {
                            let item = StreamItem::Event {
                                event_type: event.event_type,
                                data,
                            };

                            if tx.send(item).is_err() {
                                debug!("SSE receiver dropped");
                                break;
                            }
                        }
                    }
                    Some(Ok(es::SSE::Comment(comment))) => {
                        if tx
                            .send(StreamItem::Comment(comment.trim().to_string()))
                            .is_err()
                        {
                            debug!("SSE receiver dropped");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("SSE error: {}", e);
                    }
                    None => {
                        debug!("SSE stream ended");
                        break;
                    }
                }
            }
        });

        let mut connection = Self {
            session_id: String::new(),
            item_rx: rx,
            _handle: handle,
        };

        // The first comment on the wire is the session identity
        let opening = connection
            .wait_for_comment(Duration::from_secs(5))
            .await?;
        connection.session_id = opening;

        Ok(connection)
    }

    pub async fn wait_for_comment(&mut self, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.next_item(deadline).await? {
                StreamItem::Comment(comment) => return Ok(comment),
                StreamItem::Event { .. } => continue,
            }
        }
    }

    pub async fn wait_for_event(
        &mut self,
        event_type: &str,
        timeout: Duration,
    ) -> Result<(String, Value)> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.next_item(deadline).await? {
                StreamItem::Event {
                    event_type: received,
                    data,
                } if received == event_type => return Ok((received, data)),
                _ => continue,
            }
        }
    }

    /// Confirm that nothing but comments arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) -> Result<()> {
        let deadline = Instant::now() + window;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }

            match tokio::time::timeout(remaining, self.item_rx.recv()).await {
                Ok(Some(StreamItem::Comment(_))) => continue,
                Ok(Some(StreamItem::Event { event_type, .. })) => {
                    anyhow::bail!("Unexpected event on the stream: {}", event_type);
                }
                Ok(None) => anyhow::bail!("SSE connection closed"),
                Err(_) => return Ok(()),
            }
        }
    }

    async fn next_item(&mut self, deadline: Instant) -> Result<StreamItem> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            anyhow::bail!("Timeout waiting for stream item");
        }

        match tokio::time::timeout(remaining, self.item_rx.recv()).await {
            Ok(Some(item)) => Ok(item),
            Ok(None) => anyhow::bail!("SSE connection closed"),
            Err(_) => anyhow::bail!("Timeout waiting for stream item"),
        }
    }
}
