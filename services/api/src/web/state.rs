//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the live connection counter.

use crate::config::Config;
use crate::web::protocol::ServerMessage;
use reading_groups_core::content::ContentLocator;
use reading_groups_core::ports::DatabaseService;
use reading_groups_core::service::ReadingService;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub reading: ReadingService,
    pub content: ContentLocator,
    pub live: Arc<LiveCounter>,
}

impl AppState {
    pub fn new(db: Arc<dyn DatabaseService>, config: Arc<Config>) -> Self {
        Self {
            reading: ReadingService::new(db.clone()),
            content: ContentLocator::new(&config.pdf_base_url, &config.psalms_base_url),
            live: Arc::new(LiveCounter::new()),
            db,
            config,
        }
    }
}

//=========================================================================================
// LiveCounter (Open WebSocket Connections)
//=========================================================================================

/// Counts open WebSocket connections and broadcasts every change.
pub struct LiveCounter {
    connections: AtomicUsize,
    sender: broadcast::Sender<ServerMessage>,
}

impl Default for LiveCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveCounter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            connections: AtomicUsize::new(0),
            sender,
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.sender.subscribe()
    }

    /// Registers a connection and announces the new total.
    pub fn connect(&self) -> usize {
        let value = self.connections.fetch_add(1, Ordering::SeqCst) + 1;
        self.announce(value);
        value
    }

    /// Unregisters a connection and announces the new total.
    pub fn disconnect(&self) -> usize {
        let value = self
            .connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|previous| previous - 1)
            .unwrap_or(0);
        self.announce(value);
        value
    }

    fn announce(&self, value: usize) {
        // No receivers just means nobody is listening right now.
        let _ = self
            .sender
            .send(ServerMessage::ConnectionsCounter { value });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counter_broadcasts_changes() {
        let counter = LiveCounter::new();
        let mut rx = counter.subscribe();

        assert_eq!(counter.connect(), 1);
        assert_eq!(counter.connect(), 2);
        assert_eq!(counter.disconnect(), 1);

        let values: Vec<usize> = [rx.recv().await, rx.recv().await, rx.recv().await]
            .into_iter()
            .map(|m| match m.unwrap() {
                ServerMessage::ConnectionsCounter { value } => value,
            })
            .collect();
        assert_eq!(values, vec![1, 2, 1]);
    }

    #[test]
    fn disconnect_never_underflows() {
        let counter = LiveCounter::new();
        assert_eq!(counter.disconnect(), 0);
        assert_eq!(counter.connections(), 0);
    }
}
