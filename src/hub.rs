//! Process-wide chat state behind one lock, plus the per-connection outboxes.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{trace, warn};
use uuid::Uuid;

use crate::{
    ConnectionId,
    activity::Clock,
    config::Config,
    protocol::{Action, Event, Outbound},
    rooms::RoomSummary,
    session::Coordinator,
};

pub type Outbox = mpsc::Receiver<Event>;

struct Inner {
    coordinator: Coordinator,
    outboxes: HashMap<ConnectionId, mpsc::Sender<Event>>,
    outbox_capacity: usize,
}

impl Inner {
    /// Delivery happens under the lock so every connection sees events in
    /// the order their mutations were committed. A connection whose outbox
    /// is full misses the event rather than stalling everyone else.
    fn deliver(&self, batch: Vec<Outbound>) {
        for Outbound { recipients, event } in batch {
            for conn in recipients {
                let Some(tx) = self.outboxes.get(&conn) else {
                    continue;
                };
                match tx.try_send(event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(dropped)) => {
                        warn!(conn = %conn, event = ?dropped, "outbox full, event dropped");
                    }
                    Err(TrySendError::Closed(_)) => trace!(conn = %conn, "outbox closed"),
                }
            }
        }
    }
}

pub struct Hub {
    inner: Mutex<Inner>,
}

impl Hub {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                coordinator: Coordinator::new(config, clock),
                outboxes: HashMap::new(),
                outbox_capacity: config.outbox_capacity.max(1),
            }),
        }
    }

    /// Opens a connection under a fresh id.
    pub fn connect(&self) -> (ConnectionId, Outbox) {
        let conn = Uuid::now_v7().simple().to_string();
        let outbox = self.connect_as(&conn);
        (conn, outbox)
    }

    pub fn connect_as(&self, conn: &str) -> Outbox {
        let mut inner = self.inner.lock();
        let (tx, rx) = mpsc::channel(inner.outbox_capacity);
        inner.outboxes.insert(conn.to_owned(), tx);
        inner.coordinator.connect(conn);
        rx
    }

    pub fn dispatch(&self, conn: &str, action: Action) {
        let mut inner = self.inner.lock();
        let batch = inner.coordinator.handle(conn, action);
        inner.deliver(batch);
        if !inner.coordinator.is_connected(conn) {
            inner.outboxes.remove(conn);
        }
    }

    pub fn disconnect(&self, conn: &str) {
        let mut inner = self.inner.lock();
        let batch = inner.coordinator.disconnect(conn);
        inner.outboxes.remove(conn);
        inner.deliver(batch);
    }

    pub fn room_list(&self) -> Vec<RoomSummary> {
        self.inner.lock().coordinator.room_list()
    }
}
