//! In-process update bus: broadcast fan-out for outbound updates and an
//! mpsc intake for inbound peer notifications.

use std::sync::Mutex;

use async_trait::async_trait;
use metrics::counter;
use tokio::sync::{broadcast, mpsc};

use crate::application::messaging::{BusError, PeerMessage, UpdateBus, UpdateMessage};

const METRIC_BUS_PUBLISHES: &str = "mediateca_bus_publish_total";

pub struct InProcessBus {
    updates: broadcast::Sender<UpdateMessage>,
    peers: mpsc::Sender<PeerMessage>,
    peer_intake: Mutex<Option<mpsc::Receiver<PeerMessage>>>,
}

impl InProcessBus {
    pub fn new(capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity.max(1));
        let (peers, intake) = mpsc::channel(capacity.max(1));
        Self {
            updates,
            peers,
            peer_intake: Mutex::new(Some(intake)),
        }
    }

    /// Live observation of the outbound fan-out.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<UpdateMessage> {
        self.updates.subscribe()
    }

    /// Sender half that peer services hand notifications in through.
    pub fn peer_sender(&self) -> mpsc::Sender<PeerMessage> {
        self.peers.clone()
    }

    /// The intake half, takeable once by the boot-time listener task.
    pub fn take_peer_intake(&self) -> Option<mpsc::Receiver<PeerMessage>> {
        self.peer_intake.lock().ok()?.take()
    }
}

#[async_trait]
impl UpdateBus for InProcessBus {
    async fn publish(&self, message: UpdateMessage) -> Result<(), BusError> {
        counter!(METRIC_BUS_PUBLISHES).increment(1);
        // No subscribers is not a failure; the fan-out is best effort.
        let _ = self.updates.send(message);
        Ok(())
    }
}
