//! Network boundary of the consensus core.
//!
//! Delivery is assumed to be at-least-once with no ordering guarantee, the
//! protocol tolerates both duplicates and reordering.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::trace;

use crate::{Error, Result};

pub trait NetworkService: Send + Sync {
    /// Sends `payload` to every other peer speaking `protocol`.
    fn broadcast(&self, protocol: &str, payload: Vec<u8>) -> Result<()>;

    /// Inbound payloads for `protocol` are pushed into the returned channel.
    fn register_protocol(&self, protocol: &str) -> Receiver<Vec<u8>>;
}

type NodeId = usize;

#[derive(Default)]
struct Routes {
    next_id: NodeId,
    inboxes: BTreeMap<(String, NodeId), Sender<Vec<u8>>>,
}

/// In-memory fully connected network.
#[derive(Clone, Default)]
pub struct Simulator {
    routes: Arc<Mutex<Routes>>,
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_node(&self) -> SimNode {
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        routes.next_id += 1;
        let id = routes.next_id;
        SimNode {
            id,
            routes: self.routes.clone(),
        }
    }
}

/// One participant's view of a [`Simulator`].
#[derive(Clone)]
pub struct SimNode {
    id: NodeId,
    routes: Arc<Mutex<Routes>>,
}

impl SimNode {
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl NetworkService for SimNode {
    fn broadcast(&self, protocol: &str, payload: Vec<u8>) -> Result<()> {
        let mut routes = self
            .routes
            .lock()
            .map_err(|_| Error::Network("simulator routes poisoned".to_string()))?;

        // peers whose receiver is gone are forgotten
        routes.inboxes.retain(|(proto, peer), inbox| {
            if proto != protocol || *peer == self.id {
                return true;
            }
            trace!("[SIM-{}] -> {} ({} bytes)", self.id, peer, payload.len());
            inbox.send(payload.clone()).is_ok()
        });
        Ok(())
    }

    fn register_protocol(&self, protocol: &str) -> Receiver<Vec<u8>> {
        let (tx, rx) = unbounded();
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .inboxes
            .insert((protocol.to_string(), self.id), tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_reaches_other_nodes_only() {
        let sim = Simulator::new();
        let n1 = sim.new_node();
        let n2 = sim.new_node();
        let n3 = sim.new_node();

        let rx1 = n1.register_protocol("hare");
        let rx2 = n2.register_protocol("hare");
        let rx3 = n3.register_protocol("other");

        n1.broadcast("hare", vec![1, 2, 3]).unwrap();

        assert_eq!(rx2.try_recv(), Ok(vec![1, 2, 3]));
        assert!(rx1.try_recv().is_err());
        assert!(rx3.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_is_forgotten() {
        let sim = Simulator::new();
        let n1 = sim.new_node();
        let n2 = sim.new_node();

        drop(n2.register_protocol("hare"));
        n1.broadcast("hare", vec![]).unwrap();
        n1.broadcast("hare", vec![]).unwrap();
        assert!(sim.routes.lock().unwrap().inboxes.is_empty());
    }
}
