//! Routes inbound Hare traffic to the consensus instance it belongs to.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use log::{debug, info, trace, warn};

use crate::consensus::ConsensusProcess;
use crate::message::{HareMessage, InstanceId, PROTOCOL_NAME};
use crate::network::NetworkService;
use crate::{Error, Result};

type Instances = HashMap<InstanceId, Arc<ConsensusProcess>>;

pub struct Broker {
    network: Arc<dyn NetworkService>,
    instances: RwLock<Instances>,
    stop_tx: Mutex<Option<Sender<()>>>,
}

impl Broker {
    pub fn new(network: Arc<dyn NetworkService>) -> Arc<Self> {
        Arc::new(Self {
            network,
            instances: Default::default(),
            stop_tx: Mutex::new(None),
        })
    }

    /// Subscribes to the Hare protocol and starts routing inbound payloads.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let mut stop_tx = self.stop_tx.lock().unwrap_or_else(PoisonError::into_inner);
        if stop_tx.is_some() {
            return Err(Error::AlreadyStarted);
        }

        let inbound = self.network.register_protocol(PROTOCOL_NAME);
        let (tx, stop_rx) = bounded(0);
        let broker = Arc::clone(self);
        thread::Builder::new()
            .name("hare-broker".to_string())
            .spawn(move || broker.ingress_loop(inbound, stop_rx))?;

        *stop_tx = Some(tx);
        info!("[BROKER] listening on protocol {}", PROTOCOL_NAME);
        Ok(())
    }

    /// Stops routing. Registered instances are left untouched.
    pub fn close(&self) {
        let stopped = self
            .stop_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if stopped.is_some() {
            debug!("[BROKER] closing");
        }
    }

    /// Registers `process` under its instance id, replacing any previous
    /// registration of that id. The entry is removed once the process stops.
    pub fn register(self: &Arc<Self>, process: Arc<ConsensusProcess>) {
        let id = process.instance_id();
        let replaced = self.write().insert(id, Arc::clone(&process));
        if replaced.is_some() {
            debug!("[BROKER] instance {} re-registered", id);
        }

        let broker = Arc::downgrade(self);
        let registered = Arc::downgrade(&process);
        process.on_finish(Box::new(move |id| {
            if let Some(broker) = broker.upgrade() {
                broker.remove_if_current(id, registered.as_ptr());
            }
        }));
    }

    pub fn unregister(&self, instance_id: InstanceId) -> Option<Arc<ConsensusProcess>> {
        self.write().remove(&instance_id)
    }

    pub fn is_registered(&self, instance_id: InstanceId) -> bool {
        self.read().contains_key(&instance_id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Delivers `msg` to its instance. Returns `false` when no live instance
    /// takes it. Instances found closed are forgotten.
    pub fn dispatch(&self, msg: HareMessage) -> bool {
        let instance_id = msg.instance_id();
        let process = match self.read().get(&instance_id) {
            Some(process) => Arc::clone(process),
            None => {
                trace!("[BROKER] no instance {} for {:?}", instance_id, msg);
                return false;
            }
        };

        if process.deliver(msg) {
            return true;
        }

        self.remove_if_current(instance_id, Arc::as_ptr(&process));
        false
    }

    // A later registration under the same id must survive the old process stopping.
    fn remove_if_current(&self, instance_id: InstanceId, process: *const ConsensusProcess) {
        let mut instances = self.write();
        let current = instances
            .get(&instance_id)
            .map_or(false, |current| std::ptr::eq(Arc::as_ptr(current), process));
        if current {
            debug!("[BROKER] removing stopped instance {}", instance_id);
            instances.remove(&instance_id);
        }
    }

    fn ingress_loop(self: Arc<Self>, inbound: Receiver<Vec<u8>>, stop: Receiver<()>) {
        loop {
            select! {
                recv(stop) -> _ => break,
                recv(inbound) -> payload => {
                    let payload = match payload {
                        Ok(payload) => payload,
                        Err(_) => break,
                    };
                    match HareMessage::from_bytes(&payload) {
                        Ok(msg) => {
                            self.dispatch(msg);
                        }
                        Err(err) => warn!("[BROKER] dropping undecodable payload: {}", err),
                    }
                }
            }
        }
        debug!("[BROKER] ingress stopped");
    }

    fn read(&self) -> RwLockReadGuard<'_, Instances> {
        self.instances.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Instances> {
        self.instances.write().unwrap_or_else(PoisonError::into_inner)
    }
}
