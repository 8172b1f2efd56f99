use std::collections::HashMap;

use log::warn;

use crate::message::HareMessage;
use crate::set::SetId;
use crate::signing::PubKey;

/// Counts notify messages per announced set, one per sender.
#[derive(Debug)]
pub struct NotifyTracker {
    notifies: HashMap<PubKey, SetId>,
    counts: HashMap<SetId, usize>,
    threshold: usize,
}

impl NotifyTracker {
    pub fn new(threshold: usize, expected_size: usize) -> Self {
        Self {
            notifies: HashMap::with_capacity(expected_size),
            counts: HashMap::new(),
            threshold,
        }
    }

    /// Returns true when this message brings its set to `threshold` notifies.
    pub fn on_notify(&mut self, msg: &HareMessage) -> bool {
        let sender = match msg.sender() {
            Ok(sender) => sender,
            Err(err) => {
                warn!("Could not construct public key: {}", err);
                return false;
            }
        };

        if self.notifies.contains_key(&sender) {
            warn!("Duplicated notify message detected {}", sender);
            return false;
        }

        let set_id = msg.values().id();
        self.notifies.insert(sender, set_id);
        let count = self.counts.entry(set_id).or_default();
        *count += 1;
        *count == self.threshold
    }

    pub fn notification_count(&self, set_id: &SetId) -> usize {
        self.counts.get(set_id).copied().unwrap_or_default()
    }

    pub fn is_notified(&self, set_id: &SetId) -> bool {
        self.notification_count(set_id) >= self.threshold
    }
}
