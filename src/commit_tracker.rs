use std::collections::BTreeMap;

use log::{debug, warn};

use crate::message::{AggregatedMessages, HareMessage};
use crate::set::SetId;
use crate::signing::PubKey;

/// Collects commits to the proposal accepted in the current iteration.
#[derive(Debug)]
pub struct CommitTracker {
    commits: BTreeMap<PubKey, HareMessage>,
    proposed: SetId,
    threshold: usize,
}

impl CommitTracker {
    pub fn new(threshold: usize, proposed: SetId) -> Self {
        Self {
            commits: BTreeMap::new(),
            proposed,
            threshold,
        }
    }

    pub fn proposed(&self) -> &SetId {
        &self.proposed
    }

    pub fn on_commit(&mut self, msg: HareMessage) {
        if self.has_enough_commits() {
            return;
        }

        let sender = match msg.sender() {
            Ok(sender) => sender,
            Err(err) => {
                warn!("Could not construct public key: {}", err);
                return;
            }
        };

        let committed = msg.values().id();
        if committed != self.proposed {
            debug!(
                "Commit of {:?} from {:?} does not match proposal {:?}",
                committed, sender, self.proposed
            );
            return;
        }

        if self.commits.contains_key(&sender) {
            warn!("Duplicated commit message detected {}", sender);
            return;
        }

        self.commits.insert(sender, msg);
    }

    /// Like status readiness, reached at exactly `threshold` distinct senders.
    pub fn has_enough_commits(&self) -> bool {
        self.commits.len() == self.threshold
    }

    pub fn build_certificate(&self) -> Option<AggregatedMessages> {
        if !self.has_enough_commits() {
            return None;
        }

        Some(AggregatedMessages {
            messages: self.commits.values().cloned().collect(),
            agg_sig: None,
        })
    }
}
