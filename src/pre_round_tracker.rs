use std::collections::{HashMap, HashSet};

use log::warn;

use crate::message::HareMessage;
use crate::set::{Set, Value};
use crate::signing::PubKey;

/// Counts, per value, the distinct peers that announced it in the pre-round.
#[derive(Debug, Default)]
pub struct PreRoundTracker {
    senders: HashSet<PubKey>,
    support: HashMap<Value, usize>,
    threshold: usize,
}

impl PreRoundTracker {
    pub fn new(threshold: usize, expected_size: usize) -> Self {
        Self {
            senders: HashSet::with_capacity(expected_size),
            support: HashMap::with_capacity(expected_size),
            threshold,
        }
    }

    pub fn on_pre_round(&mut self, msg: &HareMessage) {
        let sender = match msg.sender() {
            Ok(sender) => sender,
            Err(err) => {
                warn!("Could not construct public key: {}", err);
                return;
            }
        };

        if !self.senders.insert(sender) {
            warn!("Duplicated pre-round message detected {:?}", msg);
            return;
        }

        for value in msg.values().iter() {
            *self.support.entry(*value).or_default() += 1;
        }
    }

    pub fn can_prove_value(&self, value: &Value) -> bool {
        self.support.get(value).copied().unwrap_or_default() >= self.threshold
    }

    /// The members of `set` announced by at least `threshold` peers.
    pub fn filter_set(&self, set: &Set) -> Set {
        set.iter()
            .filter(|v| self.can_prove_value(v))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{InstanceId, MessageBuilder, MessageType};
    use crate::signing::{mock::MockSigning, Signing};

    fn value(b: u8) -> Value {
        Value::new([b; 32])
    }

    fn pre_round(signing: &dyn Signing, values: &[Value]) -> HareMessage {
        MessageBuilder::new()
            .set_type(MessageType::PreRound)
            .set_instance_id(InstanceId(1))
            .set_pub_key(&signing.public_key())
            .set_values(&values.iter().copied().collect())
            .build()
    }

    #[test]
    fn test_filter_keeps_values_with_enough_support() {
        let mut tracker = PreRoundTracker::new(2, 4);
        tracker.on_pre_round(&pre_round(&MockSigning::new(), &[value(1), value(2)]));
        tracker.on_pre_round(&pre_round(&MockSigning::new(), &[value(1), value(3)]));

        let ours = Set::from_iter([value(1), value(2), value(4)]);
        assert_eq!(tracker.filter_set(&ours), Set::from_iter([value(1)]));
    }

    #[test]
    fn test_repeated_sender_does_not_add_support() {
        let signing = MockSigning::new();
        let mut tracker = PreRoundTracker::new(2, 4);
        tracker.on_pre_round(&pre_round(&signing, &[value(1)]));
        tracker.on_pre_round(&pre_round(&signing, &[value(1)]));

        assert!(!tracker.can_prove_value(&value(1)));
    }
}
