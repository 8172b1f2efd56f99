use std::collections::HashMap;

use log::warn;

use crate::message::{AggregatedMessages, HareMessage};
use crate::set::Set;
use crate::signing::PubKey;

/// Collects the status messages of one status round.
///
/// Created fresh for every status round and discarded once the round ends.
#[derive(Debug)]
pub struct StatusTracker {
    statuses: HashMap<PubKey, HareMessage>,
    threshold: usize,
}

impl StatusTracker {
    pub fn new(threshold: usize, expected_size: usize) -> Self {
        Self {
            statuses: HashMap::with_capacity(expected_size),
            threshold,
        }
    }

    /// Records the first status message of each sender. Once the tracker is
    /// SVP ready every further message is ignored.
    pub fn record_status(&mut self, msg: HareMessage) {
        if self.is_svp_ready() {
            return;
        }

        let sender = match msg.sender() {
            Ok(sender) => sender,
            Err(err) => {
                warn!("Could not construct public key: {}", err);
                return;
            }
        };

        if self.statuses.contains_key(&sender) {
            warn!("Duplicated status message detected {}", sender);
            return;
        }

        self.statuses.insert(sender, msg);
    }

    /// Readiness is reached at exactly `threshold` distinct senders.
    pub fn is_svp_ready(&self) -> bool {
        self.statuses.len() == self.threshold
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Union of the value sets of every recorded status message.
    pub fn build_union_set(&self, expected_size: usize) -> Set {
        let mut union_set = Set::new_empty(expected_size);
        for msg in self.statuses.values() {
            union_set.extend(msg.inner.values.iter().copied());
        }
        union_set
    }

    /// The recorded statuses, ordered by sender, as proof for a proposal.
    pub fn build_svp(&self) -> Option<AggregatedMessages> {
        if !self.is_svp_ready() {
            return None;
        }

        let mut statuses: Vec<_> = self.statuses.iter().collect();
        statuses.sort_by(|(a, _), (b, _)| a.cmp(b));

        // TODO: combine the status signatures into `agg_sig` once the signing
        // backend offers an aggregation scheme.
        Some(AggregatedMessages {
            messages: statuses.into_iter().map(|(_, m)| m.clone()).collect(),
            agg_sig: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{InstanceId, MessageBuilder, MessageType};
    use crate::set::Value;
    use crate::signing::{mock::MockSigning, BlsSigning, Signing};
    use quickcheck_macros::quickcheck;

    fn value(b: u8) -> Value {
        Value::new([b; 32])
    }

    fn status(signing: &dyn Signing, values: &[Value]) -> HareMessage {
        MessageBuilder::new()
            .set_type(MessageType::Status)
            .set_instance_id(InstanceId(1))
            .set_pub_key(&signing.public_key())
            .set_values(&values.iter().copied().collect())
            .sign(signing)
            .unwrap()
            .build()
    }

    #[test]
    fn test_union_of_four_statuses() {
        let (a, b, c) = (value(0xa), value(0xb), value(0xc));
        let mut tracker = StatusTracker::new(4, 3);

        for values in [vec![a], vec![a, b], vec![b, c], vec![c]] {
            tracker.record_status(status(&BlsSigning::random(), &values));
        }

        assert!(tracker.is_svp_ready());
        assert!(tracker
            .build_union_set(3)
            .equals(&Set::from_iter([a, b, c])));
    }

    #[test]
    fn test_duplicate_sender_is_ignored() {
        let signing = BlsSigning::random();
        let mut tracker = StatusTracker::new(2, 2);

        tracker.record_status(status(&signing, &[value(1)]));
        tracker.record_status(status(&signing, &[value(2)]));

        assert_eq!(tracker.len(), 1);
        assert!(!tracker.is_svp_ready());
        assert!(tracker
            .build_union_set(2)
            .equals(&Set::from_iter([value(1)])));
    }

    #[test]
    fn test_malformed_sender_is_ignored() {
        let mut tracker = StatusTracker::new(1, 1);
        let mut msg = status(&BlsSigning::random(), &[value(1)]);
        msg.pub_key.clear();

        tracker.record_status(msg);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_ready_is_exact_and_sticky() {
        let mut tracker = StatusTracker::new(2, 2);
        tracker.record_status(status(&BlsSigning::random(), &[value(1)]));
        assert!(!tracker.is_svp_ready());
        assert!(tracker.build_svp().is_none());

        tracker.record_status(status(&BlsSigning::random(), &[value(2)]));
        assert!(tracker.is_svp_ready());

        // statuses past the threshold are not counted
        tracker.record_status(status(&BlsSigning::random(), &[value(3)]));
        assert!(tracker.is_svp_ready());
        assert_eq!(tracker.len(), 2);
        assert!(!tracker.build_union_set(2).contains(&value(3)));
    }

    #[test]
    fn test_svp_holds_every_status() {
        let mut tracker = StatusTracker::new(3, 3);
        for b in 0..3 {
            tracker.record_status(status(&BlsSigning::random(), &[value(b)]));
        }

        let svp = tracker.build_svp().expect("tracker is ready");
        assert_eq!(svp.messages.len(), 3);
        assert!(svp.agg_sig.is_none());

        let senders: Vec<_> = svp.messages.iter().map(|m| m.pub_key.clone()).collect();
        let mut sorted = senders.clone();
        sorted.sort();
        assert_eq!(senders, sorted);
    }

    #[quickcheck]
    fn prop_union_set_is_order_independent(sets: Vec<Vec<u8>>, rotation: usize) -> bool {
        let keys: Vec<_> = sets.iter().map(|_| MockSigning::new()).collect();
        let msgs: Vec<_> = sets
            .iter()
            .zip(&keys)
            .map(|(bytes, signing)| {
                let values: Vec<_> = bytes.iter().map(|b| value(b % 16)).collect();
                status(signing, &values)
            })
            .collect();

        let mut rotated = msgs.clone();
        if !rotated.is_empty() {
            let mid = rotation % rotated.len();
            rotated.rotate_left(mid);
        }
        rotated.reverse();

        let mut forward = StatusTracker::new(msgs.len(), msgs.len());
        msgs.into_iter().for_each(|m| forward.record_status(m));
        let mut shuffled = StatusTracker::new(rotated.len(), rotated.len());
        rotated.into_iter().for_each(|m| shuffled.record_status(m));

        forward.build_union_set(0).equals(&shuffled.build_union_set(0))
    }
}
