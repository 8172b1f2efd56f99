use crate::message::InstanceId;
use crate::signing::PubKey;

/// Role oracle: decides whether a participant may broadcast in a given round.
///
/// Consulted before sending Proposal, Commit and Notify messages. Status and
/// pre-round messages are sent by everyone.
pub trait Rolacle: Send + Sync {
    fn eligible(&self, instance_id: InstanceId, k: u32, pub_key: &PubKey) -> bool;
}

/// Every participant is eligible in every round.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllEligible;

impl Rolacle for AllEligible {
    fn eligible(&self, _instance_id: InstanceId, _k: u32, _pub_key: &PubKey) -> bool {
        true
    }
}
