use core::fmt::{self, Debug};

use serde::{Deserialize, Serialize};

use crate::set::{Set, Value};
use crate::signing::{PubKey, Signing};
use crate::{Error, Result};

/// Name under which Hare messages travel on the network.
pub const PROTOCOL_NAME: &str = "hare";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MessageType {
    PreRound,
    Status,
    Proposal,
    Commit,
    Notify,
}

impl MessageType {
    /// The message type owning round `k`. The pre-round has no `k` of its own.
    pub fn for_round(k: u32) -> Self {
        match k % 4 {
            0 => MessageType::Status,
            1 => MessageType::Proposal,
            2 => MessageType::Commit,
            _ => MessageType::Notify,
        }
    }
}

/// The signed part of a [`HareMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerMessage {
    pub msg_type: MessageType,
    pub instance_id: InstanceId,
    pub k: u32,
    pub values: Vec<Value>,
}

impl InnerMessage {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}

/// A bundle of messages justifying another message: the SVP of a proposal,
/// or the commit certificate of a notify.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregatedMessages {
    pub messages: Vec<HareMessage>,
    /// Reserved for an aggregate signature over `messages`. Until one exists
    /// every bundled message keeps its own signature and this stays `None`.
    pub agg_sig: Option<Vec<u8>>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HareMessage {
    pub pub_key: Vec<u8>,
    pub inner: InnerMessage,
    pub inner_sig: Vec<u8>,
    pub svp: Option<AggregatedMessages>,
    pub cert: Option<AggregatedMessages>,
}

impl Debug for HareMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}@I{}-K{}-{:?}",
            self.inner.msg_type,
            self.inner.instance_id,
            self.inner.k,
            self.values()
        )?;
        match PubKey::from_bytes(&self.pub_key) {
            Ok(pk) => write!(f, "@{}", pk.short()),
            Err(_) => write!(f, "@?"),
        }
    }
}

impl HareMessage {
    pub fn msg_type(&self) -> MessageType {
        self.inner.msg_type
    }

    pub fn instance_id(&self) -> InstanceId {
        self.inner.instance_id
    }

    pub fn k(&self) -> u32 {
        self.inner.k
    }

    pub fn values(&self) -> Set {
        self.inner.values.iter().copied().collect()
    }

    pub fn sender(&self) -> Result<PubKey> {
        PubKey::from_bytes(&self.pub_key)
    }

    pub fn validate_signature(&self, signing: &dyn Signing) -> Result<()> {
        let sender = self.sender()?;
        if signing.verify(&sender, &self.inner.to_bytes()?, &self.inner_sig) {
            Ok(())
        } else {
            Err(Error::InvalidSignature)
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Fluent construction of a [`HareMessage`]. The message is immutable once built.
pub struct MessageBuilder {
    msg: HareMessage,
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self {
            msg: HareMessage {
                pub_key: vec![],
                inner: InnerMessage {
                    msg_type: MessageType::PreRound,
                    instance_id: InstanceId(0),
                    k: 0,
                    values: vec![],
                },
                inner_sig: vec![],
                svp: None,
                cert: None,
            },
        }
    }

    pub fn set_type(mut self, msg_type: MessageType) -> Self {
        self.msg.inner.msg_type = msg_type;
        self
    }

    pub fn set_instance_id(mut self, instance_id: InstanceId) -> Self {
        self.msg.inner.instance_id = instance_id;
        self
    }

    pub fn set_round(mut self, k: u32) -> Self {
        self.msg.inner.k = k;
        self
    }

    pub fn set_pub_key(mut self, pub_key: &PubKey) -> Self {
        self.msg.pub_key = pub_key.as_bytes().to_vec();
        self
    }

    pub fn set_values(mut self, set: &Set) -> Self {
        self.msg.inner.values = set.values();
        self
    }

    pub fn set_svp(mut self, svp: AggregatedMessages) -> Self {
        self.msg.svp = Some(svp);
        self
    }

    pub fn set_certificate(mut self, cert: AggregatedMessages) -> Self {
        self.msg.cert = Some(cert);
        self
    }

    /// Signs the inner message. Anything set on the inner message afterwards
    /// invalidates the signature.
    pub fn sign(mut self, signing: &dyn Signing) -> Result<Self> {
        self.msg.inner_sig = signing.sign(&self.msg.inner.to_bytes()?);
        Ok(self)
    }

    pub fn build(self) -> HareMessage {
        self.msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::BlsSigning;

    fn value(b: u8) -> Value {
        Value::new([b; 32])
    }

    #[test]
    fn test_round_types() {
        assert_eq!(MessageType::for_round(0), MessageType::Status);
        assert_eq!(MessageType::for_round(1), MessageType::Proposal);
        assert_eq!(MessageType::for_round(2), MessageType::Commit);
        assert_eq!(MessageType::for_round(3), MessageType::Notify);
        assert_eq!(MessageType::for_round(4), MessageType::Status);
        assert_eq!(MessageType::for_round(u32::MAX), MessageType::Notify);
    }

    #[test]
    fn test_built_message_carries_fields() -> Result<()> {
        let signing = BlsSigning::random();
        let set = Set::from_iter([value(2), value(1)]);
        let msg = MessageBuilder::new()
            .set_type(MessageType::Commit)
            .set_instance_id(InstanceId(7))
            .set_round(6)
            .set_pub_key(&signing.public_key())
            .set_values(&set)
            .sign(&signing)?
            .build();

        assert_eq!(msg.msg_type(), MessageType::Commit);
        assert_eq!(msg.instance_id(), InstanceId(7));
        assert_eq!(msg.k(), 6);
        assert!(msg.values().equals(&set));
        assert_eq!(msg.sender()?, signing.public_key());
        msg.validate_signature(&signing)?;
        Ok(())
    }

    #[test]
    fn test_tampered_message_fails_validation() -> Result<()> {
        let signing = BlsSigning::random();
        let mut msg = MessageBuilder::new()
            .set_type(MessageType::Status)
            .set_pub_key(&signing.public_key())
            .set_values(&Set::from_iter([value(1)]))
            .sign(&signing)?
            .build();

        msg.inner.values.push(value(9));
        assert!(matches!(
            msg.validate_signature(&signing),
            Err(Error::InvalidSignature)
        ));
        Ok(())
    }

    #[test]
    fn test_message_signed_before_fields_are_set_is_invalid() -> Result<()> {
        let signing = BlsSigning::random();
        let msg = MessageBuilder::new()
            .set_pub_key(&signing.public_key())
            .sign(&signing)?
            .set_round(3)
            .build();
        assert!(msg.validate_signature(&signing).is_err());
        Ok(())
    }

    #[test]
    fn test_unsigned_message_without_key_is_invalid() {
        let signing = BlsSigning::random();
        let msg = MessageBuilder::new().build();
        assert!(matches!(
            msg.validate_signature(&signing),
            Err(Error::InvalidPublicKey { .. })
        ));
    }
}
