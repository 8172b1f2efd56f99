//! Hare: Byzantine fault tolerant agreement on a set of values.
//!
//! Each consensus instance runs as a [`ConsensusProcess`] that walks through a
//! pre-round followed by iterations of four rounds (status, proposal, commit,
//! notify) until `threshold` participants notify the same certified set. A
//! [`Broker`] routes inbound network traffic to the instance it belongs to.

pub mod broker;
pub mod commit_tracker;
pub mod config;
pub mod consensus;
pub mod error;
pub mod hash;
pub mod message;
pub mod network;
pub mod notify_tracker;
pub mod oracle;
pub mod pre_round_tracker;
pub mod set;
pub mod signing;
pub mod status_tracker;

pub use crate::broker::Broker;
pub use crate::config::{Config, ConfigError};
pub use crate::consensus::{ConsensusProcess, TerminationOutput};
pub use crate::error::{Error, Result};
pub use crate::message::{
    AggregatedMessages, HareMessage, InnerMessage, InstanceId, MessageBuilder, MessageType,
    PROTOCOL_NAME,
};
pub use crate::network::{NetworkService, SimNode, Simulator};
pub use crate::oracle::{AllEligible, Rolacle};
pub use crate::set::{Set, SetId, Value};
pub use crate::signing::{BlsSigning, PubKey, Signing};
