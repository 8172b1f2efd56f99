//! Signing and verification of Hare messages.
//!
//! The consensus core never manages keys itself, it only asks a [`Signing`]
//! implementation to sign its own messages and to verify those of its peers.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub mod bls;
#[cfg(feature = "ed25519")]
pub mod ed25519;
#[cfg(any(test, feature = "bad_crypto"))]
pub mod mock;

pub use self::bls::BlsSigning;

/// Opaque public key bytes of a participant, as carried on the wire.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PubKey(Vec<u8>);

impl PubKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidPublicKey { len: 0 });
        }
        Ok(Self(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// First 5 hex characters of the key.
    pub fn short(&self) -> String {
        let mut s = hex::encode(&self.0[..self.0.len().min(3)]);
        s.truncate(5);
        s
    }
}

impl fmt::Display for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PK({})", self.short())
    }
}

pub trait Signing: Send + Sync {
    /// The key other participants verify our signatures against.
    fn public_key(&self) -> PubKey;

    fn sign(&self, msg: &[u8]) -> Vec<u8>;

    /// A malformed key or signature never verifies.
    fn verify(&self, pub_key: &PubKey, msg: &[u8], sig: &[u8]) -> bool;
}
