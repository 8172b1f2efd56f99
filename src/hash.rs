use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const HASH32_SIZE: usize = 32;

#[derive(Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Hash32([u8; HASH32_SIZE]);

#[derive(Error, Debug, Eq, PartialEq)]
#[error("invalid length: expected: {}, got: {}", .expected, .found)]
pub struct InvalidLength {
    expected: usize,
    found: usize,
}

impl Hash32 {
    /// Sha3-256 over the concatenation of `chunks`.
    pub fn calculate<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> Self {
        use tiny_keccak::{Hasher, Sha3};

        let mut sha3 = Sha3::v256();
        for chunk in chunks {
            sha3.update(chunk);
        }
        let mut hash = [0; HASH32_SIZE];
        sha3.finalize(&mut hash);
        Hash32(hash)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, InvalidLength> {
        let bytes: &[u8; HASH32_SIZE] = data.try_into().map_err(|_| InvalidLength {
            expected: HASH32_SIZE,
            found: data.len(),
        })?;
        Ok(Self(*bytes))
    }

    /// First 5 hex characters, enough to tell ids apart in logs.
    pub fn short(&self) -> String {
        let mut s = hex::encode(&self.0[..3]);
        s.truncate(5);
        s
    }
}

impl From<[u8; HASH32_SIZE]> for Hash32 {
    fn from(val: [u8; HASH32_SIZE]) -> Self {
        Self(val)
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}
