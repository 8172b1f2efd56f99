use super::{PubKey, Signing};

/// Accepts every signature. Only for tests and simulations.
pub struct MockSigning {
    public_key: PubKey,
}

impl MockSigning {
    pub fn new() -> Self {
        Self {
            public_key: PubKey(rand::random::<[u8; 32]>().to_vec()),
        }
    }
}

impl Default for MockSigning {
    fn default() -> Self {
        Self::new()
    }
}

impl Signing for MockSigning {
    fn public_key(&self) -> PubKey {
        self.public_key.clone()
    }

    fn sign(&self, _msg: &[u8]) -> Vec<u8> {
        vec![]
    }

    fn verify(&self, _pub_key: &PubKey, _msg: &[u8], _sig: &[u8]) -> bool {
        true
    }
}
