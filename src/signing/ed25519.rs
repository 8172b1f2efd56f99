use ed25519::{Keypair, PublicKey, Signature};
use signature::{Signer, Verifier};

use super::{PubKey, Signing};

pub struct Ed25519Signing {
    keypair: Keypair,
    public_key: PubKey,
}

impl Ed25519Signing {
    pub fn new(keypair: Keypair) -> Self {
        let public_key = PubKey(keypair.public.to_bytes().to_vec());
        Self {
            keypair,
            public_key,
        }
    }

    pub fn random() -> Self {
        Self::new(Keypair::generate(&mut rand::rngs::OsRng))
    }
}

impl Signing for Ed25519Signing {
    fn public_key(&self) -> PubKey {
        self.public_key.clone()
    }

    fn sign(&self, msg: &[u8]) -> Vec<u8> {
        self.keypair.sign(msg).to_bytes().to_vec()
    }

    fn verify(&self, pub_key: &PubKey, msg: &[u8], sig: &[u8]) -> bool {
        let pk = match PublicKey::from_bytes(pub_key.as_bytes()) {
            Ok(pk) => pk,
            Err(_) => return false,
        };
        match Signature::try_from(sig) {
            Ok(sig) => pk.verify(msg, &sig).is_ok(),
            Err(_) => false,
        }
    }
}
