use blsttc::{PublicKey, SecretKey, Signature, PK_SIZE, SIG_SIZE};

use super::{PubKey, Signing};

/// BLS12-381 signatures through blsttc.
pub struct BlsSigning {
    secret_key: SecretKey,
    public_key: PubKey,
}

impl BlsSigning {
    pub fn new(secret_key: SecretKey) -> Self {
        let public_key = PubKey(secret_key.public_key().to_bytes().to_vec());
        Self {
            secret_key,
            public_key,
        }
    }

    pub fn random() -> Self {
        Self::new(SecretKey::random())
    }
}

impl Signing for BlsSigning {
    fn public_key(&self) -> PubKey {
        self.public_key.clone()
    }

    fn sign(&self, msg: &[u8]) -> Vec<u8> {
        self.secret_key.sign(msg).to_bytes().to_vec()
    }

    fn verify(&self, pub_key: &PubKey, msg: &[u8], sig: &[u8]) -> bool {
        let pk_bytes: [u8; PK_SIZE] = match pub_key.as_bytes().try_into() {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let sig_bytes: [u8; SIG_SIZE] = match sig.try_into() {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        match (
            PublicKey::from_bytes(pk_bytes),
            Signature::from_bytes(sig_bytes),
        ) {
            (Ok(pk), Ok(sig)) => pk.verify(&sig, msg),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signing = BlsSigning::random();
        let sig = signing.sign(b"status");
        assert!(signing.verify(&signing.public_key(), b"status", &sig));
        assert!(!signing.verify(&signing.public_key(), b"commit", &sig));
    }

    #[test]
    fn test_verify_against_other_key_fails() {
        let a = BlsSigning::random();
        let b = BlsSigning::random();
        let sig = a.sign(b"status");
        assert!(!b.verify(&b.public_key(), b"status", &sig));
        assert!(b.verify(&a.public_key(), b"status", &sig));
    }

    #[test]
    fn test_malformed_inputs_do_not_verify() {
        let signing = BlsSigning::random();
        let sig = signing.sign(b"status");
        let short_key = PubKey::from_bytes(&[1, 2, 3]).unwrap();
        assert!(!signing.verify(&short_key, b"status", &sig));
        assert!(!signing.verify(&signing.public_key(), b"status", &sig[1..]));
    }
}
