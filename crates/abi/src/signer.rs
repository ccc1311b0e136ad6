use nacl::sign::{Keypair, generate_keypair, signature};

pub use nacl::sign::{PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};

use crate::error::{AbiError, AbiResult};

/// Length of a detached Ed25519 signature, in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Ed25519 key pair used to sign external call bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPair {
    /// Secret key of this pair.
    pub secret_key: [u8; SECRET_KEY_LENGTH],

    /// Public key of this pair.
    pub public_key: [u8; PUBLIC_KEY_LENGTH],
}

impl From<Keypair> for KeyPair {
    fn from(Keypair { skey, pkey }: Keypair) -> Self {
        Self {
            secret_key: skey,
            public_key: pkey,
        }
    }
}

impl KeyPair {
    #[inline]
    pub const fn new(
        secret_key: [u8; SECRET_KEY_LENGTH],
        public_key: [u8; PUBLIC_KEY_LENGTH],
    ) -> Self {
        Self {
            secret_key,
            public_key,
        }
    }

    /// Derive the pair from a 32-byte seed.
    #[inline]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        generate_keypair(seed).into()
    }

    /// Detached signature of `msg`.
    pub fn sign(&self, msg: impl AsRef<[u8]>) -> AbiResult<[u8; SIGNATURE_LENGTH]> {
        signature(msg.as_ref(), self.secret_key.as_slice())
            .map_err(|err| AbiError::SignatureError(err.message))?
            .try_into()
            .map_err(|sig: Vec<_>| {
                AbiError::SignatureError(format!(
                    "got signature of a wrong size, expected {SIGNATURE_LENGTH}, got: {}",
                    sig.len()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_signatures() {
        let keypair = KeyPair::from_seed(&[7; 32]);
        let a = keypair.sign(b"message").unwrap();
        let b = keypair.sign(b"message").unwrap();
        assert_eq!(a, b);
        assert_ne!(keypair.sign(b"other").unwrap(), a);
    }

    #[test]
    fn seed_derives_public_key() {
        let keypair = KeyPair::from_seed(&[7; 32]);
        assert_ne!(keypair.public_key, [0; PUBLIC_KEY_LENGTH]);
        assert_eq!(
            keypair.secret_key[SECRET_KEY_LENGTH - PUBLIC_KEY_LENGTH..],
            keypair.public_key
        );
    }
}
