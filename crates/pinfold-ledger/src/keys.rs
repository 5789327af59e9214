use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use pinfold_core::error::PinfoldError;

/// The agent's single signing key. Transactions are signed with ed25519 over
/// the canonical JSON bytes of the contract call.
pub struct AgentKeypair {
    signing: SigningKey,
    address: String,
}

fn address_of(key: &VerifyingKey) -> String {
    bs58::encode(key.as_bytes()).into_string()
}

impl AgentKeypair {
    /// Parse a 32-byte hex-encoded secret seed.
    pub fn from_secret(secret_hex: &str) -> Result<Self, PinfoldError> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| PinfoldError::InvalidSecret(e.to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| PinfoldError::InvalidSecret("expected 32 bytes".to_string()))?;
        let signing = SigningKey::from_bytes(&seed);
        let address = address_of(&signing.verifying_key());
        Ok(Self { signing, address })
    }

    /// Generate a fresh random keypair (CLI key generation and tests).
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        let address = address_of(&signing.verifying_key());
        Self { signing, address }
    }

    /// Hex encoding of the secret seed, for operator backup.
    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing.to_bytes())
    }

    /// Base58 ledger address derived from the verifying key.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sign a message; returns the hex-encoded signature.
    pub fn sign(&self, message: &[u8]) -> String {
        hex::encode(self.signing.sign(message).to_bytes())
    }
}
