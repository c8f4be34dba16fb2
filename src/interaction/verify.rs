//! Webhook signature verification
//!
//! The platform signs `timestamp ++ body` with Ed25519 and sends the detached
//! signature and timestamp as headers. Verification is a pure check: any
//! decode or mismatch rejects the request before it is parsed.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::types::{Result, TellerError};

/// Verifies inbound webhook signatures against the platform public key.
///
/// Built once at startup from the hex key in [`crate::secrets::Secrets`].
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    /// Build from a hex-encoded 32-byte Ed25519 public key.
    pub fn from_hex(public_key_hex: &str) -> Result<Self> {
        let bytes = hex::decode(public_key_hex)
            .map_err(|e| TellerError::Config(format!("public key is not valid hex: {e}")))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TellerError::Config("public key must be 32 bytes".to_string()))?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| TellerError::Config(format!("invalid public key: {e}")))?;
        Ok(Self { key })
    }

    /// Check the detached signature over the exact concatenation of the
    /// timestamp header and raw body bytes.
    pub fn verify(&self, timestamp: &str, body: &[u8], signature_hex: &str) -> Result<()> {
        let sig_bytes = hex::decode(signature_hex)
            .map_err(|_| TellerError::Authentication("signature is not valid hex".to_string()))?;
        let signature = Signature::from_slice(&sig_bytes)
            .map_err(|_| TellerError::Authentication("malformed signature".to_string()))?;

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        self.key
            .verify(&message, &signature)
            .map_err(|_| TellerError::Authentication("invalid request signature".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn keypair() -> (SigningKey, SignatureVerifier) {
        let signing = SigningKey::from_bytes(&[7u8; 32]);
        let verifier =
            SignatureVerifier::from_hex(&hex::encode(signing.verifying_key().as_bytes())).unwrap();
        (signing, verifier)
    }

    fn sign(signing: &SigningKey, timestamp: &str, body: &[u8]) -> String {
        let mut message = timestamp.as_bytes().to_vec();
        message.extend_from_slice(body);
        hex::encode(signing.sign(&message).to_bytes())
    }

    #[test]
    fn accepts_valid_signature() {
        let (signing, verifier) = keypair();
        let body = br#"{"type":1}"#;
        let sig = sign(&signing, "1700000000", body);
        assert!(verifier.verify("1700000000", body, &sig).is_ok());
    }

    #[test]
    fn rejects_mutated_body() {
        let (signing, verifier) = keypair();
        let body = br#"{"type":1}"#.to_vec();
        let sig = sign(&signing, "1700000000", &body);

        for i in 0..body.len() {
            let mut mutated = body.clone();
            mutated[i] ^= 0x01;
            assert!(
                verifier.verify("1700000000", &mutated, &sig).is_err(),
                "byte {i} mutation was accepted"
            );
        }
    }

    #[test]
    fn rejects_mutated_timestamp() {
        let (signing, verifier) = keypair();
        let body = br#"{"type":1}"#;
        let sig = sign(&signing, "1700000000", body);
        assert!(verifier.verify("1700000001", body, &sig).is_err());
    }

    #[test]
    fn rejects_garbage_signature() {
        let (_, verifier) = keypair();
        assert!(verifier.verify("ts", b"body", "not-hex").is_err());
        assert!(verifier.verify("ts", b"body", "abcd").is_err());
    }

    #[test]
    fn rejects_wrong_key() {
        let (signing, _) = keypair();
        let other = SigningKey::from_bytes(&[9u8; 32]);
        let verifier =
            SignatureVerifier::from_hex(&hex::encode(other.verifying_key().as_bytes())).unwrap();
        let sig = sign(&signing, "ts", b"body");
        assert!(verifier.verify("ts", b"body", &sig).is_err());
    }
}
