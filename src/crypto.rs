//! Signing capabilities - HMAC-SHA256 and RSA-PKCS1v15-SHA256.
//!
//! A [`Signer`] produces an opaque signature over a byte slice; a
//! [`Verifier`] confirms one. Verification failure is always reported as
//! [`WireError::InvalidSignature`] regardless of cause, and the HMAC
//! comparison is constant-time.
//!
//! # Example
//!
//! ```
//! use tagwire::{HmacSigner, HmacVerifier, Signer, Verifier};
//!
//! let signer = HmacSigner::new(b"shared-secret");
//! let verifier = HmacVerifier::new(b"shared-secret");
//!
//! let sig = signer.sign(b"message").unwrap();
//! assert!(verifier.verify(b"message", &sig).is_ok());
//! assert!(verifier.verify(b"tampered", &sig).is_err());
//! ```

use hmac::{Hmac, Mac};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{Result, WireError};

type HmacSha256 = Hmac<Sha256>;

/// Produces an opaque signature over a byte slice.
pub trait Signer: Send + Sync {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Confirms a signature over a byte slice.
pub trait Verifier: Send + Sync {
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()>;
}

/// HMAC-SHA256 signer. Produces a 32-byte tag.
pub struct HmacSigner {
    secret: Vec<u8>,
}

impl HmacSigner {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            secret: secret.to_vec(),
        }
    }
}

impl Signer for HmacSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| WireError::Crypto(e.to_string()))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// HMAC-SHA256 verifier. Comparison is constant-time.
pub struct HmacVerifier {
    secret: Vec<u8>,
}

impl HmacVerifier {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            secret: secret.to_vec(),
        }
    }
}

impl Verifier for HmacVerifier {
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| WireError::Crypto(e.to_string()))?;
        mac.update(data);
        mac.verify_slice(signature)
            .map_err(|_| WireError::InvalidSignature)
    }
}

/// RSA signer: PKCS#1 v1.5 over the SHA-256 digest of the input.
pub struct RsaSigner {
    private_key: RsaPrivateKey,
}

impl RsaSigner {
    pub fn new(private_key: RsaPrivateKey) -> Self {
        Self { private_key }
    }
}

impl Signer for RsaSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let digest = Sha256::digest(data);
        self.private_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| WireError::Crypto(e.to_string()))
    }
}

/// RSA verifier: PKCS#1 v1.5 over the SHA-256 digest of the input.
pub struct RsaVerifier {
    public_key: RsaPublicKey,
}

impl RsaVerifier {
    pub fn new(public_key: RsaPublicKey) -> Self {
        Self { public_key }
    }
}

impl Verifier for RsaVerifier {
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        let digest = Sha256::digest(data);
        self.public_key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
            .map_err(|_| WireError::InvalidSignature)
    }
}

/// Generate a new RSA key pair. Helper only, not part of the hot path.
pub fn generate_rsa_key_pair(bits: usize) -> Result<(RsaPrivateKey, RsaPublicKey)> {
    let mut rng = rand::thread_rng();
    let private_key =
        RsaPrivateKey::new(&mut rng, bits).map_err(|e| WireError::Crypto(e.to_string()))?;
    let public_key = RsaPublicKey::from(&private_key);
    Ok((private_key, public_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_sign_verify_roundtrip() {
        let signer = HmacSigner::new(b"secret");
        let verifier = HmacVerifier::new(b"secret");

        let sig = signer.sign(b"payload data").unwrap();
        assert_eq!(sig.len(), 32);
        verifier.verify(b"payload data", &sig).unwrap();
    }

    #[test]
    fn test_hmac_wrong_secret_fails() {
        let signer = HmacSigner::new(b"secret-1");
        let verifier = HmacVerifier::new(b"secret-2");

        let sig = signer.sign(b"payload").unwrap();
        let result = verifier.verify(b"payload", &sig);
        assert!(matches!(result, Err(WireError::InvalidSignature)));
    }

    #[test]
    fn test_hmac_tampered_data_fails() {
        let signer = HmacSigner::new(b"secret");
        let verifier = HmacVerifier::new(b"secret");

        let sig = signer.sign(b"original").unwrap();
        let result = verifier.verify(b"tampered", &sig);
        assert!(matches!(result, Err(WireError::InvalidSignature)));
    }

    #[test]
    fn test_hmac_is_deterministic() {
        let signer = HmacSigner::new(b"secret");
        assert_eq!(
            signer.sign(b"data").unwrap(),
            signer.sign(b"data").unwrap()
        );
    }

    #[test]
    fn test_rsa_sign_verify_roundtrip() {
        let (private_key, public_key) = generate_rsa_key_pair(2048).unwrap();
        let signer = RsaSigner::new(private_key);
        let verifier = RsaVerifier::new(public_key);

        let sig = signer.sign(b"signed payload").unwrap();
        verifier.verify(b"signed payload", &sig).unwrap();

        let result = verifier.verify(b"other payload", &sig);
        assert!(matches!(result, Err(WireError::InvalidSignature)));
    }

    #[test]
    fn test_rsa_wrong_key_fails() {
        let (private_key, _) = generate_rsa_key_pair(2048).unwrap();
        let (_, other_public) = generate_rsa_key_pair(2048).unwrap();

        let signer = RsaSigner::new(private_key);
        let verifier = RsaVerifier::new(other_public);

        let sig = signer.sign(b"payload").unwrap();
        let result = verifier.verify(b"payload", &sig);
        assert!(matches!(result, Err(WireError::InvalidSignature)));
    }
}
