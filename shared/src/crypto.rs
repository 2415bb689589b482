//! ECDSA (secp256k1) key management: generation, public-key import/export,
//! signing, and verification over a 32-byte digest, plus PEM persistence.

use crate::{BlockchainError, Result};
use rand::rngs::OsRng;
use secp256k1::ecdsa::Signature as EcdsaSignature;
use secp256k1::{Message, PublicKey as Secp256k1PublicKey, Secp256k1, SecretKey};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use zeroize::Zeroize;

/// Length in bytes of the uncompressed secp256k1 public key encoding
/// (`0x04 || X || Y`).
pub const EC_PUB_LEN: usize = 65;

/// Maximum length in bytes of a DER-encoded ECDSA signature over
/// secp256k1.
pub const SIG_MAX_LEN: usize = 72;

const PRIVATE_KEY_FILENAME: &str = "key.pem";
const PUBLIC_KEY_FILENAME: &str = "key_pub.pem";
const PRIVATE_PEM_LABEL: &str = "EC PRIVATE KEY";
const PUBLIC_PEM_LABEL: &str = "PUBLIC KEY";

/// An secp256k1 key pair. The private half is zeroized on drop.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKeyBytes,
    public: Secp256k1PublicKey,
}

/// Wraps the raw private scalar so it is zeroized when dropped, mirroring
/// the teacher's `Zeroize`-on-`Drop` pattern for key material.
#[derive(Clone)]
struct SecretKeyBytes([u8; 32]);

impl Drop for SecretKeyBytes {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl KeyPair {
    /// Generates a fresh, validated secp256k1 key pair.
    ///
    /// # Errors
    ///
    /// Returns [`BlockchainError::CryptoFailure`] if the underlying RNG
    /// or curve operations fail.
    pub fn generate() -> Result<Self> {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Ok(Self {
            secret: SecretKeyBytes(secret_key.secret_bytes()),
            public: public_key,
        })
    }

    /// Rebuilds a public-key-only key pair from its uncompressed
    /// encoding. Such a key pair can verify but never sign.
    ///
    /// # Errors
    ///
    /// Returns [`BlockchainError::CryptoFailure`] if `bytes` is not a
    /// valid uncompressed secp256k1 public key.
    pub fn from_public_bytes(bytes: &[u8; EC_PUB_LEN]) -> Result<Self> {
        let public = Secp256k1PublicKey::from_slice(bytes)?;
        Ok(Self {
            secret: SecretKeyBytes([0u8; 32]),
            public,
        })
    }

    fn has_private_key(&self) -> bool {
        self.secret.0 != [0u8; 32]
    }

    /// Exports the public key in uncompressed `0x04 || X || Y` form.
    #[must_use]
    pub fn to_public_bytes(&self) -> [u8; EC_PUB_LEN] {
        self.public.serialize_uncompressed()
    }

    /// Signs a 32-byte digest. The digest is treated as already hashed —
    /// callers pass a transaction ID, which is itself a SHA-256 digest,
    /// and no further hashing happens inside this call.
    ///
    /// # Errors
    ///
    /// Returns [`BlockchainError::InvalidArgument`] if this key pair has
    /// no private key, or [`BlockchainError::CryptoFailure`] if signing
    /// fails.
    pub fn sign(&self, digest: &[u8; 32]) -> Result<Signature> {
        if !self.has_private_key() {
            return Err(BlockchainError::InvalidArgument(
                "key pair has no private key".to_string(),
            ));
        }
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&self.secret.0)?;
        let message = Message::from_digest(*digest);
        let sig = secp.sign_ecdsa(&message, &secret_key);
        Signature::from_der(&sig.serialize_der())
    }

    /// Verifies `signature` against a 32-byte digest using this key
    /// pair's public key.
    ///
    /// # Errors
    ///
    /// Returns [`BlockchainError::CryptoFailure`] if the signature is
    /// malformed; otherwise returns `Ok(false)` for a mismatched
    /// signature.
    pub fn verify(&self, digest: &[u8; 32], signature: &Signature) -> Result<bool> {
        let secp = Secp256k1::new();
        let message = Message::from_digest(*digest);
        let sig = EcdsaSignature::from_der(signature.as_bytes())?;
        Ok(secp.verify_ecdsa(&message, &sig, &self.public).is_ok())
    }

    /// Persists the key pair as PEM files (`key.pem`, `key_pub.pem`)
    /// under `folder`, creating the directory (mode 0755) if needed.
    ///
    /// # Errors
    ///
    /// Returns [`BlockchainError::InvalidArgument`] if this key pair has
    /// no private key, or [`BlockchainError::IoFailure`] if the
    /// directory or files cannot be written.
    pub fn save(&self, folder: &Path) -> Result<()> {
        if !self.has_private_key() {
            return Err(BlockchainError::InvalidArgument(
                "cannot save a public-only key pair".to_string(),
            ));
        }
        fs::create_dir_all(folder)?;
        fs::set_permissions(folder, fs::Permissions::from_mode(0o755))?;

        let priv_pem = encode_pem(PRIVATE_PEM_LABEL, &self.secret.0);
        fs::write(folder.join(PRIVATE_KEY_FILENAME), priv_pem)?;

        let pub_pem = encode_pem(PUBLIC_PEM_LABEL, &self.to_public_bytes());
        fs::write(folder.join(PUBLIC_KEY_FILENAME), pub_pem)?;

        Ok(())
    }

    /// Loads a key pair previously written by [`KeyPair::save`] from
    /// `folder`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockchainError::IoFailure`] if the files are missing,
    /// or [`BlockchainError::FormatError`]/[`BlockchainError::CryptoFailure`]
    /// if their contents are malformed.
    pub fn load(folder: &Path) -> Result<Self> {
        let priv_pem = fs::read_to_string(folder.join(PRIVATE_KEY_FILENAME))?;
        let secret_bytes = decode_pem(&priv_pem, PRIVATE_PEM_LABEL)?;
        let secret: [u8; 32] = secret_bytes
            .try_into()
            .map_err(|_| BlockchainError::FormatError("private key is not 32 bytes".to_string()))?;

        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&secret)?;
        let public = Secp256k1PublicKey::from_secret_key(&secp, &secret_key);

        Ok(Self {
            secret: SecretKeyBytes(secret),
            public,
        })
    }
}

/// A DER-encoded ECDSA signature, capped at [`SIG_MAX_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Signature {
    bytes: Vec<u8>,
}

impl Signature {
    /// Builds a signature from raw DER bytes, rejecting anything over
    /// [`SIG_MAX_LEN`].
    ///
    /// # Errors
    ///
    /// Returns [`BlockchainError::CryptoFailure`] if `der` exceeds
    /// [`SIG_MAX_LEN`] bytes.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        if der.len() > SIG_MAX_LEN {
            return Err(BlockchainError::CryptoFailure(
                "DER signature exceeds maximum length".to_string(),
            ));
        }
        Ok(Self {
            bytes: der.to_vec(),
        })
    }

    /// An empty signature, used as the zero value for coinbase inputs.
    #[must_use]
    pub fn empty() -> Self {
        Self { bytes: Vec::new() }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn encode_pem(label: &str, bytes: &[u8]) -> String {
    use base64::{engine::general_purpose::STANDARD, Engine};
    let body = STANDARD.encode(bytes);
    let mut out = format!("-----BEGIN {label}-----\n");
    for chunk in body.as_bytes().chunks(64) {
        out.push_str(std::str::from_utf8(chunk).expect("base64 output is ASCII"));
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}

fn decode_pem(pem: &str, label: &str) -> Result<Vec<u8>> {
    use base64::{engine::general_purpose::STANDARD, Engine};
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");
    let body: String = pem
        .lines()
        .skip_while(|line| *line != begin)
        .skip(1)
        .take_while(|line| *line != end)
        .collect();
    STANDARD
        .decode(body)
        .map_err(|e| BlockchainError::FormatError(format!("invalid PEM body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_pair_signs_and_verifies() {
        let keypair = KeyPair::generate().unwrap();
        let digest = crate::hash::sha256(b"transaction id stand-in");

        let signature = keypair.sign(&digest).unwrap();
        assert!(keypair.verify(&digest, &signature).unwrap());
        assert!(signature.as_bytes().len() <= SIG_MAX_LEN);
    }

    #[test]
    fn tampered_digest_fails_verification() {
        let keypair = KeyPair::generate().unwrap();
        let digest = crate::hash::sha256(b"original");
        let other = crate::hash::sha256(b"tampered");

        let signature = keypair.sign(&digest).unwrap();
        assert!(!keypair.verify(&other, &signature).unwrap());
    }

    #[test]
    fn public_only_key_pair_cannot_sign() {
        let keypair = KeyPair::generate().unwrap();
        let pub_only = KeyPair::from_public_bytes(&keypair.to_public_bytes()).unwrap();
        let digest = crate::hash::sha256(b"whatever");

        assert!(pub_only.sign(&digest).is_err());
    }

    #[test]
    fn public_only_key_pair_still_verifies() {
        let keypair = KeyPair::generate().unwrap();
        let pub_only = KeyPair::from_public_bytes(&keypair.to_public_bytes()).unwrap();
        let digest = crate::hash::sha256(b"whatever");

        let signature = keypair.sign(&digest).unwrap();
        assert!(pub_only.verify(&digest, &signature).unwrap());
    }

    #[test]
    fn save_and_load_round_trips_the_key_pair() {
        let dir = tempfile::tempdir().unwrap();
        let keypair = KeyPair::generate().unwrap();
        keypair.save(dir.path()).unwrap();

        let loaded = KeyPair::load(dir.path()).unwrap();
        assert_eq!(loaded.to_public_bytes(), keypair.to_public_bytes());

        let digest = crate::hash::sha256(b"round trip");
        let signature = loaded.sign(&digest).unwrap();
        assert!(keypair.verify(&digest, &signature).unwrap());
    }
}
