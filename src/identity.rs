// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Peer identity and cluster secret generation.
//!
//! Every IPFS cluster needs two pieces of identity material:
//!
//! - a bootstrap peer keypair (Ed25519) together with its libp2p peer id, which
//!   the first StatefulSet pod uses as its cluster identity and every other pod
//!   dials to join the cluster
//! - a shared cluster secret (32 random bytes, lowercase hex) that all peers use
//!   to authenticate the private cluster swarm
//!
//! Key generation reads from an injected random source so tests can supply a
//! seeded generator. The cluster secret is drawn from a process-wide generator
//! that is seeded exactly once from OS entropy (see [`seed_process_rng`]).
//!
//! # Wire formats
//!
//! Keys use the libp2p protobuf encoding so ipfs-cluster can read them directly:
//!
//! - private key: `08 01 12 40 || seed(32) || public(32)`
//! - public key:  `08 01 12 20 || public(32)`
//! - peer id: base58btc of the identity multihash of the encoded public key

use crate::constants::{CLUSTER_SECRET_BYTES, PROCESS_SEED_BYTES};
use crate::errors::IdentityError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH};
use multibase::Base;
use multihash::Multihash;
use rand::rngs::{OsRng, StdRng};
use rand::{SeedableRng, TryRngCore};
use std::fmt;
use std::sync::{Mutex, OnceLock};
use tracing::{debug, info};

/// Multihash code for the identity hash (digest is the input itself)
const IDENTITY_MULTIHASH_CODE: u64 = 0x00;

/// libp2p `KeyType::Ed25519`
const KEY_TYPE_ED25519: u8 = 1;

/// Protobuf tag for field 1 (`Type`, varint)
const PROTO_TAG_TYPE: u8 = 0x08;

/// Protobuf tag for field 2 (`Data`, length-delimited)
const PROTO_TAG_DATA: u8 = 0x12;

/// Keypair bytes length (seed followed by public key)
const KEYPAIR_LENGTH: usize = SECRET_KEY_LENGTH + PUBLIC_KEY_LENGTH;

/// A libp2p peer identifier, e.g. `12D3KooW...`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeerId(String);

impl PeerId {
    /// Derive the peer id of an Ed25519 public key.
    ///
    /// The result is a pure function of the public key.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::PeerId`] if the multihash cannot be built.
    pub fn from_public_key(public_key: &VerifyingKey) -> Result<Self, IdentityError> {
        let encoded = encode_public_key(public_key);
        let multihash = Multihash::<64>::wrap(IDENTITY_MULTIHASH_CODE, &encoded)
            .map_err(|e| IdentityError::PeerId(e.to_string()))?;

        // multibase prefixes the base code ('z'); peer ids are rendered without it
        let prefixed = multibase::encode(Base::Base58Btc, multihash.to_bytes());
        let rendered = prefixed
            .strip_prefix(Base::Base58Btc.code())
            .unwrap_or(&prefixed)
            .to_string();
        Ok(Self(rendered))
    }

    /// Peer id as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity material for one `Ipfs` cluster.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityMaterial {
    /// libp2p protobuf-encoded Ed25519 private key
    pub private_key: Vec<u8>,
    /// Peer id derived from the public half of `private_key`
    pub peer_id: PeerId,
    /// 64 lowercase hex characters
    pub cluster_secret: String,
}

impl fmt::Debug for IdentityMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityMaterial")
            .field("private_key", &"<redacted>")
            .field("peer_id", &self.peer_id)
            .field("cluster_secret", &"<redacted>")
            .finish()
    }
}

impl IdentityMaterial {
    /// Build identity material from a signing key and cluster secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the peer id cannot be derived.
    pub fn from_signing_key(
        signing_key: &SigningKey,
        cluster_secret: String,
    ) -> Result<Self, IdentityError> {
        Ok(Self {
            private_key: encode_private_key(signing_key),
            peer_id: PeerId::from_public_key(&signing_key.verifying_key())?,
            cluster_secret,
        })
    }

    /// Rebuild identity material from its persisted form.
    ///
    /// `private_key_base64` is the standard-base64 libp2p private key and
    /// `cluster_secret` the hex secret, as stored in the cluster `Secret`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::InvalidKey`] if either value is malformed.
    pub fn from_encoded(
        private_key_base64: &str,
        cluster_secret: &str,
    ) -> Result<Self, IdentityError> {
        let private_key = BASE64
            .decode(private_key_base64.trim())
            .map_err(|e| IdentityError::InvalidKey(format!("base64: {e}")))?;
        let signing_key = decode_private_key(&private_key)?;

        if !is_valid_cluster_secret(cluster_secret) {
            return Err(IdentityError::InvalidKey(
                "cluster secret must be 64 lowercase hex characters".to_string(),
            ));
        }

        Self::from_signing_key(&signing_key, cluster_secret.to_string())
    }

    /// Private key in standard base64, the form stored in the cluster `Secret`.
    #[must_use]
    pub fn private_key_base64(&self) -> String {
        BASE64.encode(&self.private_key)
    }
}

/// Generate a fresh Ed25519 signing key.
///
/// # Errors
///
/// Returns [`IdentityError::Entropy`] if the random source fails.
pub fn generate_keypair<R>(rng: &mut R) -> Result<SigningKey, IdentityError>
where
    R: TryRngCore + ?Sized,
{
    let mut seed = [0u8; SECRET_KEY_LENGTH];
    rng.try_fill_bytes(&mut seed)
        .map_err(|e| IdentityError::Entropy(e.to_string()))?;
    Ok(SigningKey::from_bytes(&seed))
}

/// Generate a fresh cluster secret: 32 random bytes rendered as lowercase hex.
///
/// # Errors
///
/// Returns [`IdentityError::Entropy`] if the random source fails.
pub fn generate_cluster_secret<R>(rng: &mut R) -> Result<String, IdentityError>
where
    R: TryRngCore + ?Sized,
{
    let mut buf = [0u8; CLUSTER_SECRET_BYTES];
    rng.try_fill_bytes(&mut buf)
        .map_err(|e| IdentityError::Entropy(e.to_string()))?;
    Ok(hex::encode(buf))
}

/// Generate a complete set of identity material.
///
/// # Errors
///
/// Returns an error if either random source fails or the peer id cannot be derived.
pub fn generate_identity<K, S>(
    key_rng: &mut K,
    secret_rng: &mut S,
) -> Result<IdentityMaterial, IdentityError>
where
    K: TryRngCore + ?Sized,
    S: TryRngCore + ?Sized,
{
    let signing_key = generate_keypair(key_rng)?;
    let cluster_secret = generate_cluster_secret(secret_rng)?;
    let material = IdentityMaterial::from_signing_key(&signing_key, cluster_secret)?;
    debug!(peer_id = %material.peer_id, "Generated new peer identity");
    Ok(material)
}

fn encode_public_key(public_key: &VerifyingKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + PUBLIC_KEY_LENGTH);
    out.extend_from_slice(&[
        PROTO_TAG_TYPE,
        KEY_TYPE_ED25519,
        PROTO_TAG_DATA,
        PUBLIC_KEY_LENGTH as u8,
    ]);
    out.extend_from_slice(public_key.as_bytes());
    out
}

fn encode_private_key(signing_key: &SigningKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + KEYPAIR_LENGTH);
    out.extend_from_slice(&[
        PROTO_TAG_TYPE,
        KEY_TYPE_ED25519,
        PROTO_TAG_DATA,
        KEYPAIR_LENGTH as u8,
    ]);
    out.extend_from_slice(&signing_key.to_keypair_bytes());
    out
}

fn decode_private_key(bytes: &[u8]) -> Result<SigningKey, IdentityError> {
    let header = [
        PROTO_TAG_TYPE,
        KEY_TYPE_ED25519,
        PROTO_TAG_DATA,
        KEYPAIR_LENGTH as u8,
    ];
    let keypair = bytes
        .strip_prefix(&header[..])
        .ok_or_else(|| IdentityError::InvalidKey("not a libp2p Ed25519 private key".into()))?;
    if keypair.len() != KEYPAIR_LENGTH {
        return Err(IdentityError::InvalidKey(format!(
            "expected {KEYPAIR_LENGTH} key bytes, got {}",
            keypair.len()
        )));
    }

    let (seed, public) = keypair.split_at(SECRET_KEY_LENGTH);
    let seed: [u8; SECRET_KEY_LENGTH] = seed
        .try_into()
        .map_err(|_| IdentityError::InvalidKey("bad seed length".into()))?;
    let signing_key = SigningKey::from_bytes(&seed);

    // The stored public half must match the one derived from the seed
    if signing_key.verifying_key().as_bytes().as_slice() != public {
        return Err(IdentityError::InvalidKey(
            "public key does not match private key".into(),
        ));
    }
    Ok(signing_key)
}

fn is_valid_cluster_secret(secret: &str) -> bool {
    secret.len() == CLUSTER_SECRET_BYTES * 2
        && secret
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

// ============================================================================
// Process-wide random source
// ============================================================================

/// Process-wide generator for cluster secrets.
///
/// Set once by [`seed_process_rng`]; never replaced afterwards.
static PROCESS_RNG: OnceLock<Mutex<StdRng>> = OnceLock::new();

/// Decode an unsigned LEB128 varint from the front of `buf`.
///
/// Returns `None` if `buf` ends before the varint terminates or the value
/// overflows 64 bits.
#[must_use]
pub fn decode_uvarint(buf: &[u8]) -> Option<u64> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if i == 10 {
            return None;
        }
        if byte < 0x80 {
            if i == 9 && byte > 1 {
                return None;
            }
            return Some(value | (u64::from(byte) << shift));
        }
        value |= u64::from(byte & 0x7f) << shift;
        shift += 7;
    }
    None
}

/// Turn the raw OS seed into the generator seed.
///
/// The bytes are read as a varint; if they do not form a complete varint the
/// little-endian integer of all eight bytes is used instead.
#[must_use]
pub fn seed_from_bytes(seed: &[u8; PROCESS_SEED_BYTES]) -> u64 {
    decode_uvarint(seed).unwrap_or_else(|| u64::from_le_bytes(*seed))
}

/// Seed the process-wide generator from OS entropy.
///
/// Only the first call has an effect; later calls return `Ok(())` without
/// touching the generator.
///
/// # Errors
///
/// Returns [`IdentityError::Entropy`] if the OS entropy source fails.
pub fn seed_process_rng() -> Result<(), IdentityError> {
    if PROCESS_RNG.get().is_some() {
        return Ok(());
    }

    let mut seed = [0u8; PROCESS_SEED_BYTES];
    let mut os = OsRng;
    os.try_fill_bytes(&mut seed)
        .map_err(|e| IdentityError::Entropy(e.to_string()))?;

    // A concurrent caller may have won the race; its generator is kept.
    if PROCESS_RNG
        .set(Mutex::new(StdRng::seed_from_u64(seed_from_bytes(&seed))))
        .is_ok()
    {
        info!("Seeded process-wide random source");
    }
    Ok(())
}

/// Run `f` with exclusive access to the process-wide generator.
///
/// # Errors
///
/// Returns [`IdentityError::Unseeded`] before [`seed_process_rng`] has run, or
/// [`IdentityError::Poisoned`] if a previous holder panicked.
pub fn with_process_rng<T>(f: impl FnOnce(&mut StdRng) -> T) -> Result<T, IdentityError> {
    let lock = PROCESS_RNG.get().ok_or(IdentityError::Unseeded)?;
    let mut guard = lock.lock().map_err(|_| IdentityError::Poisoned)?;
    Ok(f(&mut guard))
}

/// Source of fresh identity material for the reconcile engine.
pub trait IdentitySource: Send + Sync {
    /// Produce a new, never-before-used set of identity material.
    ///
    /// # Errors
    ///
    /// Returns an error if randomness or key derivation fails.
    fn generate(&self) -> Result<IdentityMaterial, IdentityError>;
}

/// Production [`IdentitySource`]: keys from OS entropy, secrets from the
/// process-wide generator.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessIdentitySource;

impl IdentitySource for ProcessIdentitySource {
    fn generate(&self) -> Result<IdentityMaterial, IdentityError> {
        let mut os = OsRng;
        with_process_rng(|secret_rng| generate_identity(&mut os, secret_rng))?
    }
}

/// [`IdentitySource`] drawing everything from one seeded generator.
///
/// Output is fully determined by the seed.
#[derive(Debug)]
pub struct SeededIdentitySource {
    rng: Mutex<StdRng>,
}

impl SeededIdentitySource {
    /// Create a source from a fixed seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl IdentitySource for SeededIdentitySource {
    fn generate(&self) -> Result<IdentityMaterial, IdentityError> {
        let mut rng = self.rng.lock().map_err(|_| IdentityError::Poisoned)?;
        let mut secret_rng = StdRng::seed_from_u64(rand::RngCore::next_u64(&mut *rng));
        generate_identity(&mut *rng, &mut secret_rng)
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod identity_tests;
