//! Deterministic VRF output computation.
//!
//! Uses HMAC-SHA256 keyed by the oracle's secret to produce a 32-byte
//! pseudo-random output that is deterministic (same inputs = same output)
//! but unpredictable without the secret key. The base output is then
//! expanded into as many words as the request asked for.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::coordinator::PendingRequest;

type HmacSha256 = Hmac<Sha256>;

/// Compute the 32-byte VRF output for a given randomness request.
///
/// ```text
/// output = HMAC-SHA256(secret, gas_lane || subscription_id_le || requested_at_le || request_id_le)
/// ```
///
/// `requested_at` binds the output to the moment the draw was requested and
/// `request_id` keeps outputs unique across requests.
pub fn compute_randomness(hmac_secret: &[u8], pending: &PendingRequest) -> [u8; 32] {
    let mut mac =
        HmacSha256::new_from_slice(hmac_secret).expect("HMAC accepts keys of any size");

    mac.update(&pending.request.gas_lane);
    mac.update(&pending.request.subscription_id.to_le_bytes());
    mac.update(&pending.requested_at.to_le_bytes());
    mac.update(&pending.request_id.to_le_bytes());

    let result = mac.finalize();
    let bytes = result.into_bytes();

    let mut output = [0u8; 32];
    output.copy_from_slice(&bytes);
    output
}

/// Expand base randomness into multiple words: `word[i] = SHA256(randomness || i_le_bytes)`.
pub fn expand_randomness(base_randomness: &[u8; 32], num_words: u32) -> Vec<[u8; 32]> {
    (0..num_words)
        .map(|i| {
            let mut hasher = Sha256::new();
            hasher.update(base_randomness);
            hasher.update(i.to_le_bytes());
            let mut word = [0u8; 32];
            word.copy_from_slice(&hasher.finalize());
            word
        })
        .collect()
}

/// Expanded words reduced to the `u64` values the raffle consumes
/// (first 8 bytes, little-endian).
pub fn random_words(base_randomness: &[u8; 32], num_words: u32) -> Vec<u64> {
    expand_randomness(base_randomness, num_words)
        .iter()
        .map(|word| {
            let mut head = [0u8; 8];
            head.copy_from_slice(&word[..8]);
            u64::from_le_bytes(head)
        })
        .collect()
}
