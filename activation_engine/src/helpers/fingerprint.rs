use blake2::{Blake2s256, Digest};

use crate::db_types::{EffectType, TransactionId};

const FINGERPRINT_DOMAIN: &[u8] = b"tae.effect.v1";

/// Deterministic key for "effect `effect` has been applied to transaction `id`".
///
/// The effect log uses this as its primary key, so a second attempt at the same effect fails with a unique-key
/// violation no matter which caller (checkout, webhook, sweep, scheduler) makes it.
pub fn idempotency_fingerprint(id: &TransactionId, effect: EffectType) -> String {
    let mut hasher = Blake2s256::new();
    hasher.update(FINGERPRINT_DOMAIN);
    hasher.update([0u8]);
    hasher.update(id.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(effect.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
