use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Mint an opaque identifier that is unique within this process.
///
/// The digest mixes wall-clock nanoseconds, the process id and a monotonic
/// counter, so two calls in the same nanosecond still differ.
pub fn new_id() -> String {
    let digest = seeded_digest();
    hex_lower(&digest[..8])
}

/// Pick an index in `0..len` from the same entropy as [`new_id`].
///
/// Returns 0 for `len == 0` so callers can index-check afterwards.
pub fn pseudo_index(len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let digest = seeded_digest();
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    (u64::from_le_bytes(word) % len as u64) as usize
}

fn seeded_digest() -> [u8; 32] {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();

    let mut h = Sha256::new();
    h.update(now.as_nanos().to_le_bytes());
    h.update(pid.to_le_bytes());
    h.update(counter.to_le_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&h.finalize());
    out
}

fn hex_lower(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ids_are_unique_and_hex() {
        let ids: HashSet<String> = (0..1_000).map(|_| new_id()).collect();
        assert_eq!(ids.len(), 1_000);
        for id in &ids {
            assert_eq!(id.len(), 16);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn pseudo_index_stays_in_range() {
        assert_eq!(pseudo_index(0), 0);
        assert_eq!(pseudo_index(1), 0);
        for _ in 0..200 {
            assert!(pseudo_index(7) < 7);
        }
    }
}
