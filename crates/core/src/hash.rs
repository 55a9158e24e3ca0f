//! FNV-1a 32-bit hash and a derived second hash, used for shard routing and
//! bloom filter bit positions (spec §4.1, §4.8).

/// Canonical FNV-1a offset basis.
pub const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
/// Canonical FNV-1a prime.
pub const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a 32-bit hash over arbitrary bytes.
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// FNV-1a over a `&str`.
pub fn fnv1a_str(s: &str) -> u32 {
    fnv1a(s.as_bytes())
}

/// A second, independent hash derived by re-mixing the primary FNV-1a
/// output. Used together with `fnv1a` to drive double-hashed bloom filters
/// (`h1 + i*h2`, spec §4.3) without computing two unrelated hash families.
pub fn fnv1a_mix2(h1: u32) -> u32 {
    // Re-hash the 4 bytes of h1 through another FNV-1a pass; independent
    // enough in practice for double-hashing bloom constructions.
    let bytes = h1.to_le_bytes();
    let mut h = fnv1a(&bytes);
    if h == 0 {
        h = FNV_PRIME;
    }
    h
}

/// Two independent-enough hashes for a key, as used by the bloom filter and
/// shard router.
pub fn double_hash(bytes: &[u8]) -> (u32, u32) {
    let h1 = fnv1a(bytes);
    let h2 = fnv1a_mix2(h1);
    (h1, h2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_matches_known_vector() {
        // FNV-1a 32-bit of the empty string is the offset basis.
        assert_eq!(fnv1a(b""), FNV_OFFSET_BASIS);
    }

    #[test]
    fn fnv1a_deterministic() {
        assert_eq!(fnv1a_str("hello"), fnv1a_str("hello"));
        assert_ne!(fnv1a_str("hello"), fnv1a_str("world"));
    }

    #[test]
    fn double_hash_components_differ_usually() {
        let (h1, h2) = double_hash(b"https://example.com/ns");
        assert_ne!(h1, h2);
    }
}
