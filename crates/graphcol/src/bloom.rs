//! Double-hashed bloom filter (spec §4.3), used for chunk-level pruning in
//! the lakehouse and for import bloom sidecars.

use graphdb_core::hash::double_hash;
use serde::{Deserialize, Serialize};

/// A serializable bloom filter record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloomFilter {
    bits: Vec<u64>,
    /// Number of bits, `m`.
    m: u64,
    /// Number of hash functions, `k`.
    k: u32,
    version: u8,
    expected_fpr: f64,
}

const FORMAT_VERSION: u8 = 1;

impl BloomFilter {
    /// Size `m` (bits) and `k` (hash count) from the expected cardinality
    /// `n` and target false-positive rate, using the standard optimal
    /// formulas:
    /// `m = ceil(-n * ln(p) / (ln 2)^2)`, `k = round((m/n) * ln 2)`.
    pub fn new(expected_cardinality: u64, target_fpr: f64) -> Self {
        let n = expected_cardinality.max(1) as f64;
        let p = target_fpr.clamp(1e-6, 0.5);
        let ln2 = std::f64::consts::LN_2;
        let m_bits = (-n * p.ln() / (ln2 * ln2)).ceil().max(8.0) as u64;
        let k = (((m_bits as f64) / n) * ln2).round().max(1.0) as u32;
        let words = (m_bits as usize).div_ceil(64);

        BloomFilter {
            bits: vec![0u64; words],
            m: m_bits,
            k,
            version: FORMAT_VERSION,
            expected_fpr: p,
        }
    }

    fn bit_index(&self, h1: u32, h2: u32, i: u32) -> u64 {
        let combined = (h1 as u64).wrapping_add((i as u64).wrapping_mul(h2 as u64));
        combined % self.m
    }

    fn set_bit(&mut self, idx: u64) {
        let word = (idx / 64) as usize;
        let bit = idx % 64;
        self.bits[word] |= 1u64 << bit;
    }

    fn get_bit(&self, idx: u64) -> bool {
        let word = (idx / 64) as usize;
        let bit = idx % 64;
        (self.bits[word] >> bit) & 1 == 1
    }

    /// Insert a key.
    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = double_hash(key);
        for i in 0..self.k {
            let idx = self.bit_index(h1, h2, i);
            self.set_bit(idx);
        }
    }

    /// Returns `true` for all inserted keys and `false` for most
    /// non-inserted keys, within the configured false-positive rate.
    pub fn might_exist(&self, key: &[u8]) -> bool {
        let (h1, h2) = double_hash(key);
        for i in 0..self.k {
            let idx = self.bit_index(h1, h2, i);
            if !self.get_bit(idx) {
                return false;
            }
        }
        true
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn m(&self) -> u64 {
        self.m
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn expected_fpr(&self) -> f64 {
        self.expected_fpr
    }

    pub fn size_bytes(&self) -> usize {
        self.bits.len() * 8
    }

    /// Serialize to a compact record (bincode-free: plain length-prefixed
    /// binary, consistent with the rest of the core binary formats).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size_bytes() + 32);
        out.push(self.version);
        out.extend_from_slice(&self.m.to_le_bytes());
        out.extend_from_slice(&self.k.to_le_bytes());
        out.extend_from_slice(&self.expected_fpr.to_le_bytes());
        out.extend_from_slice(&(self.bits.len() as u64).to_le_bytes());
        for w in &self.bits {
            out.extend_from_slice(&w.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let mut pos = 0usize;
        let take = |pos: &mut usize, n: usize| -> Option<&[u8]> {
            if *pos + n > bytes.len() {
                return None;
            }
            let s = &bytes[*pos..*pos + n];
            *pos += n;
            Some(s)
        };
        let version = *take(&mut pos, 1)?.first()?;
        let m = u64::from_le_bytes(take(&mut pos, 8)?.try_into().ok()?);
        let k = u32::from_le_bytes(take(&mut pos, 4)?.try_into().ok()?);
        let expected_fpr = f64::from_le_bytes(take(&mut pos, 8)?.try_into().ok()?);
        let word_count = u64::from_le_bytes(take(&mut pos, 8)?.try_into().ok()?) as usize;
        let mut bits = Vec::with_capacity(word_count);
        for _ in 0..word_count {
            bits.push(u64::from_le_bytes(take(&mut pos, 8)?.try_into().ok()?));
        }
        Some(BloomFilter {
            bits,
            m,
            k,
            version,
            expected_fpr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_keys_always_present() {
        let mut bloom = BloomFilter::new(1000, 0.01);
        let keys: Vec<String> = (0..1000).map(|i| format!("key-{i}")).collect();
        for k in &keys {
            bloom.insert(k.as_bytes());
        }
        for k in &keys {
            assert!(bloom.might_exist(k.as_bytes()));
        }
    }

    #[test]
    fn false_positive_rate_roughly_bounded() {
        let mut bloom = BloomFilter::new(1000, 0.01);
        for i in 0..1000 {
            bloom.insert(format!("present-{i}").as_bytes());
        }
        let mut false_positives = 0;
        let trials = 5000;
        for i in 0..trials {
            if bloom.might_exist(format!("absent-{i}").as_bytes()) {
                false_positives += 1;
            }
        }
        let observed_fpr = false_positives as f64 / trials as f64;
        // Generous bound: true fpr should be in the ballpark of 0.01, not
        // orders of magnitude off.
        assert!(observed_fpr < 0.05, "observed fpr too high: {observed_fpr}");
    }

    #[test]
    fn serialization_roundtrip() {
        let mut bloom = BloomFilter::new(100, 0.02);
        bloom.insert(b"hello");
        let bytes = bloom.to_bytes();
        let restored = BloomFilter::from_bytes(&bytes).unwrap();
        assert_eq!(restored.k(), bloom.k());
        assert_eq!(restored.m(), bloom.m());
        assert!(restored.might_exist(b"hello"));
    }
}
