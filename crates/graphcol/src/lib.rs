//! GraphCol columnar codec (C2) and bloom filter (C3), spec §4.2/§4.3.

pub mod bloom;
pub mod codec;

pub use bloom::BloomFilter;
pub use codec::{decode, encode, DecodedFrame};
