//! 128-bit content hash used to detect interchangeable geometry.
//!
//! Each `append` runs one MurmurHash3 x64_128 pass over the chunk, seeded with the
//! running state, so the result depends on chunk boundaries as well as bytes.

use std::fmt;

use bytemuck::Pod;

use crate::target::ParamArray;

const C1: u64 = 0x87c3_7b91_1142_53d5;
const C2: u64 = 0x4cf5_ad43_2745_937f;

fn fmix(mut k: u64) -> u64 {
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash {
    h1: u64,
    h2: u64,
}

impl ContentHash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_bytes(&mut self, data: &[u8]) {
        let len = data.len();
        let mut h1 = self.h1;
        let mut h2 = self.h2;

        let mut blocks = data.chunks_exact(16);
        for block in &mut blocks {
            let mut k1 = u64::from_le_bytes(block[0..8].try_into().unwrap_or([0; 8]));
            let mut k2 = u64::from_le_bytes(block[8..16].try_into().unwrap_or([0; 8]));

            k1 = k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2);
            h1 ^= k1;
            h1 = h1
                .rotate_left(27)
                .wrapping_add(h2)
                .wrapping_mul(5)
                .wrapping_add(0x52dc_e729);

            k2 = k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1);
            h2 ^= k2;
            h2 = h2
                .rotate_left(31)
                .wrapping_add(h1)
                .wrapping_mul(5)
                .wrapping_add(0x3849_5ab5);
        }

        let tail = blocks.remainder();
        if tail.len() > 8 {
            let mut k2 = 0u64;
            for (i, b) in tail[8..].iter().enumerate() {
                k2 ^= u64::from(*b) << (i * 8);
            }
            h2 ^= k2.wrapping_mul(C2).rotate_left(33).wrapping_mul(C1);
        }
        if !tail.is_empty() {
            let mut k1 = 0u64;
            for (i, b) in tail.iter().take(8).enumerate() {
                k1 ^= u64::from(*b) << (i * 8);
            }
            h1 ^= k1.wrapping_mul(C1).rotate_left(31).wrapping_mul(C2);
        }

        h1 ^= len as u64;
        h2 ^= len as u64;
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);
        h1 = fmix(h1);
        h2 = fmix(h2);
        h1 = h1.wrapping_add(h2);
        h2 = h2.wrapping_add(h1);

        self.h1 = h1;
        self.h2 = h2;
    }

    pub fn append_str(&mut self, s: &str) {
        self.append_bytes(s.as_bytes());
    }

    pub fn append_value<T: Pod>(&mut self, value: &T) {
        self.append_bytes(bytemuck::bytes_of(value));
    }

    pub fn append_slice<T: Pod>(&mut self, values: &[T]) {
        self.append_bytes(bytemuck::cast_slice(values));
    }

    /// Appends every key/value pair in key order.
    pub fn append_params(&mut self, params: &ParamArray) {
        for (key, value) in params.iter() {
            self.append_str(key);
            self.append_str(value);
        }
    }

    pub fn to_hex(&self) -> String {
        format!("{:016x}{:016x}", self.h1, self.h2)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_hash_prints_zeroes() {
        assert_eq!(ContentHash::new().to_hex(), "0".repeat(32));
    }

    #[test]
    fn hex_is_32_chars_after_append() {
        let mut h = ContentHash::new();
        h.append_str("pCubeShape1");
        assert_eq!(h.to_hex().len(), 32);
        assert_ne!(h, ContentHash::new());
    }

    #[test]
    fn chunk_boundaries_matter() {
        let mut a = ContentHash::new();
        a.append_str("ab");
        a.append_str("c");
        let mut b = ContentHash::new();
        b.append_str("a");
        b.append_str("bc");
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn equal_inputs_hash_equal(data in proptest::collection::vec(any::<u8>(), 0..200)) {
            let mut a = ContentHash::new();
            a.append_bytes(&data);
            let mut b = ContentHash::new();
            b.append_bytes(&data);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn single_byte_change_changes_hash(
            data in proptest::collection::vec(any::<u8>(), 1..200),
            idx in any::<proptest::sample::Index>(),
        ) {
            let mut changed = data.clone();
            let i = idx.index(changed.len());
            changed[i] = changed[i].wrapping_add(1);

            let mut a = ContentHash::new();
            a.append_bytes(&data);
            let mut b = ContentHash::new();
            b.append_bytes(&changed);
            prop_assert_ne!(a, b);
        }
    }
}
