// SPDX-License-Identifier: MIT
//! Which rings have been handed out.

use alloc::vec;
use alloc::vec::Vec;

pub struct RingBitmap {
    words: Vec<u64>,
    bits: usize,
}

impl RingBitmap {
    pub fn new(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(64)],
            bits,
        }
    }

    pub fn test(&self, bit: usize) -> bool {
        bit < self.bits && self.words[bit / 64] & (1 << (bit % 64)) != 0
    }

    pub fn set(&mut self, bit: usize) {
        if bit < self.bits {
            self.words[bit / 64] |= 1 << (bit % 64);
        }
    }

    pub fn clear(&mut self, bit: usize) {
        if bit < self.bits {
            self.words[bit / 64] &= !(1 << (bit % 64));
        }
    }

    /// First clear bit in `[start, end)`, or `end` if there is none.
    pub fn find_next_zero(&self, end: usize, start: usize) -> usize {
        let end = end.min(self.bits);
        let mut bit = start;
        while bit < end {
            let word = self.words[bit / 64] >> (bit % 64);
            if word == u64::MAX >> (bit % 64) {
                // rest of the word is taken
                bit = (bit / 64 + 1) * 64;
                continue;
            }

            let found = bit + (!word).trailing_zeros() as usize;
            return found.min(end);
        }

        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_test_clear() {
        let mut map = RingBitmap::new(130);
        map.set(0);
        map.set(129);
        map.set(500);

        assert!(map.test(0));
        assert!(map.test(129));
        assert!(!map.test(128));
        assert!(!map.test(500));

        map.clear(129);
        assert!(!map.test(129));
    }

    #[test]
    fn find_next_zero_skips_full_words() {
        let mut map = RingBitmap::new(200);
        for bit in 10..140 {
            map.set(bit);
        }

        assert_eq!(map.find_next_zero(200, 0), 0);
        assert_eq!(map.find_next_zero(200, 10), 140);
        assert_eq!(map.find_next_zero(100, 10), 100);
        assert_eq!(map.find_next_zero(200, 150), 150);
        assert_eq!(map.find_next_zero(400, 200), 200);
    }
}
