// SPDX-License-Identifier: MIT

pub mod cache;
pub mod dma;

/// Smallest alignment the DMA masters and the cache maintenance operations work with.
pub const ARCH_DMA_MINALIGN: usize = 64;

/// Align downwards. Returns the greatest x with alignment `align`
/// so that x <= addr. The alignment must be a power of 2.
pub const fn align_down(size: usize, align: usize) -> usize {
    if align.is_power_of_two() {
        size & !(align - 1)
    } else if align == 0 {
        size
    } else {
        panic!("`align` must be a power of 2");
    }
}

/// Align the given address upwards to the given alignment.
///
/// Requires that the alignment is a power of two.
pub const fn align_up(addr: usize, align: usize) -> usize {
    (addr + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_helpers() {
        assert_eq!(align_up(0x1001, 0x40), 0x1040);
        assert_eq!(align_up(0x1040, 0x40), 0x1040);
        assert_eq!(align_down(0x107f, 0x40), 0x1040);
        assert_eq!(align_down(0x1234, 0), 0x1234);
    }
}
