// SPDX-License-Identifier: MIT
//! Data cache maintenance around DMA.
//!
//! Descriptors and ring memory are shared with bus masters that do not snoop the CPU caches on
//! every SoC. The platform registers its maintenance operations here; until it does, both
//! operations are no-ops, which is correct for coherent interconnects.

use crate::mem::{align_down, align_up, ARCH_DMA_MINALIGN};
use crate::sync::interface::{Mutex, ReadWriteEx};
use crate::sync::IRQSafeNullLock;

pub mod interface {
    pub trait CacheMaintenance {
        /// Write back `[start, end)` to memory.
        fn flush_dcache_range(&self, start: usize, end: usize);

        /// Drop `[start, end)` from the cache so the next read goes to memory.
        fn invalidate_dcache_range(&self, start: usize, end: usize);
    }
}

use interface::CacheMaintenance;

struct CoherentCache;

impl CacheMaintenance for CoherentCache {
    fn flush_dcache_range(&self, _start: usize, _end: usize) {}

    fn invalidate_dcache_range(&self, _start: usize, _end: usize) {}
}

static COHERENT_CACHE: CoherentCache = CoherentCache;
static CUR_CACHE_OPS: IRQSafeNullLock<&'static (dyn CacheMaintenance + Sync)> =
    IRQSafeNullLock::new(&COHERENT_CACHE);

pub fn register_cache_ops(ops: &'static (dyn CacheMaintenance + Sync)) {
    CUR_CACHE_OPS.lock(|cur| *cur = ops);
}

fn cache_ops() -> &'static (dyn CacheMaintenance + Sync) {
    CUR_CACHE_OPS.read(|cur| *cur)
}

/// Widen `[addr, addr + len)` to whole DMA lines.
fn line_range(addr: usize, len: usize) -> (usize, usize) {
    (
        align_down(addr, ARCH_DMA_MINALIGN),
        align_up(addr + len, ARCH_DMA_MINALIGN),
    )
}

/// Make CPU writes to `[addr, addr + len)` visible to DMA.
pub fn flush(addr: usize, len: usize) {
    let (start, end) = line_range(addr, len);
    cache_ops().flush_dcache_range(start, end);
}

/// Make DMA writes to `[addr, addr + len)` visible to the CPU.
pub fn invalidate(addr: usize, len: usize) {
    let (start, end) = line_range(addr, len);
    cache_ops().invalidate_dcache_range(start, end);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_widened_to_dma_lines() {
        assert_eq!(line_range(0x1010, 0x20), (0x1000, 0x1040));
        assert_eq!(line_range(0x1000, 0x80), (0x1000, 0x1080));
        assert_eq!(line_range(0x103f, 2), (0x1000, 0x1080));
    }
}
