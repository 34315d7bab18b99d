// SPDX-License-Identifier: MIT
use alloc::alloc::{alloc_zeroed, dealloc};
use core::alloc::Layout;
use core::fmt;
use core::ptr::NonNull;
use core::slice;

use crate::error::{NavError, Result};

//--------------------------------------------------------------------------------------------------
// Public definitions
//--------------------------------------------------------------------------------------------------
/// An address as seen by the DMA masters.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct DmaAddr(pub u64);

pub mod interface {
    use crate::error::Result;
    use crate::mem::dma::DmaAddr;

    pub trait DmaMapper {
        /// Translate the CPU region `[cpu_addr, cpu_addr + len)` into the address the DMA
        /// masters use for it. The whole region must be visible to them.
        fn to_bus(&self, cpu_addr: usize, len: usize) -> Result<DmaAddr>;
    }
}

/// Bus addresses equal CPU addresses. This is the case for the bootloader's flat mapping.
pub struct IdentityMapper;

/// Zeroed memory with a fixed alignment, owned by the driver and shared with a DMA master.
pub struct DmaBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

//--------------------------------------------------------------------------------------------------
// Public code
//--------------------------------------------------------------------------------------------------
impl DmaAddr {
    pub const fn lower_32_bits(self) -> u32 {
        self.0 as u32
    }

    pub const fn upper_32_bits(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// The address as a 32-bit bus word, for masters that cannot reach above 4 GiB.
    pub fn to_u32(self) -> Result<u32> {
        u32::try_from(self.0).map_err(|_| NavError::AddressOutOfRange(self.0))
    }
}

impl fmt::Display for DmaAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl interface::DmaMapper for IdentityMapper {
    fn to_bus(&self, cpu_addr: usize, len: usize) -> Result<DmaAddr> {
        cpu_addr
            .checked_add(len)
            .map(|_| DmaAddr(cpu_addr as u64))
            .ok_or(NavError::Unmapped { addr: cpu_addr, len })
    }
}

impl DmaBuffer {
    /// Allocate `size` zeroed bytes aligned to `align`.
    pub fn new(size: usize, align: usize) -> Result<Self> {
        if size == 0 {
            return Err(NavError::InvalidArgument);
        }

        let layout = Layout::from_size_align(size, align).map_err(|_| NavError::InvalidArgument)?;
        let ptr = unsafe { alloc_zeroed(layout) };

        NonNull::new(ptr)
            .map(|ptr| Self { ptr, layout })
            .ok_or(NavError::OutOfMemory)
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len()) }
    }

    /// Whether `[addr, addr + len)` lies inside this buffer.
    pub fn contains(&self, addr: usize, len: usize) -> bool {
        addr >= self.addr()
            && addr
                .checked_add(len)
                .map_or(false, |end| end <= self.addr() + self.len())
    }
}

impl Drop for DmaBuffer {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

// the buffer is plain memory, shared with hardware only through explicit bus handoffs
unsafe impl Send for DmaBuffer {}

#[cfg(test)]
mod tests {
    use super::interface::DmaMapper;
    use super::*;

    #[test]
    fn buffers_are_zeroed_and_aligned() {
        let buf = DmaBuffer::new(300, 128).unwrap();
        assert_eq!(buf.len(), 300);
        assert_eq!(buf.addr() % 128, 0);
        assert!(buf.as_slice().iter().all(|b| *b == 0));
        assert!(buf.contains(buf.addr() + 100, 200));
        assert!(!buf.contains(buf.addr() + 100, 201));
    }

    #[test]
    fn zero_sized_buffers_are_rejected() {
        assert_eq!(DmaBuffer::new(0, 64).err(), Some(NavError::InvalidArgument));
    }

    #[test]
    fn bus_words_must_fit_32_bits() {
        assert_eq!(DmaAddr(0x8000_0000).to_u32(), Ok(0x8000_0000));
        assert_eq!(
            DmaAddr(0x1_0000_0000).to_u32(),
            Err(NavError::AddressOutOfRange(0x1_0000_0000))
        );
        assert_eq!(DmaAddr(0x8_1234_5678).upper_32_bits(), 0x8);
        assert_eq!(DmaAddr(0x8_1234_5678).lower_32_bits(), 0x1234_5678);
    }

    #[test]
    fn identity_mapping() {
        assert_eq!(IdentityMapper.to_bus(0x1000, 0x40), Ok(DmaAddr(0x1000)));
        assert!(IdentityMapper.to_bus(usize::MAX, 2).is_err());
    }
}
