// SPDX-License-Identifier: MIT
//! Host descriptors and the pool they are carved from.

use alloc::boxed::Box;
use alloc::vec;
use core::mem;
use core::ptr;

use crate::error::{NavError, Result};
use crate::mem::cache;

//--------------------------------------------------------------------------------------------------
// Public definitions
//--------------------------------------------------------------------------------------------------
/// Descriptor type field of `desc_info`.
pub const DESC_TYPE_HOST: u32 = 0;
/// Protocol specific words live inside the descriptor.
pub const DESC_PSINFO_IN_DESCR: u32 = 0;
pub const DEFAULT_DESC_INFO: u32 = (DESC_TYPE_HOST << 30) | (DESC_PSINFO_IN_DESCR << 22);

/// Extended packet info block present.
pub const DESC_PINFO_EPIB: u32 = 1;
/// Hardware returns the descriptor to the queue in `packet_info` once done.
pub const DESC_PINFO_RETURN_OWN: u32 = 1;
pub const DEFAULT_PKT_INFO: u32 = (DESC_PINFO_EPIB << 31) | (DESC_PINFO_RETURN_OWN << 15);

/// Packet length field of `desc_info`.
pub const DESC_PKT_LEN_MASK: u32 = 0x003f_ffff;

/// Descriptors in the pool unless configured otherwise.
pub const HDESC_NUM: u32 = 256;

/// Host packet descriptor, as read and written by the queue manager and packet DMA.
#[repr(C, align(128))]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct HostDescriptor {
    pub desc_info: u32,
    pub tag_info: u32,
    pub packet_info: u32,
    pub buff_len: u32,
    pub buff_ptr: u32,
    pub next_bdptr: u32,
    pub orig_buff_len: u32,
    pub orig_buff_ptr: u32,
    pub timestamp: u32,
    pub swinfo: [u32; 3],
    pub ps_data: [u32; 20],
}

pub const DESC_SIZE: usize = mem::size_of::<HostDescriptor>();

/// Descriptor size as encoded in the low bits of a queue word: size in 16 byte units, minus one.
pub const DESC_SIZE_CODE: u32 = (DESC_SIZE as u32 >> 4) - 1;

/// Ownership of one descriptor while software holds it.
///
/// A handle comes out of a queue pop and is consumed by the next push, so a descriptor can never
/// sit in two queues at once.
#[must_use = "dropping a descriptor handle leaks the descriptor until the pool is reinitialised"]
#[derive(Debug, Eq, PartialEq)]
pub struct DescHandle {
    index: u32,
}

/// The statically sized set of descriptors handed to the queue manager at init.
pub struct DescriptorPool {
    descs: Box<[HostDescriptor]>,
    bus_base: u32,
}

//--------------------------------------------------------------------------------------------------
// Public code
//--------------------------------------------------------------------------------------------------
impl HostDescriptor {
    /// Packet length recorded by the DMA engine.
    pub fn packet_len(&self) -> u32 {
        self.desc_info & DESC_PKT_LEN_MASK
    }
}

impl DescHandle {
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl DescriptorPool {
    /// Allocate `num` zeroed descriptors.
    pub fn new(num: u32) -> Result<Self> {
        if num == 0 {
            return Err(NavError::InvalidConfig("descriptor pool cannot be empty"));
        }

        Ok(Self {
            descs: vec![HostDescriptor::default(); num as usize].into_boxed_slice(),
            bus_base: 0,
        })
    }

    pub fn len(&self) -> u32 {
        self.descs.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.descs.is_empty()
    }

    /// CPU address of the first descriptor.
    pub fn cpu_base(&self) -> usize {
        self.descs.as_ptr() as usize
    }

    /// Total size of the pool in bytes.
    pub fn byte_len(&self) -> usize {
        self.descs.len() * DESC_SIZE
    }

    pub fn bus_base(&self) -> u32 {
        self.bus_base
    }

    pub(crate) fn set_bus_base(&mut self, bus_base: u32) -> Result<()> {
        if bus_base & DESC_SIZE_CODE_MASK != 0 {
            return Err(NavError::InvalidConfig("descriptor pool is not 16 byte aligned"));
        }
        bus_base
            .checked_add(self.byte_len() as u32)
            .ok_or(NavError::AddressOutOfRange(bus_base as u64 + self.byte_len() as u64))?;

        self.bus_base = bus_base;
        Ok(())
    }

    /// Hand out every descriptor. Only the queue manager does this, once, at init.
    pub(crate) fn claim_all(&self) -> impl Iterator<Item = DescHandle> {
        (0..self.len()).map(|index| DescHandle { index })
    }

    /// Bus address of the descriptor behind `hd`.
    pub fn bus_addr(&self, hd: &DescHandle) -> u32 {
        self.bus_base + hd.index * DESC_SIZE as u32
    }

    /// Turn a word read from a queue back into a descriptor handle.
    pub fn handle_for(&self, word: u32) -> Result<DescHandle> {
        let addr = word & !DESC_SIZE_CODE_MASK;
        let offset = addr
            .checked_sub(self.bus_base)
            .ok_or(NavError::ForeignDescriptor(word))?;

        if offset as usize % DESC_SIZE != 0 || offset as usize / DESC_SIZE >= self.descs.len() {
            return Err(NavError::ForeignDescriptor(word));
        }

        Ok(DescHandle {
            index: offset / DESC_SIZE as u32,
        })
    }

    /// Snapshot the descriptor, as last written by either side.
    pub fn read(&self, hd: &DescHandle) -> HostDescriptor {
        let p = self.slot(hd);
        cache::invalidate(p as usize, DESC_SIZE);
        unsafe { ptr::read_volatile(p) }
    }

    /// Read-modify-write the descriptor, then write it back for the hardware to see.
    pub fn update<R>(&mut self, hd: &DescHandle, f: impl FnOnce(&mut HostDescriptor) -> R) -> R {
        let p = self.slot_mut(hd);
        let mut desc = unsafe { ptr::read_volatile(p) };
        let ret = f(&mut desc);
        unsafe { ptr::write_volatile(p, desc) };
        cache::flush(p as usize, DESC_SIZE);

        ret
    }

    /// Write the descriptor back for the hardware to see.
    pub fn flush(&self, hd: &DescHandle) {
        cache::flush(self.slot(hd) as usize, DESC_SIZE);
    }

    /// Zero every descriptor and give it the default host descriptor type.
    pub(crate) fn reset(&mut self) {
        for desc in self.descs.iter_mut() {
            *desc = HostDescriptor {
                desc_info: DEFAULT_DESC_INFO,
                packet_info: DEFAULT_PKT_INFO,
                ..HostDescriptor::default()
            };
        }
        cache::flush(self.cpu_base(), self.byte_len());
    }
}

//--------------------------------------------------------------------------------------------------
// Private definitions
//--------------------------------------------------------------------------------------------------
/// Low bits of a queue word carry the descriptor size, not the address.
const DESC_SIZE_CODE_MASK: u32 = 0xf;

//--------------------------------------------------------------------------------------------------
// Private code
//--------------------------------------------------------------------------------------------------
impl DescriptorPool {
    fn slot(&self, hd: &DescHandle) -> *const HostDescriptor {
        // handles are only minted for indices inside this pool
        &self.descs[hd.index as usize] as *const HostDescriptor
    }

    fn slot_mut(&mut self, hd: &DescHandle) -> *mut HostDescriptor {
        &mut self.descs[hd.index as usize] as *mut HostDescriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_layout_matches_hardware() {
        assert_eq!(DESC_SIZE, 128);
        assert_eq!(DESC_SIZE_CODE, 7);
        assert_eq!(mem::offset_of!(HostDescriptor, buff_ptr), 16);
        assert_eq!(mem::offset_of!(HostDescriptor, orig_buff_ptr), 28);
        assert_eq!(mem::offset_of!(HostDescriptor, swinfo), 36);
        assert_eq!(mem::offset_of!(HostDescriptor, ps_data), 48);
    }

    #[test]
    fn default_words() {
        assert_eq!(DEFAULT_DESC_INFO, 0);
        assert_eq!(DEFAULT_PKT_INFO, 0x8000_8000);
    }

    #[test]
    fn queue_words_map_back_to_handles() {
        let mut pool = DescriptorPool::new(4).unwrap();
        pool.set_bus_base(0x0c00_0000).unwrap();

        let handles: alloc::vec::Vec<_> = pool.claim_all().collect();
        assert_eq!(pool.bus_addr(&handles[2]), 0x0c00_0100);

        let hd = pool.handle_for(0x0c00_0100 | DESC_SIZE_CODE).unwrap();
        assert_eq!(hd.index(), 2);
    }

    #[test]
    fn foreign_words_are_rejected() {
        let mut pool = DescriptorPool::new(4).unwrap();
        pool.set_bus_base(0x0c00_0000).unwrap();

        assert_eq!(
            pool.handle_for(0x0bff_ff80),
            Err(NavError::ForeignDescriptor(0x0bff_ff80))
        );
        assert_eq!(
            pool.handle_for(0x0c00_0200),
            Err(NavError::ForeignDescriptor(0x0c00_0200))
        );
        assert_eq!(
            pool.handle_for(0x0c00_0040),
            Err(NavError::ForeignDescriptor(0x0c00_0040))
        );
    }

    #[test]
    fn update_is_visible_to_read() {
        let mut pool = DescriptorPool::new(2).unwrap();
        let hd = pool.claim_all().nth(1).unwrap();

        pool.update(&hd, |d| {
            d.desc_info = 0xffc0_0040;
            d.swinfo[2] = 0x1000_0000;
        });

        let desc = pool.read(&hd);
        assert_eq!(desc.packet_len(), 0x40);
        assert_eq!(desc.swinfo[2], 0x1000_0000);
    }
}
