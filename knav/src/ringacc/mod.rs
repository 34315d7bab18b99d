// SPDX-License-Identifier: MIT
//! K3 Navigator Subsystem ring accelerator.
//!
//! Rings are circular buffers of fixed size elements in memory, with hardware keeping the
//! occupancy count. Software writes elements and rings the doorbell; the DMA on the other side
//! does the same in the opposite direction.
//!
//! In dual ring mode (the DMA-internal ring accelerator) every ring `n` comes with a reverse ring
//! `n + num_rings` sharing its memory and configuration: software pushes on the forward ring and
//! the DMA hands completed elements back on the reverse one.

mod bitmap;
pub mod firmware;

use alloc::vec::Vec;
use core::ptr;

use bitflags::bitflags;
use tock_registers::{
    interfaces::{Readable, Writeable},
    register_bitfields, register_structs,
    registers::{ReadOnly, WriteOnly},
};

use crate::driver::{interface::DeviceDriver, DriverLoadOrder, MMIODerefWrapper};
use crate::error::{NavError, Result};
use crate::mem::dma::interface::DmaMapper;
use crate::mem::dma::{DmaAddr, DmaBuffer};
use crate::mem::{cache, ARCH_DMA_MINALIGN};
use crate::{debug, info, warn};

use self::bitmap::RingBitmap;
use self::firmware::interface::RingFirmware;
use self::firmware::{RingFwParams, ValidParams};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum RingMode {
    /// Exposed ring, software and hardware share the memory.
    Ring = 0,
    Message = 1,
    Credentials = 2,
    Qm = 3,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[repr(u8)]
pub enum ElementSize {
    E4 = 0,
    E8 = 1,
    E16 = 2,
    E32 = 3,
    E64 = 4,
    E128 = 5,
    E256 = 6,
}

bitflags! {
    pub struct RingCfgFlags: u32 {
        /// The ring may be requested again while in use.
        const SHARED = 1 << 1;
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RingConfig {
    /// Ring size in elements.
    pub size: u32,
    pub elm_size: ElementSize,
    pub mode: RingMode,
    pub flags: RingCfgFlags,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RingRequest {
    /// Any free general purpose ring.
    Any,
    Id(u32),
}

/// Software view of a ring's progress.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RingState {
    pub free: u32,
    pub occ: u32,
    pub windex: u32,
    pub rindex: u32,
    pub tdown_complete: bool,
}

/// A ring handed out by [`RingAccelerator::request_ring`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RingHandle {
    index: u32,
}

/// General purpose rings, free for [`RingRequest::Any`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GpRange {
    pub start: u32,
    pub num: u32,
}

#[derive(Clone, Debug)]
pub struct RingAccConfig {
    pub num_rings: u32,
    pub gp_range: GpRange,
    /// Clear the DMA's internal occupancy counter when resetting rings.
    pub dma_ring_reset_quirk: bool,
    /// Every ring has a reverse ring; see the module docs.
    pub dual_ring: bool,
    /// Base of the per-ring realtime registers.
    pub rt_base: usize,
    /// Device id of the ring accelerator at the firmware.
    pub sci_dev_id: u32,
}

pub struct RingAccelerator<'a> {
    cfg: RingAccConfig,
    rings: Vec<Ring>,
    in_use: RingBitmap,
    fw: &'a dyn RingFirmware,
    mapper: &'a dyn DmaMapper,
}

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

register_bitfields! {
    u32,

    RING_OCC [
        Count OFFSET(0) NUMBITS(21) [],
        TdownComplete OFFSET(31) NUMBITS(1) []
    ]
}

register_structs! {
    #[allow(non_snake_case)]
    RingRtRegs {
        (0x00 => _reserved0),
        (0x10 => DB: WriteOnly<u32>),
        (0x14 => _reserved1),
        (0x18 => OCC: ReadOnly<u32, RING_OCC::Register>),
        (0x1c => INDX: ReadOnly<u32>),
        (0x20 => HWOCC: ReadOnly<u32>),
        (0x24 => HWINDX: ReadOnly<u32>),
        (0x28 => @END),
    }
}

const RT_REGS_STEP: usize = 0x1000;
const DUAL_RT_REGS_STEP: usize = 0x2000;
const DUAL_RT_REVERSE_OFFSET: usize = 0x1000;

/// Element count field of the size register.
const CFG_ELCNT_MASK: u32 = 0x000f_ffff;
const DUAL_CFG_ELCNT_MASK: u32 = 0x0000_ffff;

/// The doorbell takes at most this many elements per write.
const MAX_DB_RING_CNT: u32 = 127;
/// Width of the DMA's internal occupancy counter, plus one.
const DMA_OCC_WRAP: u32 = 1 << 22;

/// Doorbell value taking one element off a ring.
const DB_POP: u32 = u32::MAX;
/// Entry field of the doorbell, for the reverse ring.
const DB_ENTRY_MASK: u32 = 0xff;
const DB_PUSH: u32 = 1;
const DB_TDOWN_ACK: u32 = 1 << 31;

/// Element handed out once a DMA channel teardown completed.
const TDCM_MARKER: u64 = 1;

bitflags! {
    struct RingFlags: u32 {
        const BUSY = 1 << 1;
        const SHARED = 1 << 2;
        const REVERSE = 1 << 3;
    }
}

/// How elements move in and out of a ring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum RingOps {
    None,
    /// Exposed ring memory.
    Ring,
    /// Forward half of a dual ring.
    DmaForward,
    /// Reverse half of a dual ring.
    DmaReverse,
}

struct Ring {
    rt: MMIODerefWrapper<RingRtRegs>,
    /// Owned by the forward ring; the reverse ring borrows its address.
    mem: Option<DmaBuffer>,
    mem_virt: usize,
    mem_dma: DmaAddr,
    ops: RingOps,
    size: u32,
    elm_size: ElementSize,
    mode: RingMode,
    flags: RingFlags,
    state: RingState,
    ring_id: u32,
    use_count: u32,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl ElementSize {
    pub const fn bytes(self) -> usize {
        4 << self as u8
    }
}

impl RingHandle {
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl<'a> RingAccelerator<'a> {
    /// Create an instance.
    ///
    /// # Safety
    ///
    /// - `cfg.rt_base` must be the mapped realtime register region covering every ring.
    pub unsafe fn new(
        cfg: RingAccConfig,
        fw: &'a dyn RingFirmware,
        mapper: &'a dyn DmaMapper,
    ) -> Result<Self> {
        if cfg.num_rings == 0 {
            return Err(NavError::InvalidConfig("no rings"));
        }
        if cfg.gp_range.start.saturating_add(cfg.gp_range.num) > cfg.num_rings {
            return Err(NavError::InvalidConfig("general purpose rings out of range"));
        }

        let num = cfg.num_rings as usize;
        let mut rings = Vec::with_capacity(if cfg.dual_ring { 2 * num } else { num });
        if cfg.dual_ring {
            for i in 0..num {
                rings.push(Ring::new(cfg.rt_base + DUAL_RT_REGS_STEP * i, i as u32));
            }
            for i in 0..num {
                let mut reverse = Ring::new(
                    cfg.rt_base + DUAL_RT_REGS_STEP * i + DUAL_RT_REVERSE_OFFSET,
                    i as u32,
                );
                reverse.flags = RingFlags::REVERSE;
                rings.push(reverse);
            }

            info!("ringacc: {} dual rings, sci-dev-id {}", cfg.num_rings, cfg.sci_dev_id);
        } else {
            for i in 0..num {
                rings.push(Ring::new(cfg.rt_base + RT_REGS_STEP * i, i as u32));
            }

            info!(
                "ringacc: {} rings, gp rings [{}, {}], sci-dev-id {}",
                cfg.num_rings,
                cfg.gp_range.start,
                cfg.gp_range.num,
                cfg.sci_dev_id
            );
        }
        info!(
            "ringacc: dma ring reset quirk {}",
            if cfg.dma_ring_reset_quirk { "enabled" } else { "disabled" }
        );

        Ok(Self {
            in_use: RingBitmap::new(num),
            cfg,
            rings,
            fw,
            mapper,
        })
    }

    pub fn config(&self) -> &RingAccConfig {
        &self.cfg
    }

    /// Claim a ring. Shared rings may be claimed again while in use.
    pub fn request_ring(&mut self, req: RingRequest) -> Result<RingHandle> {
        let id = match req {
            RingRequest::Any => {
                let start = self.cfg.gp_range.start as usize;
                let end = start + self.cfg.gp_range.num as usize;
                let id = self.in_use.find_next_zero(end, start);
                if id == end {
                    return Err(NavError::NoDevice);
                }
                id
            }
            RingRequest::Id(id) if id < self.cfg.num_rings => id as usize,
            RingRequest::Id(_) => return Err(NavError::InvalidArgument),
        };

        let shared = self.rings[id].flags.contains(RingFlags::SHARED);
        if self.in_use.test(id) && !shared {
            return Err(NavError::Busy);
        }
        if !shared {
            debug!("ringacc: giving ring {}", id);
            self.in_use.set(id);
        }
        self.rings[id].use_count += 1;

        Ok(RingHandle { index: id as u32 })
    }

    /// Claim a forward ring and its completion ring.
    ///
    /// In dual ring mode the completion ring is always the forward ring's reverse ring and
    /// `compl` is ignored.
    pub fn request_rings_pair(
        &mut self,
        fwd: RingRequest,
        compl: RingRequest,
    ) -> Result<(RingHandle, RingHandle)> {
        if self.cfg.dual_ring {
            let id = match fwd {
                RingRequest::Id(id) if id < self.cfg.num_rings => id,
                _ => return Err(NavError::InvalidArgument),
            };
            if self.in_use.test(id as usize) {
                return Err(NavError::Busy);
            }

            self.in_use.set(id as usize);
            self.rings[id as usize].use_count += 1;
            debug!("ringacc: giving ring pair {}", id);

            return Ok((
                RingHandle { index: id },
                RingHandle {
                    index: id + self.cfg.num_rings,
                },
            ));
        }

        let fwd = self.request_ring(fwd).map_err(|_| NavError::NoDevice)?;
        match self.request_ring(compl) {
            Ok(compl) => Ok((fwd, compl)),
            Err(_) => {
                self.ring_free(fwd)?;
                Err(NavError::NoDevice)
            }
        }
    }

    /// Give the ring memory and a configuration.
    pub fn ring_cfg(&mut self, h: RingHandle, cfg: &RingConfig) -> Result<()> {
        if self.cfg.dual_ring {
            return self.dual_ring_cfg(h, cfg);
        }

        let idx = self.index(h)?;
        if cfg.size & !CFG_ELCNT_MASK != 0 || !self.in_use.test(idx) {
            return Err(NavError::InvalidArgument);
        }
        if self.rings[idx].use_count != 1 {
            // shared and already set up by the first user
            return Ok(());
        }

        let ring = &mut self.rings[idx];
        ring.size = cfg.size;
        ring.elm_size = cfg.elm_size;
        ring.mode = cfg.mode;
        ring.state = RingState::default();
        if cfg.mode != RingMode::Ring {
            ring.ops = RingOps::None;
            return Err(NavError::InvalidArgument);
        }
        ring.ops = RingOps::Ring;

        if let Err(e) = self.setup_ring_mem(idx) {
            self.rings[idx].ops = RingOps::None;
            return Err(e);
        }

        let ring = &mut self.rings[idx];
        ring.flags |= RingFlags::BUSY;
        if cfg.flags.contains(RingCfgFlags::SHARED) {
            ring.flags |= RingFlags::SHARED;
        }

        Ok(())
    }

    /// Drop one claim on the ring, releasing it with the last one.
    pub fn ring_free(&mut self, h: RingHandle) -> Result<()> {
        let idx = self.index(h)?;
        let dual = self.cfg.dual_ring;
        if dual && self.rings[idx].flags.contains(RingFlags::REVERSE) {
            return Ok(());
        }
        if !self.in_use.test(idx) {
            return Err(NavError::InvalidArgument);
        }

        let ring = &mut self.rings[idx];
        ring.use_count -= 1;
        if ring.use_count != 0 {
            return Ok(());
        }

        if ring.flags.contains(RingFlags::BUSY) {
            let params =
                RingFwParams::new(ValidParams::ALL_NO_ORDER, self.cfg.sci_dev_id, ring.ring_id);
            if let Err(e) = self.fw.ring_config(&params) {
                warn!("ringacc: freeing ring {}: {}", ring.ring_id, e);
            }

            ring.release();
            if dual {
                let reverse = idx + self.cfg.num_rings as usize;
                self.rings[reverse].release();
            }
        }
        self.rings[idx].flags.remove(RingFlags::SHARED);
        self.in_use.clear(idx);

        Ok(())
    }

    pub fn ring_id(&self, h: RingHandle) -> Result<u32> {
        Ok(self.ring(h)?.ring_id)
    }

    /// Software state of the ring.
    pub fn state(&self, h: RingHandle) -> Result<RingState> {
        Ok(self.ring(h)?.state)
    }

    /// Reset the ring to empty.
    pub fn ring_reset(&mut self, h: RingHandle) -> Result<()> {
        let idx = self.busy_index(h)?;

        self.rings[idx].state = RingState::default();
        self.fw_reset(idx)
    }

    /// Reset a ring the DMA has been using.
    ///
    /// With the reset quirk the DMA keeps its own occupancy count, which is brought back to zero
    /// by ringing the doorbell until the counter wraps. `occ` is the ring's occupancy, or zero to
    /// read it from the hardware.
    pub fn ring_reset_dma(&mut self, h: RingHandle, occ: u32) -> Result<()> {
        let idx = self.busy_index(h)?;

        if !self.cfg.dma_ring_reset_quirk {
            return self.ring_reset(h);
        }

        let occ = if occ == 0 {
            self.rings[idx].read_occ()
        } else {
            occ
        };

        if occ != 0 {
            debug!("ringacc: dma reset of ring {}, occ {}", self.rings[idx].ring_id, occ);
            self.fw_reset(idx)?;

            let mode = self.rings[idx].mode;
            if mode != RingMode::Ring {
                self.fw_set_mode(idx, RingMode::Ring)?;
            }

            let mut db_ring_cnt = DMA_OCC_WRAP - occ.min(DMA_OCC_WRAP);
            while db_ring_cnt != 0 {
                let cur = db_ring_cnt.min(MAX_DB_RING_CNT);
                self.rings[idx].rt.DB.set(cur);
                db_ring_cnt -= cur;
            }

            if mode != RingMode::Ring {
                self.fw_set_mode(idx, mode)?;
            }
        }

        self.ring_reset(h)
    }

    pub fn get_size(&self, h: RingHandle) -> Result<u32> {
        let idx = self.busy_index(h)?;

        Ok(self.rings[idx].size)
    }

    /// Free elements, as of the last time the hardware was asked.
    pub fn get_free(&mut self, h: RingHandle) -> Result<u32> {
        let idx = self.busy_index(h)?;

        let ring = &mut self.rings[idx];
        if ring.state.free == 0 {
            ring.state.free = ring.size.saturating_sub(ring.read_occ());
        }

        Ok(ring.state.free)
    }

    /// Occupancy as the hardware reports it.
    pub fn get_occ(&self, h: RingHandle) -> Result<u32> {
        let idx = self.busy_index(h)?;

        Ok(self.rings[idx].read_occ())
    }

    pub fn is_full(&mut self, h: RingHandle) -> Result<bool> {
        Ok(self.get_free(h)? == 0)
    }

    /// Append `elem` to the ring. `elem` must be exactly one element long.
    pub fn push(&mut self, h: RingHandle, elem: &[u8]) -> Result<()> {
        let idx = self.busy_index(h)?;
        self.check_elem(idx, elem.len())?;

        if self.is_full(h)? {
            return Err(NavError::OutOfMemory);
        }

        let ring = &mut self.rings[idx];
        match ring.ops {
            RingOps::Ring | RingOps::DmaForward => {
                ring.push_mem(elem);
                Ok(())
            }
            _ => Err(NavError::NotSupported),
        }
    }

    /// Insert `elem` at the head of the ring. No ring mode supports this.
    pub fn push_head(&mut self, h: RingHandle, elem: &[u8]) -> Result<()> {
        let idx = self.busy_index(h)?;
        self.check_elem(idx, elem.len())?;

        if self.is_full(h)? {
            return Err(NavError::OutOfMemory);
        }

        Err(NavError::NotSupported)
    }

    /// Take the oldest element off the ring into `elem`.
    ///
    /// Once the DMA reports a completed channel teardown on a drained reverse ring, the pop
    /// acknowledges it and returns the teardown marker as the element.
    pub fn pop(&mut self, h: RingHandle, elem: &mut [u8]) -> Result<()> {
        let idx = self.busy_index(h)?;
        self.check_elem(idx, elem.len())?;

        let ring = &mut self.rings[idx];
        if ring.state.occ == 0 {
            ring.update_occ();
        }
        debug!(
            "ringacc: pop ring {}, occ {} rindex {}",
            ring.ring_id,
            ring.state.occ,
            ring.state.rindex
        );

        if ring.state.occ == 0 {
            if !ring.state.tdown_complete {
                return Err(NavError::NoData);
            }

            ring.state.tdown_complete = false;
            if ring.ops != RingOps::DmaReverse {
                return Err(NavError::TeardownComplete);
            }

            elem.fill(0);
            elem[..8].copy_from_slice(&TDCM_MARKER.to_le_bytes());
            ring.rt.DB.set(DB_TDOWN_ACK);
            return Ok(());
        }

        match ring.ops {
            RingOps::Ring => ring.pop_mem(elem),
            RingOps::DmaForward => ring.forward_pop_mem(elem),
            RingOps::DmaReverse => ring.reverse_pop_mem(elem),
            RingOps::None => return Err(NavError::NotSupported),
        }

        Ok(())
    }

    /// Take the newest element off the ring. No ring mode supports this.
    pub fn pop_tail(&mut self, h: RingHandle, elem: &mut [u8]) -> Result<()> {
        let idx = self.busy_index(h)?;
        self.check_elem(idx, elem.len())?;

        let ring = &mut self.rings[idx];
        if ring.state.occ == 0 {
            ring.update_occ();
        }
        if ring.state.occ == 0 {
            return Err(NavError::NoData);
        }

        Err(NavError::NotSupported)
    }
}

impl DeviceDriver for RingAccelerator<'_> {
    fn load_order(&self) -> DriverLoadOrder {
        DriverLoadOrder::Early
    }

    fn compatible(&self) -> &'static str {
        "ti,am654-navss-ringacc"
    }
}

//--------------------------------------------------------------------------------------------------
// Private Code
//--------------------------------------------------------------------------------------------------

impl Ring {
    fn new(rt_addr: usize, ring_id: u32) -> Self {
        Self {
            // covered by the contract of `RingAccelerator::new`
            rt: unsafe { MMIODerefWrapper::new(rt_addr) },
            mem: None,
            mem_virt: 0,
            mem_dma: DmaAddr(0),
            ops: RingOps::None,
            size: 0,
            elm_size: ElementSize::E4,
            mode: RingMode::Ring,
            flags: RingFlags::empty(),
            state: RingState::default(),
            ring_id,
            use_count: 0,
        }
    }

    fn elm_bytes(&self) -> usize {
        self.elm_size.bytes()
    }

    fn mem_len(&self) -> usize {
        self.size as usize * self.elm_bytes()
    }

    fn elm_addr(&self, idx: u32) -> usize {
        self.mem_virt + idx as usize * self.elm_bytes()
    }

    fn read_occ(&self) -> u32 {
        self.rt.OCC.read(RING_OCC::Count)
    }

    fn update_occ(&mut self) {
        let occ = self.rt.OCC.extract();

        self.state.occ = occ.read(RING_OCC::Count);
        self.state.tdown_complete = occ.is_set(RING_OCC::TdownComplete);
    }

    fn release(&mut self) {
        self.mem = None;
        self.mem_virt = 0;
        self.mem_dma = DmaAddr(0);
        self.flags.remove(RingFlags::BUSY);
        self.ops = RingOps::None;
    }

    fn invalidate_mem(&self) {
        cache::invalidate(self.mem_virt, self.mem_len());
    }

    fn read_elem(&self, idx: u32, elem: &mut [u8]) {
        self.invalidate_mem();
        unsafe {
            ptr::copy_nonoverlapping(
                self.elm_addr(idx) as *const u8,
                elem.as_mut_ptr(),
                elem.len(),
            );
        }
    }

    fn push_mem(&mut self, elem: &[u8]) {
        unsafe {
            ptr::copy_nonoverlapping(
                elem.as_ptr(),
                self.elm_addr(self.state.windex) as *mut u8,
                elem.len(),
            );
        }
        cache::flush(self.mem_virt, self.mem_len());

        self.state.windex = (self.state.windex + 1) % self.size;
        self.state.free = self.state.free.saturating_sub(1);
        self.rt.DB.set(DB_PUSH);

        debug!(
            "ringacc: push ring {}, free {} windex {}",
            self.ring_id,
            self.state.free,
            self.state.windex
        );
    }

    fn pop_mem(&mut self, elem: &mut [u8]) {
        self.read_elem(self.state.rindex, elem);

        self.state.rindex = (self.state.rindex + 1) % self.size;
        self.state.occ -= 1;
        self.rt.DB.set(DB_POP);
    }

    /// The DMA consumes the forward ring without telling where it got to, so the oldest element
    /// is found from the write index and the hardware occupancy.
    fn forward_pop_mem(&mut self, elem: &mut [u8]) {
        self.state.occ = self.read_occ();
        let idx = if self.state.windex >= self.state.occ {
            self.state.windex - self.state.occ
        } else {
            self.size - (self.state.occ - self.state.windex)
        };

        self.read_elem(idx, elem);

        self.state.occ = self.state.occ.saturating_sub(1);
        self.rt.DB.set(DB_POP);
    }

    fn reverse_pop_mem(&mut self, elem: &mut [u8]) {
        self.read_elem(self.state.rindex, elem);

        self.state.rindex = (self.state.rindex + 1) % self.size;
        self.state.occ -= 1;
        self.rt.DB.set(DB_POP & DB_ENTRY_MASK);
    }
}

impl RingAccelerator<'_> {
    fn index(&self, h: RingHandle) -> Result<usize> {
        let idx = h.index as usize;
        if idx >= self.rings.len() {
            return Err(NavError::InvalidArgument);
        }

        Ok(idx)
    }

    fn ring(&self, h: RingHandle) -> Result<&Ring> {
        Ok(&self.rings[self.index(h)?])
    }

    /// Index of a configured ring.
    fn busy_index(&self, h: RingHandle) -> Result<usize> {
        let idx = self.index(h)?;
        if !self.rings[idx].flags.contains(RingFlags::BUSY) {
            return Err(NavError::InvalidArgument);
        }

        Ok(idx)
    }

    fn check_elem(&self, idx: usize, len: usize) -> Result<()> {
        if len != self.rings[idx].elm_bytes() {
            return Err(NavError::InvalidArgument);
        }

        Ok(())
    }

    /// Allocate the ring's memory and hand it to the firmware.
    fn setup_ring_mem(&mut self, idx: usize) -> Result<()> {
        let ring = &mut self.rings[idx];
        let mem = DmaBuffer::new(ring.mem_len(), ARCH_DMA_MINALIGN)?;
        let dma = self.mapper.to_bus(mem.addr(), mem.len())?;

        let mut params =
            RingFwParams::new(ValidParams::ALL_NO_ORDER, self.cfg.sci_dev_id, ring.ring_id);
        params.addr_lo = dma.lower_32_bits();
        params.addr_hi = dma.upper_32_bits();
        params.count = ring.size;
        params.mode = ring.mode as u8;
        params.size = ring.elm_size as u8;
        if let Err(e) = self.fw.ring_config(&params) {
            warn!("ringacc: configuring ring {}: {}", ring.ring_id, e);
            return Err(e);
        }

        cache::flush(mem.addr(), mem.len());
        ring.mem_virt = mem.addr();
        ring.mem_dma = dma;
        ring.mem = Some(mem);

        Ok(())
    }

    fn dual_ring_cfg(&mut self, h: RingHandle, cfg: &RingConfig) -> Result<()> {
        if cfg.elm_size != ElementSize::E8
            || cfg.mode != RingMode::Ring
            || cfg.size & !DUAL_CFG_ELCNT_MASK != 0
        {
            return Err(NavError::InvalidArgument);
        }

        let idx = self.index(h)?;
        if self.rings[idx].flags.contains(RingFlags::REVERSE) {
            // configured along with its forward ring
            return Ok(());
        }
        if !self.in_use.test(idx) {
            return Err(NavError::InvalidArgument);
        }

        let ring = &mut self.rings[idx];
        ring.size = cfg.size;
        ring.elm_size = cfg.elm_size;
        ring.mode = cfg.mode;
        ring.state = RingState::default();
        ring.ops = RingOps::DmaForward;

        if let Err(e) = self.setup_ring_mem(idx) {
            self.rings[idx].ops = RingOps::None;
            return Err(e);
        }
        self.rings[idx].flags |= RingFlags::BUSY;

        let (mem_virt, mem_dma) = (self.rings[idx].mem_virt, self.rings[idx].mem_dma);
        let reverse = &mut self.rings[idx + self.cfg.num_rings as usize];
        reverse.size = cfg.size;
        reverse.elm_size = cfg.elm_size;
        reverse.mode = cfg.mode;
        reverse.state = RingState::default();
        reverse.ops = RingOps::DmaReverse;
        reverse.mem_virt = mem_virt;
        reverse.mem_dma = mem_dma;
        reverse.flags |= RingFlags::BUSY;

        Ok(())
    }

    fn fw_reset(&self, idx: usize) -> Result<()> {
        let ring = &self.rings[idx];
        let mut params = RingFwParams::new(ValidParams::COUNT, self.cfg.sci_dev_id, ring.ring_id);
        params.count = ring.size;

        self.fw.ring_config(&params).map_err(|e| {
            warn!("ringacc: resetting ring {}: {}", ring.ring_id, e);
            e
        })
    }

    fn fw_set_mode(&self, idx: usize, mode: RingMode) -> Result<()> {
        let ring = &self.rings[idx];
        let mut params = RingFwParams::new(ValidParams::MODE, self.cfg.sci_dev_id, ring.ring_id);
        params.mode = mode as u8;

        self.fw.ring_config(&params).map_err(|e| {
            warn!("ringacc: switching ring {} to {:?}: {}", ring.ring_id, mode, e);
            e
        })
    }
}

#[cfg(test)]
mod tests;
