// SPDX-License-Identifier: MIT
//! Queue manager: hardware FIFOs of descriptor pointers.
//!
//! A descriptor is queued by writing its bus address to the queue's push/pop port and dequeued
//! by reading the same port. Ordering is the hardware's business; software only keeps track of
//! which descriptors it currently owns.

use alloc::vec::Vec;

use tock_registers::{
    interfaces::{Readable, Writeable},
    register_bitfields, register_structs,
    registers::{ReadOnly, ReadWrite},
};

use crate::driver::{interface::DeviceDriver, DriverLoadOrder, MMIOArray, MMIODerefWrapper};
use crate::error::{NavError, Result};
use crate::mem::dma::interface::DmaMapper;
use crate::navigator::descriptor::{
    DescHandle, DescriptorPool, HostDescriptor, DESC_SIZE, DESC_SIZE_CODE,
};
use crate::{debug, info};

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

register_bitfields! {
    u32,

    /// Queue push/pop port
    QUEUE_REG_D [
        DescPtr OFFSET(4) NUMBITS(28) [],
        DescSize OFFSET(0) NUMBITS(4) []
    ],

    /// Descriptor memory region size
    DESC_REG_SIZE [
        DescSize OFFSET(16) NUMBITS(13) [],
        RegionSize OFFSET(0) NUMBITS(4) []
    ]
}

register_structs! {
    #[allow(non_snake_case)]
    pub QueueRegs {
        (0x00 => REG_A: ReadOnly<u32>),
        (0x04 => REG_B: ReadOnly<u32>),
        (0x08 => REG_C: ReadWrite<u32>),
        (0x0c => REG_D: ReadWrite<u32, QUEUE_REG_D::Register>),
        (0x10 => @END),
    }
}

register_structs! {
    #[allow(non_snake_case)]
    pub ManagerRegs {
        (0x00 => REVISION: ReadOnly<u32>),
        (0x04 => _reserved0),
        (0x08 => DIVERT: ReadWrite<u32>),
        (0x0c => LINK_RAM_BASE0: ReadWrite<u32>),
        (0x10 => LINK_RAM_SIZE0: ReadWrite<u32>),
        (0x14 => LINK_RAM_BASE1: ReadWrite<u32>),
        (0x18 => LINK_RAM_SIZE1: ReadWrite<u32>),
        (0x1c => LINK_RAM_BASE2: ReadWrite<u32>),
        (0x20 => _reserved1),
        (0x28 => @END),
    }
}

register_structs! {
    #[allow(non_snake_case)]
    pub DescRegionRegs {
        (0x00 => BASE_ADDR: ReadWrite<u32>),
        (0x04 => START_IDX: ReadWrite<u32>),
        (0x08 => DESC_REG_SIZE: ReadWrite<u32, DESC_REG_SIZE::Register>),
        (0x0c => _reserved0),
        (0x10 => @END),
    }
}

const QUEUE_REGS_STEP: usize = 0x10;
const DESC_REGION_STEP: usize = 0x10;

/// Entries of the linking RAM per descriptor.
const LINK_RAM_ENTRY_BYTES: u32 = 8;

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

pub mod interface {
    /// Access to the queue manager hardware.
    ///
    /// All methods take `&self`: every operation is a single register access and the hardware
    /// serialises them.
    pub trait QueueHw {
        /// Point linking RAM region 0 at `base`, `size` entries minus one. Regions 1 and 2 are
        /// left unused.
        fn configure_link_ram(&self, base: u32, size: u32);

        /// Describe descriptor memory region `region`.
        fn configure_region(&self, region: u32, base: u32, start_idx: u32, desc_reg_size: u32);

        /// Forget the linking RAM and the first `regions` descriptor regions.
        fn clear_config(&self, regions: u32);

        /// Queue `word` (descriptor bus address | size code) on `qnum`.
        fn push(&self, qnum: u32, word: u32);

        /// Dequeue the head of `qnum`. Zero when the queue is empty.
        fn pop(&self, qnum: u32) -> u32;

        /// Number of descriptors sitting in `qnum`.
        fn entry_count(&self, qnum: u32) -> u32;
    }
}

use interface::QueueHw;

#[derive(Clone, Debug)]
pub struct QmConfig {
    /// Queue management region: one push/pop port per queue.
    pub queue_base: usize,
    pub mngr_cfg_base: usize,
    pub desc_setup_base: usize,
    /// Internal linking RAM, as a queue manager address.
    pub link_ram: u32,
    pub region_num: u32,
    pub num_queues: u32,
    /// Queue holding the free descriptors.
    pub qpool_num: u32,
    pub desc_num: u32,
}

/// Queue manager registers reached through MMIO.
pub struct MmioQueueHw {
    queues: MMIOArray<QueueRegs>,
    mngr: MMIODerefWrapper<ManagerRegs>,
    regions: MMIOArray<DescRegionRegs>,
}

pub struct QueueManager<H> {
    hw: H,
    cfg: QmConfig,
    pool: DescriptorPool,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

/// Region size code for `num_descr` descriptors: the smallest j with `num_descr <= 32 << j`,
/// saturating at 15.
pub fn num_of_desc_to_reg(num_descr: u32) -> u32 {
    let mut num: u64 = 32;
    for j in 0..15 {
        if u64::from(num_descr) <= num {
            return j;
        }
        num *= 2;
    }

    15
}

/// Value of a region's descriptor size register.
pub fn desc_reg_size(desc_size_code: u32, region_size_code: u32) -> u32 {
    (desc_size_code << 16) | region_size_code
}

impl QmConfig {
    pub fn validate(&self) -> Result<()> {
        if self.qpool_num >= self.num_queues {
            return Err(NavError::InvalidConfig("free pool queue outside the queue range"));
        }
        if self.region_num == 0 {
            return Err(NavError::InvalidConfig("no descriptor memory regions"));
        }
        if self.desc_num == 0 || self.desc_num.checked_mul(LINK_RAM_ENTRY_BYTES).is_none() {
            return Err(NavError::InvalidConfig("descriptor count out of range"));
        }

        Ok(())
    }
}

impl MmioQueueHw {
    /// Create an instance.
    ///
    /// # Safety
    ///
    /// - The register bases in `cfg` must be the queue manager's MMIO regions, mapped.
    pub unsafe fn new(cfg: &QmConfig) -> Self {
        Self {
            queues: MMIOArray::new(cfg.queue_base, QUEUE_REGS_STEP, cfg.num_queues as usize),
            mngr: MMIODerefWrapper::new(cfg.mngr_cfg_base),
            regions: MMIOArray::new(cfg.desc_setup_base, DESC_REGION_STEP, cfg.region_num as usize),
        }
    }
}

impl QueueHw for MmioQueueHw {
    fn configure_link_ram(&self, base: u32, size: u32) {
        self.mngr.LINK_RAM_BASE0.set(base);
        self.mngr.LINK_RAM_SIZE0.set(size);
        self.mngr.LINK_RAM_BASE1.set(0);
        self.mngr.LINK_RAM_SIZE1.set(0);
        self.mngr.LINK_RAM_BASE2.set(0);
    }

    fn configure_region(&self, region: u32, base: u32, start_idx: u32, desc_reg_size: u32) {
        if let Some(regs) = self.regions.get(region as usize) {
            regs.BASE_ADDR.set(base);
            regs.START_IDX.set(start_idx);
            regs.DESC_REG_SIZE.set(desc_reg_size);
        }
    }

    fn clear_config(&self, regions: u32) {
        self.configure_link_ram(0, 0);
        for regs in self.regions.iter().take(regions as usize) {
            regs.BASE_ADDR.set(0);
            regs.START_IDX.set(0);
            regs.DESC_REG_SIZE.set(0);
        }
    }

    fn push(&self, qnum: u32, word: u32) {
        if let Some(q) = self.queues.get(qnum as usize) {
            q.REG_D.set(word);
        }
    }

    fn pop(&self, qnum: u32) -> u32 {
        self.queues
            .get(qnum as usize)
            .map_or(0, |q| q.REG_D.read(QUEUE_REG_D::DescPtr) << 4)
    }

    fn entry_count(&self, qnum: u32) -> u32 {
        self.queues.get(qnum as usize).map_or(0, |q| q.REG_A.get())
    }
}

impl<H: QueueHw> QueueManager<H> {
    /// Bring up the queue manager: program the linking RAM and descriptor region 0, then queue
    /// every descriptor of a fresh pool on the free pool queue.
    pub fn init(hw: H, cfg: QmConfig, mapper: &dyn DmaMapper) -> Result<Self> {
        cfg.validate()?;

        let mut pool = DescriptorPool::new(cfg.desc_num)?;
        let bus_base = mapper.to_bus(pool.cpu_base(), pool.byte_len())?.to_u32()?;
        pool.set_bus_base(bus_base)?;

        hw.configure_link_ram(cfg.link_ram, cfg.desc_num * LINK_RAM_ENTRY_BYTES - 1);
        hw.configure_region(
            0,
            bus_base,
            0,
            desc_reg_size(DESC_SIZE_CODE, num_of_desc_to_reg(cfg.desc_num)),
        );

        pool.reset();

        let mut qm = Self { hw, cfg, pool };
        let handles: Vec<DescHandle> = qm.pool.claim_all().collect();
        let qpool = qm.cfg.qpool_num;
        for hd in handles {
            qm.push(hd, qpool)?;
        }

        info!(
            "qm: {} descriptors of {} bytes at {:#010x} on free queue {}",
            qm.cfg.desc_num,
            DESC_SIZE,
            bus_base,
            qpool
        );

        Ok(qm)
    }

    /// Drain the free pool and unprogram the queue manager, handing the hardware back.
    pub fn close(mut self) -> H {
        let qpool = self.cfg.qpool_num;
        if let Err(e) = self.queue_close(qpool) {
            crate::warn!("qm: draining free queue {}: {}", qpool, e);
        }
        self.hw.clear_config(self.cfg.region_num);

        self.hw
    }

    pub fn config(&self) -> &QmConfig {
        &self.cfg
    }

    pub fn hw(&self) -> &H {
        &self.hw
    }

    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// Queue the descriptor on `qnum`, giving it up to the hardware.
    pub fn push(&mut self, hd: DescHandle, qnum: u32) -> Result<()> {
        self.check_queue(qnum)?;

        self.pool.flush(&hd);
        let word = self.pool.bus_addr(&hd) | DESC_SIZE_CODE;
        debug!("qm: push {:#010x} -> q{}", word, qnum);
        self.hw.push(qnum, word);

        Ok(())
    }

    /// Attach a buffer to the descriptor, then queue it on `qnum`.
    pub fn buff_push(
        &mut self,
        hd: DescHandle,
        qnum: u32,
        buff_ptr: u32,
        buff_len: u32,
    ) -> Result<()> {
        self.check_queue(qnum)?;

        self.pool.update(&hd, |d| {
            d.orig_buff_len = buff_len;
            d.buff_len = buff_len;
            d.orig_buff_ptr = buff_ptr;
            d.buff_ptr = buff_ptr;
        });

        self.push(hd, qnum)
    }

    /// Take the head descriptor off `qnum`, if there is one.
    pub fn pop(&mut self, qnum: u32) -> Result<Option<DescHandle>> {
        self.check_queue(qnum)?;

        let word = self.hw.pop(qnum);
        if word & !0xf == 0 {
            return Ok(None);
        }

        debug!("qm: pop {:#010x} <- q{}", word, qnum);
        self.pool.handle_for(word).map(Some)
    }

    pub fn pop_from_free_pool(&mut self) -> Result<Option<DescHandle>> {
        let qpool = self.cfg.qpool_num;
        self.pop(qpool)
    }

    /// Empty `qnum`. The drained descriptors stay out of circulation until the next init.
    ///
    /// Returns how many descriptors were drained. Words that are not pool descriptors are
    /// discarded; the queue is still emptied and the first such word is returned as the error.
    pub fn queue_close(&mut self, qnum: u32) -> Result<u32> {
        self.check_queue(qnum)?;

        let mut drained = 0;
        let mut foreign = None;
        loop {
            match self.pop(qnum) {
                Ok(Some(hd)) => {
                    drop(hd);
                    drained += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    foreign.get_or_insert(e);
                }
            }
        }

        match foreign {
            Some(e) => Err(e),
            None => Ok(drained),
        }
    }

    pub fn entry_count(&self, qnum: u32) -> Result<u32> {
        self.check_queue(qnum)?;

        Ok(self.hw.entry_count(qnum))
    }

    /// Snapshot of the descriptor behind `hd`.
    pub fn descriptor(&self, hd: &DescHandle) -> HostDescriptor {
        self.pool.read(hd)
    }

    pub fn update<R>(&mut self, hd: &DescHandle, f: impl FnOnce(&mut HostDescriptor) -> R) -> R {
        self.pool.update(hd, f)
    }

    fn check_queue(&self, qnum: u32) -> Result<()> {
        if qnum >= self.cfg.num_queues {
            return Err(NavError::InvalidQueue {
                qnum,
                num_queues: self.cfg.num_queues,
            });
        }

        Ok(())
    }
}

impl<H> DeviceDriver for QueueManager<H> {
    fn load_order(&self) -> DriverLoadOrder {
        DriverLoadOrder::Early
    }

    fn compatible(&self) -> &'static str {
        "ti,keystone-navigator-qmss"
    }
}
