// SPDX-License-Identifier: MIT
//! Software stand-ins for the navigator hardware, for running the drivers without a SoC.
//!
//! [`FakeMmio`] is plain memory posing as a register block, [`SoftQueueHw`] keeps queues in
//! software, [`SimBus`] hands out 32-bit bus addresses for host memory and [`SoftSwitch`] plays the
//! network switch in loopback.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::ptr;

use crate::error::{NavError, Result};
use crate::mem::align_up;
use crate::mem::dma::{interface::DmaMapper, DmaAddr};
use crate::navigator::descriptor::DESC_PKT_LEN_MASK;
use crate::navigator::qm::interface::QueueHw;
use crate::sync::interface::Mutex;
use crate::sync::NullLock;

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// Zeroed memory standing in for a register block. Reads return what was last written.
pub struct FakeMmio {
    words: Vec<UnsafeCell<u64>>,
}

/// Queue manager kept in software.
pub struct SoftQueueHw {
    inner: NullLock<SoftQmState>,
}

/// Hands out bus addresses below 4 GiB for host memory, whatever its CPU address.
pub struct SimBus {
    inner: NullLock<Vec<Mapping>>,
}

/// Loops transmitted packets back into the receive path, the way the switch does in loopback mode.
pub struct SoftSwitch {
    tx_q: u32,
    rx_free_q: u32,
    rx_rcv_q: u32,
}

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

struct SoftQmState {
    queues: Vec<VecDeque<u32>>,
    link_ram: (u32, u32),
    regions: BTreeMap<u32, (u32, u32, u32)>,
}

#[derive(Clone, Copy)]
struct Mapping {
    cpu: usize,
    len: usize,
    bus: u32,
}

const SIM_BUS_BASE: u32 = 0x8000_0000;
const SIM_BUS_PAGE: usize = 0x1000;

// Host descriptor word offsets.
const HD_DESC_INFO: u32 = 0x00;
const HD_PACKET_INFO: u32 = 0x08;
const HD_BUFF_LEN: u32 = 0x0c;
const HD_BUFF_PTR: u32 = 0x10;

/// Return queue field of `packet_info`.
const PKT_INFO_RETURN_QUEUE: u32 = 0x3fff;

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl FakeMmio {
    pub fn new(bytes: usize) -> Self {
        let words = (0..bytes.div_ceil(8)).map(|_| UnsafeCell::new(0)).collect();

        Self { words }
    }

    pub fn addr(&self) -> usize {
        self.words.as_ptr() as usize
    }

    pub fn len(&self) -> usize {
        self.words.len() * 8
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn read_u32(&self, offset: usize) -> u32 {
        assert!(offset % 4 == 0 && offset + 4 <= self.len());
        unsafe { ptr::read_volatile((self.addr() + offset) as *const u32) }
    }

    pub fn write_u32(&self, offset: usize, value: u32) {
        assert!(offset % 4 == 0 && offset + 4 <= self.len());
        unsafe { ptr::write_volatile((self.addr() + offset) as *mut u32, value) }
    }
}

impl SoftQueueHw {
    pub fn new(num_queues: u32) -> Self {
        Self {
            inner: NullLock::new(SoftQmState {
                queues: (0..num_queues).map(|_| VecDeque::new()).collect(),
                link_ram: (0, 0),
                regions: BTreeMap::new(),
            }),
        }
    }

    /// Linking RAM base and size as last configured.
    pub fn link_ram(&self) -> (u32, u32) {
        self.inner.lock(|s| s.link_ram)
    }

    /// Base, start index and size word of descriptor region `region`.
    pub fn region(&self, region: u32) -> (u32, u32, u32) {
        self.inner
            .lock(|s| s.regions.get(&region).copied().unwrap_or_default())
    }

    /// Queue a raw word, bypassing the driver.
    pub fn push_raw(&self, qnum: u32, word: u32) {
        self.push(qnum, word);
    }

    /// Dequeue a raw word, size code included. Zero when empty.
    pub fn pop_raw(&self, qnum: u32) -> u32 {
        self.inner.lock(|s| {
            s.queues
                .get_mut(qnum as usize)
                .and_then(VecDeque::pop_front)
                .unwrap_or(0)
        })
    }
}

impl QueueHw for SoftQueueHw {
    fn configure_link_ram(&self, base: u32, size: u32) {
        self.inner.lock(|s| s.link_ram = (base, size));
    }

    fn configure_region(&self, region: u32, base: u32, start_idx: u32, desc_reg_size: u32) {
        self.inner
            .lock(|s| s.regions.insert(region, (base, start_idx, desc_reg_size)));
    }

    fn clear_config(&self, regions: u32) {
        self.inner.lock(|s| {
            s.link_ram = (0, 0);
            s.regions.retain(|region, _| *region >= regions);
        });
    }

    fn push(&self, qnum: u32, word: u32) {
        self.inner.lock(|s| {
            if let Some(q) = s.queues.get_mut(qnum as usize) {
                q.push_back(word);
            }
        });
    }

    fn pop(&self, qnum: u32) -> u32 {
        self.pop_raw(qnum) & !0xf
    }

    fn entry_count(&self, qnum: u32) -> u32 {
        self.inner
            .lock(|s| s.queues.get(qnum as usize).map_or(0, |q| q.len() as u32))
    }
}

impl SimBus {
    pub fn new() -> Self {
        Self {
            inner: NullLock::new(Vec::new()),
        }
    }

    /// CPU address behind `[bus, bus + len)`, if a single mapping covers it.
    pub fn cpu_addr(&self, bus: u32, len: usize) -> Option<usize> {
        self.inner.lock(|maps| {
            maps.iter().find_map(|m| {
                let offset = bus.checked_sub(m.bus)? as usize;
                (offset + len <= m.len).then_some(m.cpu + offset)
            })
        })
    }

    /// Read bytes through their bus address.
    ///
    /// # Safety
    ///
    /// - The memory mapped at `bus` must still be alive.
    pub unsafe fn read_bytes(&self, bus: u32, len: usize) -> Vec<u8> {
        match self.cpu_addr(bus, len) {
            Some(cpu) => core::slice::from_raw_parts(cpu as *const u8, len).to_vec(),
            None => panic!("sim bus: {:#x}+{} not mapped", bus, len),
        }
    }

    /// # Safety
    ///
    /// - The memory mapped at `bus` must still be alive and not borrowed.
    pub unsafe fn write_bytes(&self, bus: u32, data: &[u8]) {
        match self.cpu_addr(bus, data.len()) {
            Some(cpu) => ptr::copy_nonoverlapping(data.as_ptr(), cpu as *mut u8, data.len()),
            None => panic!("sim bus: {:#x}+{} not mapped", bus, data.len()),
        }
    }

    /// # Safety
    ///
    /// - The memory mapped at `bus` must still be alive.
    pub unsafe fn read_u32(&self, bus: u32) -> u32 {
        match self.cpu_addr(bus, 4) {
            Some(cpu) => ptr::read_volatile(cpu as *const u32),
            None => panic!("sim bus: {:#x} not mapped", bus),
        }
    }

    /// # Safety
    ///
    /// - The memory mapped at `bus` must still be alive and not borrowed.
    pub unsafe fn write_u32(&self, bus: u32, value: u32) {
        match self.cpu_addr(bus, 4) {
            Some(cpu) => ptr::write_volatile(cpu as *mut u32, value),
            None => panic!("sim bus: {:#x} not mapped", bus),
        }
    }
}

impl Default for SimBus {
    fn default() -> Self {
        Self::new()
    }
}

impl DmaMapper for SimBus {
    fn to_bus(&self, cpu_addr: usize, len: usize) -> Result<DmaAddr> {
        self.inner.lock(|maps| {
            if let Some(m) = maps
                .iter()
                .find(|m| cpu_addr >= m.cpu && cpu_addr + len <= m.cpu + m.len)
            {
                return Ok(DmaAddr((m.bus as usize + cpu_addr - m.cpu) as u64));
            }

            // keep the offset within the page so alignment carries over
            let next = maps
                .last()
                .map_or(SIM_BUS_BASE as usize, |m| m.bus as usize + m.len);
            let bus = align_up(next, SIM_BUS_PAGE) + cpu_addr % SIM_BUS_PAGE;
            let bus = u32::try_from(bus)
                .ok()
                .filter(|bus| bus.checked_add(len as u32).is_some() && len <= u32::MAX as usize)
                .ok_or(NavError::Unmapped {
                    addr: cpu_addr,
                    len,
                })?;

            maps.push(Mapping {
                cpu: cpu_addr,
                len,
                bus,
            });
            Ok(DmaAddr(bus as u64))
        })
    }
}

impl SoftSwitch {
    pub fn new(tx_q: u32, rx_free_q: u32, rx_rcv_q: u32) -> Self {
        Self {
            tx_q,
            rx_free_q,
            rx_rcv_q,
        }
    }

    /// Move one packet from the transmit queue to the receive queue.
    ///
    /// The transmit descriptor goes back to the queue named in its `packet_info`. Returns the
    /// delivered length, or `None` when there was nothing to send or nowhere to put it.
    pub fn forward(&self, hw: &SoftQueueHw, bus: &SimBus) -> Option<u32> {
        let tx_word = hw.pop_raw(self.tx_q);
        let tx_desc = tx_word & !0xf;
        if tx_desc == 0 {
            return None;
        }

        let delivered = unsafe {
            let len = bus.read_u32(tx_desc + HD_DESC_INFO) & DESC_PKT_LEN_MASK;
            let data = bus.read_bytes(bus.read_u32(tx_desc + HD_BUFF_PTR), len as usize);

            let rx_word = hw.pop_raw(self.rx_free_q);
            let rx_desc = rx_word & !0xf;
            if rx_desc == 0 {
                None
            } else if len > bus.read_u32(rx_desc + HD_BUFF_LEN) {
                hw.push_raw(self.rx_free_q, rx_word);
                None
            } else {
                bus.write_bytes(bus.read_u32(rx_desc + HD_BUFF_PTR), &data);
                let info = bus.read_u32(rx_desc + HD_DESC_INFO);
                bus.write_u32(rx_desc + HD_DESC_INFO, (info & !DESC_PKT_LEN_MASK) | len);
                bus.write_u32(rx_desc + HD_BUFF_LEN, len);
                hw.push_raw(self.rx_rcv_q, rx_word);
                Some(len)
            }
        };

        let return_q = unsafe { bus.read_u32(tx_desc + HD_PACKET_INFO) } & PKT_INFO_RETURN_QUEUE;
        hw.push_raw(return_q, tx_word);

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_mmio_reads_back_writes() {
        let mmio = FakeMmio::new(0x10);
        assert_eq!(mmio.read_u32(8), 0);

        mmio.write_u32(8, 0xdead_beef);
        assert_eq!(mmio.read_u32(8), 0xdead_beef);
        assert_eq!(mmio.addr() % 8, 0);
    }

    #[test]
    fn soft_queues_are_fifo() {
        let hw = SoftQueueHw::new(4);
        hw.push(1, 0x100 | 7);
        hw.push(1, 0x200 | 7);

        assert_eq!(hw.entry_count(1), 2);
        assert_eq!(hw.pop(1), 0x100);
        assert_eq!(hw.pop_raw(1), 0x207);
        assert_eq!(hw.pop(1), 0);
        assert_eq!(hw.pop(9), 0);
    }

    #[test]
    fn sim_bus_keeps_alignment_and_reuses_mappings() {
        let bus = SimBus::new();
        let a = [0u8; 300];
        let b = [0u8; 16];

        let ba = bus.to_bus(a.as_ptr() as usize, a.len()).unwrap();
        let bb = bus.to_bus(b.as_ptr() as usize, b.len()).unwrap();
        assert!(ba.0 >= SIM_BUS_BASE as u64);
        assert_eq!(ba.0 as usize % SIM_BUS_PAGE, a.as_ptr() as usize % SIM_BUS_PAGE);
        assert!(bb.0 >= ba.0 + 300);

        let inner = bus.to_bus(a.as_ptr() as usize + 10, 20).unwrap();
        assert_eq!(inner.0, ba.0 + 10);
        assert_eq!(bus.cpu_addr(ba.0 as u32 + 10, 20), Some(a.as_ptr() as usize + 10));
        assert_eq!(bus.cpu_addr(ba.0 as u32 + 290, 20), None);
    }
}
