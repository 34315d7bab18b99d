// SPDX-License-Identifier: MIT
//! Packet DMA: moves packets between memory and the network switch, driven by descriptors taken
//! from queue manager queues.

use core::mem;
use core::slice;
use core::time::Duration;

use tock_registers::{
    interfaces::{ReadWriteable, Readable, Writeable},
    register_bitfields, register_structs,
    registers::{ReadOnly, ReadWrite},
};

use crate::driver::{interface::DeviceDriver, DriverLoadOrder, MMIOArray, MMIODerefWrapper};
use crate::error::{NavError, Result};
use crate::mem::cache;
use crate::mem::dma::interface::DmaMapper;
use crate::mem::dma::DmaBuffer;
use crate::navigator::descriptor::{DescHandle, DESC_PKT_LEN_MASK};
use crate::navigator::qm::interface::QueueHw;
use crate::navigator::qm::{QmConfig, QueueManager};
use crate::time::time_manager;
use crate::{debug, info, warn};

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

register_bitfields! {
    u32,

    /// Channel configuration register A
    CHAN_CFG_A [
        Enable OFFSET(31) NUMBITS(1) [],
        Teardown OFFSET(30) NUMBITS(1) []
    ],

    /// RX flow configuration register A
    RX_FLOW_A [
        EInfoPresent OFFSET(30) NUMBITS(1) [],
        PsInfoPresent OFFSET(29) NUMBITS(1) [],
        ErrorHandling OFFSET(28) NUMBITS(1) [],
        DescType OFFSET(26) NUMBITS(2) [
            Host = 0
        ],
        PsLocation OFFSET(25) NUMBITS(1) [],
        SopOffset OFFSET(16) NUMBITS(9) [],
        DestQmgr OFFSET(12) NUMBITS(4) [],
        DestQnum OFFSET(0) NUMBITS(12) []
    ],

    /// RX flow free descriptor queue selection
    RX_FLOW_FDQ [
        Fd0Qmgr OFFSET(28) NUMBITS(4) [],
        Fd0Qnum OFFSET(16) NUMBITS(12) [],
        Fd1Qmgr OFFSET(12) NUMBITS(4) [],
        Fd1Qnum OFFSET(0) NUMBITS(12) []
    ]
}

register_structs! {
    #[allow(non_snake_case)]
    pub GlobalRegs {
        (0x00 => REVISION: ReadOnly<u32>),
        (0x04 => PERF_CONTROL: ReadWrite<u32>),
        (0x08 => EMULATION_CONTROL: ReadWrite<u32>),
        (0x0c => PRIORITY_CONTROL: ReadWrite<u32>),
        (0x10 => QM_BASE_ADDR: [ReadWrite<u32>; 4]),
        (0x20 => @END),
    }
}

register_structs! {
    #[allow(non_snake_case)]
    pub TxChanRegs {
        (0x00 => CFG_A: ReadWrite<u32, CHAN_CFG_A::Register>),
        (0x04 => CFG_B: ReadWrite<u32>),
        (0x08 => _reserved0),
        (0x20 => @END),
    }
}

register_structs! {
    #[allow(non_snake_case)]
    pub RxChanRegs {
        (0x00 => CFG_A: ReadWrite<u32, CHAN_CFG_A::Register>),
        (0x04 => _reserved0),
        (0x20 => @END),
    }
}

register_structs! {
    #[allow(non_snake_case)]
    pub RxFlowRegs {
        (0x00 => CONTROL: ReadWrite<u32, RX_FLOW_A::Register>),
        (0x04 => TAGS: ReadWrite<u32>),
        (0x08 => TAG_SEL: ReadWrite<u32>),
        (0x0c => FDQ_SEL: [ReadWrite<u32, RX_FLOW_FDQ::Register>; 2]),
        (0x14 => THRESH: [ReadWrite<u32>; 3]),
        (0x20 => @END),
    }
}

const CHAN_REGS_STEP: usize = 0x20;
const RX_FLOW_REGS_STEP: usize = 0x20;

/// Teardown is polled this many times, `TDOWN_POLL_INTERVAL` apart.
const TDOWN_TIMEOUT_COUNT: u32 = 100;
const TDOWN_POLL_INTERVAL: Duration = Duration::from_micros(100);

struct RxRegion {
    buffer: DmaBuffer,
    bus_base: u32,
}

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct PktDmaConfig {
    pub global_base: usize,
    pub tx_ch_base: usize,
    pub tx_ch_num: u32,
    pub rx_ch_base: usize,
    pub rx_ch_num: u32,
    pub rx_flow_base: usize,
    pub rx_flow_num: u32,
    /// Empty receive buffers wait here for the DMA to fill them.
    pub rx_free_q: u32,
    /// Filled receive buffers arrive here.
    pub rx_rcv_q: u32,
    /// Packets queued here are transmitted.
    pub tx_snd_q: u32,
    /// Queue manager base written to the engine, on SoCs that need it.
    pub qm_base_addr: Option<u32>,
}

/// Receive buffer memory handed to the engine at init.
pub struct RxBuffers {
    /// Backing memory, at least `num_buffs * buff_len` bytes.
    pub buffer: DmaBuffer,
    pub num_buffs: u32,
    pub buff_len: u32,
    /// RX flow steering received packets to the receive queue.
    pub rx_flow: u32,
}

/// A received packet. Owns its descriptor until it is released back to the engine.
#[must_use = "received packets must be released to keep the receive queue stocked"]
#[derive(Debug)]
pub struct RxPacket {
    desc: DescHandle,
    buff_ptr: u32,
    len: u32,
}

pub struct PacketDma {
    cfg: PktDmaConfig,
    global: MMIODerefWrapper<GlobalRegs>,
    tx_ch: MMIOArray<TxChanRegs>,
    rx_ch: MMIOArray<RxChanRegs>,
    rx_flows: MMIOArray<RxFlowRegs>,
    rx: Option<RxRegion>,
    rx_flow: u32,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl RxPacket {
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn descriptor(&self) -> &DescHandle {
        &self.desc
    }
}

impl PktDmaConfig {
    /// Check the engine's queues against the queue manager they live on.
    pub fn validate(&self, qm: &QmConfig) -> Result<()> {
        for q in [self.rx_free_q, self.rx_rcv_q, self.tx_snd_q] {
            if q >= qm.num_queues {
                return Err(NavError::InvalidConfig("packet DMA queue outside the queue range"));
            }
            if q == qm.qpool_num {
                return Err(NavError::InvalidConfig("packet DMA queue is the free pool"));
            }
        }

        Ok(())
    }
}

impl PacketDma {
    /// Create an instance.
    ///
    /// # Safety
    ///
    /// - The register bases in `cfg` must be the engine's MMIO regions, mapped.
    pub unsafe fn new(cfg: PktDmaConfig) -> Self {
        Self {
            global: MMIODerefWrapper::new(cfg.global_base),
            tx_ch: MMIOArray::new(cfg.tx_ch_base, CHAN_REGS_STEP, cfg.tx_ch_num as usize),
            rx_ch: MMIOArray::new(cfg.rx_ch_base, CHAN_REGS_STEP, cfg.rx_ch_num as usize),
            rx_flows: MMIOArray::new(cfg.rx_flow_base, RX_FLOW_REGS_STEP, cfg.rx_flow_num as usize),
            rx: None,
            rx_flow: 0,
            cfg,
        }
    }

    pub fn config(&self) -> &PktDmaConfig {
        &self.cfg
    }

    pub fn rx_flow(&self) -> u32 {
        self.rx_flow
    }

    /// Stock the receive free queue from `rx`, program the receive flow and enable every channel.
    ///
    /// On failure no descriptor is left on the receive free queue.
    pub fn init<H: QueueHw>(
        &mut self,
        qm: &mut QueueManager<H>,
        rx: RxBuffers,
        mapper: &dyn DmaMapper,
    ) -> Result<()> {
        self.cfg.validate(qm.config())?;
        if rx.num_buffs == 0 || rx.buff_len == 0 {
            return Err(NavError::InvalidConfig("no receive buffers"));
        }
        let used = (rx.num_buffs as usize)
            .checked_mul(rx.buff_len as usize)
            .filter(|used| *used <= rx.buffer.len())
            .ok_or(NavError::InvalidConfig("receive buffers larger than their memory"))?;
        let flow = self
            .rx_flows
            .get(rx.rx_flow as usize)
            .ok_or(NavError::InvalidConfig("receive flow out of range"))?;

        let qpool = qm.config().qpool_num;
        if qm.entry_count(qpool)? < rx.num_buffs {
            return Err(NavError::PoolExhausted);
        }

        self.rx_disable()?;

        let bus_base = mapper.to_bus(rx.buffer.addr(), used)?.to_u32()?;
        cache::flush(rx.buffer.addr(), used);

        if let Err(e) = self.stock_rx_free(qm, &rx, bus_base) {
            if let Err(e) = recycle(qm, self.cfg.rx_free_q) {
                warn!("pktdma: emptying q{}: {}", self.cfg.rx_free_q, e);
            }
            return Err(e);
        }

        flow.CONTROL.write(
            RX_FLOW_A::EInfoPresent::SET
                + RX_FLOW_A::PsInfoPresent::SET
                + RX_FLOW_A::DescType::Host
                + RX_FLOW_A::DestQmgr.val(queue_mgr(self.cfg.rx_rcv_q))
                + RX_FLOW_A::DestQnum.val(self.cfg.rx_rcv_q),
        );
        flow.TAGS.set(0);
        flow.TAG_SEL.set(0);
        let fdq = RX_FLOW_FDQ::Fd0Qmgr.val(queue_mgr(self.cfg.rx_free_q))
            + RX_FLOW_FDQ::Fd0Qnum.val(self.cfg.rx_free_q)
            + RX_FLOW_FDQ::Fd1Qmgr.val(queue_mgr(self.cfg.rx_free_q))
            + RX_FLOW_FDQ::Fd1Qnum.val(self.cfg.rx_free_q);
        flow.FDQ_SEL[0].write(fdq);
        flow.FDQ_SEL[1].write(fdq);
        for thresh in flow.THRESH.iter() {
            thresh.set(0);
        }

        for ch in self.rx_ch.iter() {
            ch.CFG_A.write(CHAN_CFG_A::Enable::SET);
        }

        // no loopback in the transmit direction
        self.global.EMULATION_CONTROL.set(0);
        if let Some(qm_base) = self.cfg.qm_base_addr {
            self.global.QM_BASE_ADDR[0].set(qm_base);
        }

        for ch in self.tx_ch.iter() {
            ch.CFG_B.set(0);
            ch.CFG_A.write(CHAN_CFG_A::Enable::SET);
        }

        self.rx_flow = rx.rx_flow;
        self.rx = Some(RxRegion {
            buffer: rx.buffer,
            bus_base,
        });

        info!(
            "pktdma: {} rx buffers of {} bytes on flow {}, rx q{} -> q{}, tx q{}",
            rx.num_buffs,
            rx.buff_len,
            rx.rx_flow,
            self.cfg.rx_free_q,
            self.cfg.rx_rcv_q,
            self.cfg.tx_snd_q
        );

        Ok(())
    }

    /// Tear down both directions and drain the engine's queues.
    ///
    /// Every step runs even if a channel refuses to tear down; the first failure is returned.
    pub fn close<H: QueueHw>(&mut self, qm: &mut QueueManager<H>) -> Result<()> {
        let tx = self.tx_disable();
        let rx = self.rx_disable();

        if let Some(region) = self.rx.take() {
            if rx.is_err() {
                // the engine may still be writing into it
                warn!(
                    "pktdma: rx did not stop, abandoning {} bytes of rx memory",
                    region.buffer.len()
                );
                mem::forget(region);
            }
        }

        let mut drain = Ok(());
        for q in [self.cfg.rx_free_q, self.cfg.rx_rcv_q, self.cfg.tx_snd_q] {
            match qm.queue_close(q) {
                Ok(drained) => debug!("pktdma: drained {} from q{}", drained, q),
                Err(e) => {
                    warn!("pktdma: draining q{}: {}", q, e);
                    drain = drain.and(Err(e));
                }
            }
        }

        tx.and(rx).and(drain)
    }

    /// Queue `pkt` for transmission, with `swinfo2` in the descriptor's third software word.
    ///
    /// `pkt` must stay untouched until the engine returns the descriptor to the free pool.
    pub fn send<H: QueueHw>(
        &mut self,
        qm: &mut QueueManager<H>,
        pkt: &[u8],
        swinfo2: u32,
        mapper: &dyn DmaMapper,
    ) -> Result<()> {
        self.cfg.validate(qm.config())?;
        let len = u32::try_from(pkt.len())
            .ok()
            .filter(|len| *len != 0 && *len <= DESC_PKT_LEN_MASK)
            .ok_or(NavError::InvalidArgument)?;
        let buff_ptr = mapper.to_bus(pkt.as_ptr() as usize, pkt.len())?.to_u32()?;
        cache::flush(pkt.as_ptr() as usize, pkt.len());

        let hd = qm.pop_from_free_pool()?.ok_or(NavError::PoolExhausted)?;
        let return_q = qm.config().qpool_num;
        qm.update(&hd, |d| {
            d.desc_info = len;
            d.swinfo[2] = swinfo2;
            d.packet_info = return_q;
        });

        qm.buff_push(hd, self.cfg.tx_snd_q, buff_ptr, len)
    }

    /// Take the next received packet, if any.
    pub fn recv<H: QueueHw>(&mut self, qm: &mut QueueManager<H>) -> Result<Option<RxPacket>> {
        if self.rx.is_none() {
            return Err(NavError::NotInitialized);
        }

        let Some(desc) = qm.pop(self.cfg.rx_rcv_q)? else {
            return Ok(None);
        };
        let hd = qm.descriptor(&desc);

        Ok(Some(RxPacket {
            desc,
            buff_ptr: hd.buff_ptr,
            len: hd.packet_len(),
        }))
    }

    /// The bytes of a received packet.
    pub fn packet_data(&self, pkt: &RxPacket) -> Result<&[u8]> {
        let region = self.rx.as_ref().ok_or(NavError::NotInitialized)?;

        let offset = pkt
            .buff_ptr
            .checked_sub(region.bus_base)
            .ok_or(NavError::ForeignDescriptor(pkt.buff_ptr))? as usize;
        let addr = region.buffer.addr() + offset;
        if !region.buffer.contains(addr, pkt.len as usize) {
            return Err(NavError::ForeignDescriptor(pkt.buff_ptr));
        }

        cache::invalidate(addr, pkt.len as usize);
        Ok(unsafe { slice::from_raw_parts(addr as *const u8, pkt.len as usize) })
    }

    /// Give a received packet's buffer back to the engine.
    pub fn release_rxhd<H: QueueHw>(
        &mut self,
        qm: &mut QueueManager<H>,
        pkt: RxPacket,
    ) -> Result<()> {
        qm.update(&pkt.desc, |d| {
            d.buff_len = d.orig_buff_len;
            d.buff_ptr = d.orig_buff_ptr;
        });

        qm.push(pkt.desc, self.cfg.rx_free_q)
    }
}

impl DeviceDriver for PacketDma {
    fn load_order(&self) -> DriverLoadOrder {
        DriverLoadOrder::Normal
    }

    fn compatible(&self) -> &'static str {
        "ti,keystone-navigator-dma"
    }
}

//--------------------------------------------------------------------------------------------------
// Private Code
//--------------------------------------------------------------------------------------------------

/// Queue manager index of a queue; each manager serves 4096 queues.
fn queue_mgr(qnum: u32) -> u32 {
    (qnum >> 12) & 0xf
}

/// Move every descriptor on `qnum` back to the free pool.
fn recycle<H: QueueHw>(qm: &mut QueueManager<H>, qnum: u32) -> Result<u32> {
    let qpool = qm.config().qpool_num;
    let mut moved = 0;
    while let Some(hd) = qm.pop(qnum)? {
        qm.push(hd, qpool)?;
        moved += 1;
    }

    Ok(moved)
}

/// Request teardown of an enabled channel and wait for the engine to drop `Enable`.
fn teardown(cfg_a: &ReadWrite<u32, CHAN_CFG_A::Register>, channel: u32, rx: bool) -> Result<()> {
    if !cfg_a.is_set(CHAN_CFG_A::Enable) {
        return Ok(());
    }

    cfg_a.modify(CHAN_CFG_A::Teardown::SET);
    let done = time_manager().poll(TDOWN_TIMEOUT_COUNT, TDOWN_POLL_INTERVAL, || {
        !cfg_a.is_set(CHAN_CFG_A::Enable)
    });

    if done {
        Ok(())
    } else {
        warn!("pktdma: {} channel {} teardown timed out", if rx { "rx" } else { "tx" }, channel);
        Err(NavError::TeardownTimeout { channel, rx })
    }
}

impl PacketDma {
    fn stock_rx_free<H: QueueHw>(
        &self,
        qm: &mut QueueManager<H>,
        rx: &RxBuffers,
        bus_base: u32,
    ) -> Result<()> {
        for j in 0..rx.num_buffs {
            let hd = qm.pop_from_free_pool()?.ok_or(NavError::PoolExhausted)?;
            qm.buff_push(hd, self.cfg.rx_free_q, bus_base + j * rx.buff_len, rx.buff_len)?;
        }

        Ok(())
    }

    fn rx_disable(&self) -> Result<()> {
        let mut result = Ok(());
        for (j, ch) in self.rx_ch.iter().enumerate() {
            let r = teardown(&ch.CFG_A, j as u32, true);
            result = result.and(r);
        }

        for flow in self.rx_flows.iter() {
            flow.CONTROL.set(0);
            flow.TAGS.set(0);
            flow.TAG_SEL.set(0);
            for fdq in flow.FDQ_SEL.iter() {
                fdq.set(0);
            }
            for thresh in flow.THRESH.iter() {
                thresh.set(0);
            }
        }

        result
    }

    fn tx_disable(&self) -> Result<()> {
        let mut result = Ok(());
        for (j, ch) in self.tx_ch.iter().enumerate() {
            let r = teardown(&ch.CFG_A, j as u32, false);
            result = result.and(r);
        }

        result
    }
}
