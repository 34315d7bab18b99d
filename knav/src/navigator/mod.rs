// SPDX-License-Identifier: MIT
//! Keystone 2 Multicore Navigator: the queue manager and the netcp packet DMA that feeds on it.

pub mod descriptor;
pub mod pktdma;
pub mod qm;

use crate::driver::interface::DeviceDriver;
use crate::error::{NavError, Result};
use crate::mem::dma::interface::DmaMapper;
use crate::{info, BUILD_TIMESTAMP};

use self::pktdma::{PacketDma, RxBuffers, RxPacket};
use self::qm::interface::QueueHw;
use self::qm::{QmConfig, QueueManager};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// The queue manager plus, once brought up, the netcp packet DMA.
pub struct Navigator<H: QueueHw, M: DmaMapper> {
    qm: QueueManager<H>,
    netcp: Option<PacketDma>,
    mapper: M,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl<H: QueueHw, M: DmaMapper> Navigator<H, M> {
    /// Bring up the queue manager.
    pub fn new(hw: H, cfg: QmConfig, mapper: M) -> Result<Self> {
        info!("knav, built {}", BUILD_TIMESTAMP.trim());

        let qm = QueueManager::init(hw, cfg, &mapper)?;
        info!("      {:?}: {}", qm.load_order(), qm.compatible());

        Ok(Self {
            qm,
            netcp: None,
            mapper,
        })
    }

    pub fn qm(&self) -> &QueueManager<H> {
        &self.qm
    }

    pub fn qm_mut(&mut self) -> &mut QueueManager<H> {
        &mut self.qm
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    pub fn netcp(&self) -> Option<&PacketDma> {
        self.netcp.as_ref()
    }

    /// Bring up the packet DMA on top of the queue manager.
    pub fn netcp_init(&mut self, mut dma: PacketDma, rx: RxBuffers) -> Result<()> {
        if self.netcp.is_some() {
            return Err(NavError::Busy);
        }

        dma.init(&mut self.qm, rx, &self.mapper)?;
        info!("      {:?}: {}", dma.load_order(), dma.compatible());
        self.netcp = Some(dma);

        Ok(())
    }

    pub fn send(&mut self, pkt: &[u8], swinfo2: u32) -> Result<()> {
        let dma = self.netcp.as_mut().ok_or(NavError::NotInitialized)?;

        dma.send(&mut self.qm, pkt, swinfo2, &self.mapper)
    }

    pub fn recv(&mut self) -> Result<Option<RxPacket>> {
        let dma = self.netcp.as_mut().ok_or(NavError::NotInitialized)?;

        dma.recv(&mut self.qm)
    }

    pub fn packet_data(&self, pkt: &RxPacket) -> Result<&[u8]> {
        self.netcp
            .as_ref()
            .ok_or(NavError::NotInitialized)?
            .packet_data(pkt)
    }

    pub fn release(&mut self, pkt: RxPacket) -> Result<()> {
        let dma = self.netcp.as_mut().ok_or(NavError::NotInitialized)?;

        dma.release_rxhd(&mut self.qm, pkt)
    }

    /// Shut the packet DMA down, leaving the queue manager running.
    pub fn netcp_close(&mut self) -> Result<()> {
        match self.netcp.take() {
            Some(mut dma) => dma.close(&mut self.qm),
            None => Ok(()),
        }
    }

    /// Shut everything down and hand the queue manager hardware back.
    ///
    /// The queue manager is closed even when the packet DMA fails to stop.
    pub fn close(mut self) -> Result<H> {
        let netcp = self.netcp_close();
        let hw = self.qm.close();

        netcp.map(|()| hw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    use crate::mem::dma::DmaBuffer;
    use crate::mem::ARCH_DMA_MINALIGN;
    use crate::navigator::pktdma::PktDmaConfig;
    use crate::sim::{FakeMmio, SimBus, SoftQueueHw, SoftSwitch};

    struct Regs {
        global: FakeMmio,
        tx: FakeMmio,
        rx: FakeMmio,
        flows: FakeMmio,
    }

    impl Regs {
        fn new() -> Self {
            Self {
                global: FakeMmio::new(0x20),
                tx: FakeMmio::new(0x20),
                rx: FakeMmio::new(0x20),
                flows: FakeMmio::new(0x20),
            }
        }

        fn dma(&self) -> PacketDma {
            unsafe {
                PacketDma::new(PktDmaConfig {
                    global_base: self.global.addr(),
                    tx_ch_base: self.tx.addr(),
                    tx_ch_num: 1,
                    rx_ch_base: self.rx.addr(),
                    rx_ch_num: 1,
                    rx_flow_base: self.flows.addr(),
                    rx_flow_num: 1,
                    rx_free_q: 4001,
                    rx_rcv_q: 4002,
                    tx_snd_q: 648,
                    qm_base_addr: None,
                })
            }
        }
    }

    fn navigator() -> Navigator<SoftQueueHw, SimBus> {
        let cfg = QmConfig {
            queue_base: 0,
            mngr_cfg_base: 0,
            desc_setup_base: 0,
            link_ram: 0x0010_0000,
            region_num: 64,
            num_queues: 8192,
            qpool_num: 4000,
            desc_num: 32,
        };

        Navigator::new(SoftQueueHw::new(8192), cfg, SimBus::new()).unwrap()
    }

    fn rx_buffers() -> RxBuffers {
        RxBuffers {
            buffer: DmaBuffer::new(4 * 1536, ARCH_DMA_MINALIGN).unwrap(),
            num_buffs: 4,
            buff_len: 1536,
            rx_flow: 0,
        }
    }

    #[test]
    fn netcp_calls_need_init() {
        let mut nav = navigator();

        assert_eq!(nav.send(&[0u8; 60], 0), Err(NavError::NotInitialized));
        assert_eq!(nav.recv().err(), Some(NavError::NotInitialized));
        assert_eq!(nav.netcp_close(), Ok(()));
    }

    #[test]
    fn netcp_init_twice_is_refused() {
        let regs = Regs::new();
        let mut nav = navigator();

        nav.netcp_init(regs.dma(), rx_buffers()).unwrap();
        assert_eq!(nav.netcp_init(regs.dma(), rx_buffers()), Err(NavError::Busy));
        assert_eq!(nav.qm().entry_count(4001), Ok(4));
    }

    #[test]
    fn frames_round_trip_through_loopback() {
        let regs = Regs::new();
        let mut nav = navigator();
        nav.netcp_init(regs.dma(), rx_buffers()).unwrap();
        let switch = SoftSwitch::new(648, 4001, 4002);

        let frames: Vec<Vec<u8>> = (1..=3u8)
            .map(|n| (0..64 * n as u32).map(|b| b as u8 ^ n).collect())
            .collect();
        for frame in &frames {
            nav.send(frame, 0).unwrap();
        }
        for frame in &frames {
            assert_eq!(switch.forward(nav.qm().hw(), nav.mapper()), Some(frame.len() as u32));
        }

        for frame in &frames {
            let pkt = nav.recv().unwrap().unwrap();
            assert_eq!(nav.packet_data(&pkt).unwrap(), &frame[..]);
            nav.release(pkt).unwrap();
        }
        assert!(nav.recv().unwrap().is_none());
        assert_eq!(nav.qm().entry_count(4001), Ok(4));
        assert_eq!(nav.qm().entry_count(4000), Ok(28));
    }

    #[test]
    fn close_hands_back_cleared_hardware() {
        let nav = navigator();

        let hw = nav.close().unwrap();

        assert_eq!(hw.link_ram(), (0, 0));
        assert_eq!(hw.entry_count(4000), 0);
    }
}
