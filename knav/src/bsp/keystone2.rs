// SPDX-License-Identifier: MIT
//! Keystone 2 SoCs: K2HK (66AK2H / TCI6638K2K) and K2E/K2L.

use crate::navigator::descriptor::HDESC_NUM;
use crate::navigator::pktdma::PktDmaConfig;
use crate::navigator::qm::QmConfig;

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------
#[rustfmt::skip]
pub mod map {
    /// Queue manager, common to every Keystone 2 SoC.
    pub mod qm {
        /// Queue manager as seen by the packet DMAs.
        pub const BASE_ADDRESS:       u32 =   0x23a8_0000;
        pub const CONF_BASE:        usize =   0x02a0_2000;
        pub const DESC_SETUP_BASE:  usize =   0x02a0_3000;
        pub const MANAGER_QUEUES:   usize =   0x02a8_0000;
        pub const LINK_RAM_BASE:      u32 =   0x0010_0000;

        pub const REGION_NUM:         u32 =   64;
        pub const QPOOL_NUM:          u32 =   4000;
        pub const NUM_QUEUES:         u32 =   8192;
    }

    /// Network coprocessor packet DMA on K2HK.
    pub mod k2hk_netcp {
        pub const PDMA_CTRL_BASE:   usize =   0x0200_4000;
        pub const PDMA_TX_BASE:     usize =   0x0200_4400;
        pub const PDMA_TX_CH_NUM:     u32 =   9;
        pub const PDMA_RX_BASE:     usize =   0x0200_4800;
        pub const PDMA_RX_CH_NUM:     u32 =   26;
        pub const PDMA_RX_FLOW_BASE: usize =  0x0200_5000;
        pub const PDMA_RX_FLOW_NUM:   u32 =   32;
        pub const TX_SND_QUEUE:       u32 =   648;
    }

    /// Network coprocessor packet DMA on K2E and K2L.
    pub mod k2e_netcp {
        pub const PDMA_CTRL_BASE:   usize =   0x2418_6000;
        pub const PDMA_TX_BASE:     usize =   0x2418_7000;
        pub const PDMA_TX_CH_NUM:     u32 =   21;
        pub const PDMA_RX_BASE:     usize =   0x2418_8000;
        pub const PDMA_RX_CH_NUM:     u32 =   91;
        pub const PDMA_RX_FLOW_BASE: usize =  0x2418_9000;
        pub const PDMA_RX_FLOW_NUM:   u32 =   96;
        pub const TX_SND_QUEUE:       u32 =   896;
    }

    pub const RX_FREE_QUEUE:          u32 =   4001;
    pub const RX_RCV_QUEUE:           u32 =   4002;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Soc {
    K2hk,
    K2e,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

/// Queue manager setup used by the network driver, with the default descriptor count.
pub fn qm_config() -> QmConfig {
    QmConfig {
        queue_base: map::qm::MANAGER_QUEUES,
        mngr_cfg_base: map::qm::CONF_BASE,
        desc_setup_base: map::qm::DESC_SETUP_BASE,
        link_ram: map::qm::LINK_RAM_BASE,
        region_num: map::qm::REGION_NUM,
        num_queues: map::qm::NUM_QUEUES,
        qpool_num: map::qm::QPOOL_NUM,
        desc_num: HDESC_NUM,
    }
}

pub fn netcp_pktdma_config(soc: Soc) -> PktDmaConfig {
    match soc {
        Soc::K2hk => {
            use map::k2hk_netcp::*;

            PktDmaConfig {
                global_base: PDMA_CTRL_BASE,
                tx_ch_base: PDMA_TX_BASE,
                tx_ch_num: PDMA_TX_CH_NUM,
                rx_ch_base: PDMA_RX_BASE,
                rx_ch_num: PDMA_RX_CH_NUM,
                rx_flow_base: PDMA_RX_FLOW_BASE,
                rx_flow_num: PDMA_RX_FLOW_NUM,
                rx_free_q: map::RX_FREE_QUEUE,
                rx_rcv_q: map::RX_RCV_QUEUE,
                tx_snd_q: TX_SND_QUEUE,
                qm_base_addr: Some(map::qm::BASE_ADDRESS),
            }
        }
        Soc::K2e => {
            use map::k2e_netcp::*;

            PktDmaConfig {
                global_base: PDMA_CTRL_BASE,
                tx_ch_base: PDMA_TX_BASE,
                tx_ch_num: PDMA_TX_CH_NUM,
                rx_ch_base: PDMA_RX_BASE,
                rx_ch_num: PDMA_RX_CH_NUM,
                rx_flow_base: PDMA_RX_FLOW_BASE,
                rx_flow_num: PDMA_RX_FLOW_NUM,
                rx_free_q: map::RX_FREE_QUEUE,
                rx_rcv_q: map::RX_RCV_QUEUE,
                tx_snd_q: TX_SND_QUEUE,
                qm_base_addr: Some(map::qm::BASE_ADDRESS),
            }
        }
    }
}
