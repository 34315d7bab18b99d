// SPDX-License-Identifier: MIT
//! Ring configuration on behalf of the system firmware.
//!
//! On K3 SoCs the ring configuration registers normally belong to the resource manager running on
//! the system controller, and rings are configured by asking it. [`RawRingConfig`] writes the same
//! fields straight into the registers for when no such service is around.

use bitflags::bitflags;
use tock_registers::{
    interfaces::{Readable, Writeable},
    register_bitfields, register_structs,
    registers::ReadWrite,
};

use crate::driver::MMIOArray;
use crate::error::{NavError, Result};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

bitflags! {
    /// Which fields of a [`RingFwParams`] the firmware should apply.
    pub struct ValidParams: u32 {
        const ADDR_LO = 1 << 0;
        const ADDR_HI = 1 << 1;
        const COUNT = 1 << 2;
        const MODE = 1 << 3;
        const SIZE = 1 << 4;
        const ORDER_ID = 1 << 5;

        const ALL_NO_ORDER = Self::ADDR_LO.bits
            | Self::ADDR_HI.bits
            | Self::COUNT.bits
            | Self::MODE.bits
            | Self::SIZE.bits;
    }
}

/// One ring configuration request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingFwParams {
    pub valid: ValidParams,
    pub dev_id: u32,
    pub ring_id: u32,
    pub addr_lo: u32,
    pub addr_hi: u32,
    /// Ring size in elements.
    pub count: u32,
    pub mode: u8,
    /// Element size code, bytes = 4 << size.
    pub size: u8,
    pub order_id: u8,
}

pub mod interface {
    use super::RingFwParams;
    use crate::error::Result;

    /// The resource manager owning the ring configuration registers.
    pub trait RingFirmware {
        fn ring_config(&self, params: &RingFwParams) -> Result<()>;
    }
}

/// Ring configuration registers written directly.
pub struct RawRingConfig {
    rings: MMIOArray<RingCfgRegs>,
}

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

register_bitfields! {
    u32,

    RING_SIZE [
        QMode OFFSET(30) NUMBITS(2) [],
        ElSize OFFSET(24) NUMBITS(3) [],
        ElCnt OFFSET(0) NUMBITS(20) []
    ]
}

register_structs! {
    #[allow(non_snake_case)]
    RingCfgRegs {
        (0x00 => _reserved0),
        (0x40 => BA_LO: ReadWrite<u32>),
        (0x44 => BA_HI: ReadWrite<u32>),
        (0x48 => SIZE: ReadWrite<u32, RING_SIZE::Register>),
        (0x4c => _reserved1),
        (0x100 => @END),
    }
}

const CFG_REGS_STEP: usize = 0x100;

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl RingFwParams {
    /// A request touching nothing but `valid` fields, all zero.
    pub fn new(valid: ValidParams, dev_id: u32, ring_id: u32) -> Self {
        Self {
            valid,
            dev_id,
            ring_id,
            addr_lo: 0,
            addr_hi: 0,
            count: 0,
            mode: 0,
            size: 0,
            order_id: 0,
        }
    }
}

impl RawRingConfig {
    /// Create an instance.
    ///
    /// # Safety
    ///
    /// - `cfg_base` must be the mapped ring configuration region, `num_rings` rings long.
    pub unsafe fn new(cfg_base: usize, num_rings: u32) -> Self {
        Self {
            rings: MMIOArray::new(cfg_base, CFG_REGS_STEP, num_rings as usize),
        }
    }
}

impl interface::RingFirmware for RawRingConfig {
    fn ring_config(&self, params: &RingFwParams) -> Result<()> {
        let regs = self
            .rings
            .get(params.ring_id as usize)
            .ok_or(NavError::InvalidArgument)?;
        let valid = params.valid;

        if valid.contains(ValidParams::ADDR_LO) {
            regs.BA_LO.set(params.addr_lo);
        }
        if valid.contains(ValidParams::ADDR_HI) {
            regs.BA_HI.set(params.addr_hi);
        }

        if valid.intersects(ValidParams::COUNT | ValidParams::MODE | ValidParams::SIZE) {
            let mut size = regs.SIZE.extract();
            if valid.contains(ValidParams::COUNT) {
                size.modify(RING_SIZE::ElCnt.val(params.count));
            }
            if valid.contains(ValidParams::MODE) {
                size.modify(RING_SIZE::QMode.val(params.mode.into()));
            }
            if valid.contains(ValidParams::SIZE) {
                size.modify(RING_SIZE::ElSize.val(params.size.into()));
            }
            regs.SIZE.set(size.get());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::interface::RingFirmware;
    use super::*;
    use crate::sim::FakeMmio;

    #[test]
    fn raw_config_writes_only_valid_fields() {
        let cfg = FakeMmio::new(4 * CFG_REGS_STEP);
        let fw = unsafe { RawRingConfig::new(cfg.addr(), 4) };
        let ring2 = 2 * CFG_REGS_STEP;

        let mut params = RingFwParams::new(ValidParams::ALL_NO_ORDER, 0, 2);
        params.addr_lo = 0x8000_1000;
        params.addr_hi = 0x1;
        params.count = 128;
        params.mode = 0;
        params.size = 1;
        fw.ring_config(&params).unwrap();

        assert_eq!(cfg.read_u32(ring2 + 0x40), 0x8000_1000);
        assert_eq!(cfg.read_u32(ring2 + 0x44), 0x1);
        assert_eq!(cfg.read_u32(ring2 + 0x48), (1 << 24) | 128);
        assert_eq!(cfg.read_u32(0x48), 0);

        let mut params = RingFwParams::new(ValidParams::MODE, 0, 2);
        params.mode = 2;
        fw.ring_config(&params).unwrap();
        assert_eq!(cfg.read_u32(ring2 + 0x48), (2 << 30) | (1 << 24) | 128);
        assert_eq!(cfg.read_u32(ring2 + 0x40), 0x8000_1000);

        fw.ring_config(&RingFwParams::new(ValidParams::ALL_NO_ORDER, 0, 2))
            .unwrap();
        assert_eq!(cfg.read_u32(ring2 + 0x40), 0);
        assert_eq!(cfg.read_u32(ring2 + 0x48), 0);
    }

    #[test]
    fn raw_config_rejects_unknown_rings() {
        let cfg = FakeMmio::new(CFG_REGS_STEP);
        let fw = unsafe { RawRingConfig::new(cfg.addr(), 1) };

        assert_eq!(
            fw.ring_config(&RingFwParams::new(ValidParams::COUNT, 0, 1)),
            Err(NavError::InvalidArgument)
        );
    }
}
