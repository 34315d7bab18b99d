// SPDX-License-Identifier: MIT
use core::cell::{Cell, RefCell};

use alloc::vec::Vec;

use super::firmware::interface::RingFirmware;
use super::*;
use crate::sim::{FakeMmio, SimBus};

const NUM_RINGS: u32 = 8;

struct RecordingFw {
    calls: RefCell<Vec<RingFwParams>>,
    fail: Cell<bool>,
}

impl RecordingFw {
    fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            fail: Cell::new(false),
        }
    }

    fn take(&self) -> Vec<RingFwParams> {
        self.calls.take()
    }
}

impl RingFirmware for RecordingFw {
    fn ring_config(&self, params: &RingFwParams) -> Result<()> {
        self.calls.borrow_mut().push(*params);
        if self.fail.get() {
            return Err(NavError::Firmware(-22));
        }

        Ok(())
    }
}

struct Rt<'a> {
    mmio: &'a FakeMmio,
    step: usize,
}

impl Rt<'_> {
    fn fwd(&self, ring: usize) -> usize {
        ring * self.step
    }

    fn reverse(&self, ring: usize) -> usize {
        ring * self.step + DUAL_RT_REVERSE_OFFSET
    }

    fn set_occ(&self, base: usize, value: u32) {
        self.mmio.write_u32(base + 0x18, value);
    }

    fn db(&self, base: usize) -> u32 {
        self.mmio.read_u32(base + 0x10)
    }
}

fn with_ringacc(
    dual: bool,
    quirk: bool,
    f: impl FnOnce(&mut RingAccelerator<'_>, &Rt<'_>, &RecordingFw),
) {
    let step = if dual { DUAL_RT_REGS_STEP } else { RT_REGS_STEP };
    let mmio = FakeMmio::new(NUM_RINGS as usize * step);
    let fw = RecordingFw::new();
    let bus = SimBus::new();
    let cfg = RingAccConfig {
        num_rings: NUM_RINGS,
        gp_range: GpRange { start: 2, num: 3 },
        dma_ring_reset_quirk: quirk,
        dual_ring: dual,
        rt_base: mmio.addr(),
        sci_dev_id: 187,
    };

    let mut ra = unsafe { RingAccelerator::new(cfg, &fw, &bus) }.unwrap();
    f(&mut ra, &Rt { mmio: &mmio, step }, &fw);
}

fn ring_cfg(size: u32) -> RingConfig {
    RingConfig {
        size,
        elm_size: ElementSize::E8,
        mode: RingMode::Ring,
        flags: RingCfgFlags::empty(),
    }
}

fn elem(v: u64) -> [u8; 8] {
    v.to_le_bytes()
}

#[test]
fn bad_configs_are_refused() {
    let fw = RecordingFw::new();
    let bus = SimBus::new();
    let mut cfg = RingAccConfig {
        num_rings: 0,
        gp_range: GpRange { start: 0, num: 0 },
        dma_ring_reset_quirk: false,
        dual_ring: false,
        rt_base: 0,
        sci_dev_id: 0,
    };
    assert!(unsafe { RingAccelerator::new(cfg.clone(), &fw, &bus) }.is_err());

    cfg.num_rings = 4;
    cfg.gp_range = GpRange { start: 2, num: 3 };
    assert!(unsafe { RingAccelerator::new(cfg, &fw, &bus) }.is_err());
}

#[test]
fn any_request_walks_the_general_purpose_range() {
    with_ringacc(false, false, |ra, _, _| {
        let ids: Vec<u32> = (0..3)
            .map(|_| ra.request_ring(RingRequest::Any).unwrap().index())
            .collect();
        assert_eq!(ids, [2, 3, 4]);
        assert_eq!(ra.request_ring(RingRequest::Any), Err(NavError::NoDevice));

        assert_eq!(ra.request_ring(RingRequest::Id(3)), Err(NavError::Busy));
        assert_eq!(ra.request_ring(RingRequest::Id(NUM_RINGS)), Err(NavError::InvalidArgument));
        assert!(ra.request_ring(RingRequest::Id(0)).is_ok());

        let h = RingHandle { index: 3 };
        ra.ring_free(h).unwrap();
        assert_eq!(ra.ring_free(h), Err(NavError::InvalidArgument));
        assert_eq!(ra.request_ring(RingRequest::Any).unwrap().index(), 3);
    });
}

#[test]
fn ring_cfg_programs_the_firmware() {
    with_ringacc(false, false, |ra, _, fw| {
        let h = ra.request_ring(RingRequest::Id(1)).unwrap();
        ra.ring_cfg(h, &ring_cfg(16)).unwrap();

        let calls = fw.take();
        assert_eq!(calls.len(), 1);
        let p = calls[0];
        assert_eq!(p.valid, ValidParams::ALL_NO_ORDER);
        assert_eq!(p.dev_id, 187);
        assert_eq!(p.ring_id, 1);
        assert_eq!(p.count, 16);
        assert_eq!(p.mode, RingMode::Ring as u8);
        assert_eq!(p.size, ElementSize::E8 as u8);
        assert_ne!(p.addr_lo, 0);
        assert_eq!(p.addr_hi, 0);

        assert_eq!(ra.get_size(h), Ok(16));
        assert_eq!(ra.ring_id(h), Ok(1));
    });
}

#[test]
fn ring_cfg_validation() {
    with_ringacc(false, false, |ra, _, fw| {
        let free = RingHandle { index: 5 };
        assert_eq!(ra.ring_cfg(free, &ring_cfg(16)), Err(NavError::InvalidArgument));

        let h = ra.request_ring(RingRequest::Id(5)).unwrap();
        assert_eq!(ra.ring_cfg(h, &ring_cfg(1 << 20)), Err(NavError::InvalidArgument));
        assert_eq!(ra.ring_cfg(h, &ring_cfg(0)), Err(NavError::InvalidArgument));

        let mut msg = ring_cfg(16);
        msg.mode = RingMode::Message;
        assert_eq!(ra.ring_cfg(h, &msg), Err(NavError::InvalidArgument));

        fw.fail.set(true);
        assert_eq!(ra.ring_cfg(h, &ring_cfg(16)), Err(NavError::Firmware(-22)));
        assert_eq!(ra.get_size(h), Err(NavError::InvalidArgument));

        fw.fail.set(false);
        ra.ring_cfg(h, &ring_cfg(16)).unwrap();
        assert_eq!(ra.get_size(h), Ok(16));
    });
}

#[test]
fn shared_rings_are_refcounted() {
    with_ringacc(false, false, |ra, _, fw| {
        let mut cfg = ring_cfg(8);
        cfg.flags = RingCfgFlags::SHARED;

        let a = ra.request_ring(RingRequest::Id(6)).unwrap();
        ra.ring_cfg(a, &cfg).unwrap();
        let b = ra.request_ring(RingRequest::Id(6)).unwrap();
        assert_eq!(a, b);
        // second user finds it configured
        ra.ring_cfg(b, &cfg).unwrap();
        assert_eq!(fw.take().len(), 1);

        ra.ring_free(b).unwrap();
        assert_eq!(ra.get_size(a), Ok(8));
        assert!(fw.take().is_empty());

        ra.ring_free(a).unwrap();
        assert_eq!(ra.get_size(a), Err(NavError::InvalidArgument));
        let calls = fw.take();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], RingFwParams::new(ValidParams::ALL_NO_ORDER, 187, 6));

        ra.request_ring(RingRequest::Id(6)).unwrap();
        assert_eq!(ra.request_ring(RingRequest::Id(6)), Err(NavError::Busy));
    });
}

#[test]
fn push_and_pop_in_ring_mode() {
    with_ringacc(false, false, |ra, rt, _| {
        let h = ra.request_ring(RingRequest::Id(2)).unwrap();
        ra.ring_cfg(h, &ring_cfg(4)).unwrap();
        let base = rt.fwd(2);

        assert_eq!(ra.get_free(h), Ok(4));
        ra.push(h, &elem(0xaaaa)).unwrap();
        ra.push(h, &elem(0xbbbb)).unwrap();
        assert_eq!(rt.db(base), 1);
        assert_eq!(ra.state(h).unwrap().windex, 2);
        assert_eq!(ra.get_free(h), Ok(2));

        rt.set_occ(base, 2);
        assert_eq!(ra.get_occ(h), Ok(2));

        let mut out = [0u8; 8];
        ra.pop(h, &mut out).unwrap();
        assert_eq!(out, elem(0xaaaa));
        assert_eq!(rt.db(base), u32::MAX);

        ra.pop(h, &mut out).unwrap();
        assert_eq!(out, elem(0xbbbb));

        rt.set_occ(base, 0);
        assert_eq!(ra.pop(h, &mut out), Err(NavError::NoData));
        assert_eq!(ra.state(h).unwrap().rindex, 2);
    });
}

#[test]
fn full_rings_and_bad_elements() {
    with_ringacc(false, false, |ra, rt, _| {
        let h = ra.request_ring(RingRequest::Id(0)).unwrap();
        assert_eq!(ra.push(h, &elem(1)), Err(NavError::InvalidArgument));

        ra.ring_cfg(h, &ring_cfg(2)).unwrap();
        assert_eq!(ra.push(h, &[0u8; 4]), Err(NavError::InvalidArgument));

        rt.set_occ(rt.fwd(0), 2);
        assert_eq!(ra.is_full(h), Ok(true));
        assert_eq!(ra.push(h, &elem(1)), Err(NavError::OutOfMemory));
    });
}

#[test]
fn head_push_and_tail_pop_are_unsupported() {
    with_ringacc(false, false, |ra, rt, _| {
        let h = ra.request_ring(RingRequest::Id(0)).unwrap();
        ra.ring_cfg(h, &ring_cfg(4)).unwrap();
        let mut out = [0u8; 8];

        assert_eq!(ra.push_head(h, &elem(1)), Err(NavError::NotSupported));
        assert_eq!(ra.pop_tail(h, &mut out), Err(NavError::NoData));

        rt.set_occ(rt.fwd(0), 1);
        assert_eq!(ra.pop_tail(h, &mut out), Err(NavError::NotSupported));
    });
}

#[test]
fn teardown_on_a_plain_ring_is_reported() {
    with_ringacc(false, false, |ra, rt, _| {
        let h = ra.request_ring(RingRequest::Id(0)).unwrap();
        ra.ring_cfg(h, &ring_cfg(4)).unwrap();
        let mut out = [0u8; 8];

        rt.set_occ(rt.fwd(0), 1 << 31);
        assert_eq!(ra.pop(h, &mut out), Err(NavError::TeardownComplete));
        assert!(!ra.state(h).unwrap().tdown_complete);
    });
}

#[test]
fn reset_dma_without_quirk_is_a_plain_reset() {
    with_ringacc(false, false, |ra, _, fw| {
        let h = ra.request_ring(RingRequest::Id(3)).unwrap();
        ra.ring_cfg(h, &ring_cfg(32)).unwrap();
        ra.push(h, &elem(7)).unwrap();
        fw.take();

        ra.ring_reset_dma(h, 5).unwrap();

        let calls = fw.take();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].valid, ValidParams::COUNT);
        assert_eq!(calls[0].count, 32);
        assert_eq!(ra.state(h), Ok(RingState::default()));
    });
}

#[test]
fn reset_dma_wraps_the_dma_occupancy() {
    with_ringacc(false, true, |ra, rt, fw| {
        let h = ra.request_ring(RingRequest::Id(3)).unwrap();
        ra.ring_cfg(h, &ring_cfg(32)).unwrap();
        fw.take();

        rt.set_occ(rt.fwd(3), 5);
        ra.ring_reset_dma(h, 0).unwrap();

        // 2^22 - 5 doorbells in chunks of 127 leave a 124 chunk last
        assert_eq!(rt.db(rt.fwd(3)), 124);
        let calls = fw.take();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|p| p.valid == ValidParams::COUNT));

        // nothing in flight, nothing to ring
        rt.set_occ(rt.fwd(3), 0);
        rt.mmio.write_u32(rt.fwd(3) + 0x10, 0);
        ra.ring_reset_dma(h, 0).unwrap();
        assert_eq!(rt.db(rt.fwd(3)), 0);
        assert_eq!(fw.take().len(), 1);

        assert_eq!(
            ra.ring_reset_dma(RingHandle { index: 4 }, 0),
            Err(NavError::InvalidArgument)
        );
    });
}

#[test]
fn dual_rings_come_in_pairs() {
    with_ringacc(true, false, |ra, _, _| {
        let (fwd, reverse) = ra
            .request_rings_pair(RingRequest::Id(3), RingRequest::Any)
            .unwrap();
        assert_eq!(fwd.index(), 3);
        assert_eq!(reverse.index(), 3 + NUM_RINGS);
        assert_eq!(ra.ring_id(reverse), Ok(3));

        assert_eq!(
            ra.request_rings_pair(RingRequest::Id(3), RingRequest::Any),
            Err(NavError::Busy)
        );
        assert_eq!(
            ra.request_rings_pair(RingRequest::Any, RingRequest::Any),
            Err(NavError::InvalidArgument)
        );
    });
}

#[test]
fn dual_ring_cfg_rules() {
    with_ringacc(true, false, |ra, _, fw| {
        let (fwd, reverse) = ra
            .request_rings_pair(RingRequest::Id(1), RingRequest::Id(1))
            .unwrap();

        let mut cfg = ring_cfg(16);
        cfg.elm_size = ElementSize::E4;
        assert_eq!(ra.ring_cfg(fwd, &cfg), Err(NavError::InvalidArgument));
        assert_eq!(ra.ring_cfg(fwd, &ring_cfg(1 << 16)), Err(NavError::InvalidArgument));

        ra.ring_cfg(reverse, &ring_cfg(16)).unwrap();
        assert!(fw.take().is_empty());
        assert_eq!(ra.get_size(reverse), Err(NavError::InvalidArgument));

        ra.ring_cfg(fwd, &ring_cfg(16)).unwrap();
        assert_eq!(fw.take().len(), 1);
        assert_eq!(ra.get_size(fwd), Ok(16));
        assert_eq!(ra.get_size(reverse), Ok(16));
    });
}

#[test]
fn dual_ring_traffic_and_teardown() {
    with_ringacc(true, false, |ra, rt, _| {
        let (fwd, reverse) = ra
            .request_rings_pair(RingRequest::Id(2), RingRequest::Id(2))
            .unwrap();
        ra.ring_cfg(fwd, &ring_cfg(4)).unwrap();
        let mut out = [0u8; 8];

        ra.push(fwd, &elem(0x1111)).unwrap();
        ra.push(fwd, &elem(0x2222)).unwrap();
        assert_eq!(ra.push(reverse, &elem(1)), Err(NavError::NotSupported));

        // both still queued: the oldest sits occ entries behind the write index
        rt.set_occ(rt.fwd(2), 2);
        ra.pop(fwd, &mut out).unwrap();
        assert_eq!(out, elem(0x1111));
        assert_eq!(rt.db(rt.fwd(2)), u32::MAX);

        // the DMA completes the first element back on the reverse ring
        rt.set_occ(rt.reverse(2), 1);
        ra.pop(reverse, &mut out).unwrap();
        assert_eq!(out, elem(0x1111));
        assert_eq!(rt.db(rt.reverse(2)), 0xff);

        rt.set_occ(rt.reverse(2), 1 << 31);
        ra.pop(reverse, &mut out).unwrap();
        assert_eq!(out, elem(TDCM_MARKER));
        assert_eq!(rt.db(rt.reverse(2)), 1 << 31);

        rt.set_occ(rt.reverse(2), 0);
        assert_eq!(ra.pop(reverse, &mut out), Err(NavError::NoData));
    });
}

#[test]
fn freeing_the_forward_ring_releases_both() {
    with_ringacc(true, false, |ra, _, fw| {
        let (fwd, reverse) = ra
            .request_rings_pair(RingRequest::Id(0), RingRequest::Id(0))
            .unwrap();
        ra.ring_cfg(fwd, &ring_cfg(8)).unwrap();
        fw.take();

        ra.ring_free(reverse).unwrap();
        assert_eq!(ra.get_size(reverse), Ok(8));
        assert!(fw.take().is_empty());

        ra.ring_free(fwd).unwrap();
        assert_eq!(ra.get_size(fwd), Err(NavError::InvalidArgument));
        assert_eq!(ra.get_size(reverse), Err(NavError::InvalidArgument));
        assert_eq!(fw.take().len(), 1);

        assert!(ra
            .request_rings_pair(RingRequest::Id(0), RingRequest::Id(0))
            .is_ok());
    });
}
