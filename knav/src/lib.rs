// SPDX-License-Identifier: MIT
//! Keystone Multicore Navigator.
//!
//! Drivers for the hardware queue manager, the packet DMA engine bound to it, and the K3 ring
//! accelerator that replaced both on later SoCs. Everything runs single threaded and polls the
//! hardware; nothing here sleeps or takes interrupts.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod bsp;
pub mod console;
pub mod driver;
pub mod error;
pub mod mem;
pub mod navigator;
#[doc(hidden)]
pub mod print;
pub mod ringacc;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod sync;
pub mod time;

pub use error::{NavError, Result};

/// When this crate was built, as written by `build.rs`.
pub const BUILD_TIMESTAMP: &str = include_str!(concat!(env!("OUT_DIR"), "/timestamp.txt"));
