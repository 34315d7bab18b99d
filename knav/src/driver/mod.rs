// SPDX-License-Identifier: MIT
pub use common::*;

mod common;

pub mod interface {
    pub trait DeviceDriver {
        /// Describes the load order of the driver.
        fn load_order(&self) -> super::DriverLoadOrder;

        /// A string describing the device driver.
        fn compatible(&self) -> &'static str;
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum DriverLoadOrder {
    /// Brought up first: everything else pushes descriptors through it.
    Early,

    /// Brought up once the queues it depends on exist.
    Normal,
}
