// SPDX-License-Identifier: MIT
use thiserror::Error;

pub type Result<T> = core::result::Result<T, NavError>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavError {
    #[error("queue {qnum} out of range (0..{num_queues})")]
    InvalidQueue { qnum: u32, num_queues: u32 },

    #[error("free descriptor pool is empty")]
    PoolExhausted,

    #[error("descriptor word {0:#010x} does not belong to the pool")]
    ForeignDescriptor(u32),

    #[error("packet DMA not initialised")]
    NotInitialized,

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("bus address {0:#x} is not reachable by the queue manager")]
    AddressOutOfRange(u64),

    #[error("cpu region {addr:#x}+{len:#x} is not DMA visible")]
    Unmapped { addr: usize, len: usize },

    #[error("dma channel {channel} did not finish teardown (rx: {rx})")]
    TeardownTimeout { channel: u32, rx: bool },

    #[error("invalid argument")]
    InvalidArgument,

    #[error("ring already in use")]
    Busy,

    #[error("no free ring")]
    NoDevice,

    #[error("out of memory")]
    OutOfMemory,

    #[error("ring is empty")]
    NoData,

    #[error("operation not supported in this ring mode")]
    NotSupported,

    #[error("ring teardown completed")]
    TeardownComplete,

    #[error("ring firmware request failed ({0})")]
    Firmware(i32),
}
