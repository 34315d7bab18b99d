// SPDX-License-Identifier: MIT
mod irq_safe_null;
mod null;

pub mod interface;

pub use self::irq_safe_null::*;
pub use self::null::*;
