// SPDX-License-Identifier: MIT
//! SoC register maps and ready-made driver configurations.

pub mod keystone2;
