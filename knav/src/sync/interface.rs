// SPDX-License-Identifier: MIT
//! Locking interfaces implemented by the locks in this module.

/// Exclusive access to the wrapped data while `f` runs.
pub trait Mutex {
    type Data;

    fn lock<'a, R>(&'a self, f: impl FnOnce(&'a mut Self::Data) -> R) -> R;
}

/// Shared or exclusive access to the wrapped data.
///
/// The global registries are written once during platform bring-up and read on every log line,
/// timeout and cache operation after that.
pub trait ReadWriteEx {
    type Data;

    fn write<'a, R>(&'a self, f: impl FnOnce(&'a mut Self::Data) -> R) -> R;

    fn read<'a, R>(&'a self, f: impl FnOnce(&'a Self::Data) -> R) -> R;
}
