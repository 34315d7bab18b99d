// SPDX-License-Identifier: MIT
use core::cell::UnsafeCell;

use crate::sync::interface::{Mutex, ReadWriteEx};

/// A lock for data shared with interrupt context.
///
/// Every access runs inside a `critical_section`, so the platform's implementation decides what
/// that means: masking local IRQs on the target, a global mutex on a hosted build.
pub struct IRQSafeNullLock<T>
where
    T: ?Sized,
{
    data: UnsafeCell<T>,
}

unsafe impl<T> Send for IRQSafeNullLock<T> where T: ?Sized + Send {}
unsafe impl<T> Sync for IRQSafeNullLock<T> where T: ?Sized + Send {}

impl<T> IRQSafeNullLock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            data: UnsafeCell::new(data),
        }
    }
}

impl<T> Mutex for IRQSafeNullLock<T> {
    type Data = T;

    fn lock<'a, R>(&'a self, f: impl FnOnce(&'a mut Self::Data) -> R) -> R {
        critical_section::with(|_cs| {
            let data = unsafe { &mut *self.data.get() };
            f(data)
        })
    }
}

impl<T> ReadWriteEx for IRQSafeNullLock<T> {
    type Data = T;

    fn write<'a, R>(&'a self, f: impl FnOnce(&'a mut Self::Data) -> R) -> R {
        self.lock(f)
    }

    fn read<'a, R>(&'a self, f: impl FnOnce(&'a Self::Data) -> R) -> R {
        critical_section::with(|_cs| {
            let data = unsafe { &*self.data.get() };
            f(data)
        })
    }
}
