// SPDX-License-Identifier: MIT
use core::cell::UnsafeCell;

use crate::sync::interface::{Mutex, ReadWriteEx};

/// Interior mutability without any locking, for state owned by one driver instance.
///
/// The software queue manager and the simulated bus keep their state in one of these: every
/// access is a short closure on the thread that owns the instance.
///
/// # Safety
///
/// Closures must not re-enter the same lock, and the lock must not be used from two threads at
/// once.
pub struct NullLock<T: ?Sized> {
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send> Send for NullLock<T> {}
unsafe impl<T: ?Sized + Send> Sync for NullLock<T> {}

impl<T> NullLock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            data: UnsafeCell::new(data),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T> Mutex for NullLock<T> {
    type Data = T;

    fn lock<'a, R>(&'a self, f: impl FnOnce(&'a mut T) -> R) -> R {
        f(unsafe { &mut *self.data.get() })
    }
}

impl<T> ReadWriteEx for NullLock<T> {
    type Data = T;

    fn write<'a, R>(&'a self, f: impl FnOnce(&'a mut T) -> R) -> R {
        self.lock(f)
    }

    fn read<'a, R>(&'a self, f: impl FnOnce(&'a T) -> R) -> R {
        f(unsafe { &*self.data.get() })
    }
}
