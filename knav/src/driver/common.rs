// SPDX-License-Identifier: MIT
use core::marker::PhantomData;
use core::ops;

pub struct MMIODerefWrapper<T> {
    start_addr: usize,
    phantom: PhantomData<fn() -> T>,
}

impl<T> MMIODerefWrapper<T> {
    /// Create an instance.
    ///
    /// # Safety
    ///
    /// - `start_addr` must point at a live register block laid out as `T`.
    pub const unsafe fn new(start_addr: usize) -> Self {
        Self {
            start_addr,
            phantom: PhantomData,
        }
    }

    pub const fn start_addr(&self) -> usize {
        self.start_addr
    }
}

impl<T> ops::Deref for MMIODerefWrapper<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*(self.start_addr as *const _) }
    }
}

/// `len` register blocks of type `T`, `stride` bytes apart.
pub struct MMIOArray<T> {
    start_addr: usize,
    stride: usize,
    len: usize,
    phantom: PhantomData<fn() -> T>,
}

impl<T> MMIOArray<T> {
    /// Create an instance.
    ///
    /// # Safety
    ///
    /// - Every block `start_addr + i * stride` for `i < len` must be a live register block laid
    ///   out as `T`.
    pub const unsafe fn new(start_addr: usize, stride: usize, len: usize) -> Self {
        Self {
            start_addr,
            stride,
            len,
            phantom: PhantomData,
        }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The register block at `index`, if it is inside the array.
    pub fn get(&self, index: usize) -> Option<MMIODerefWrapper<T>> {
        if index >= self.len {
            return None;
        }

        // in bounds, so covered by the contract of `new`
        Some(unsafe { MMIODerefWrapper::new(self.start_addr + index * self.stride) })
    }

    pub fn iter(&self) -> impl Iterator<Item = MMIODerefWrapper<T>> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }
}
