// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

#![allow(dead_code)]

use edgevision_rt::{
    image::{FrameDimensions, PixelFormat},
    lease::{BufferMetadata, HostError, PixelBufferHandle, RawMemoryView},
};
use std::cell::{Cell, RefCell};

/// Host buffer stub with injectable failures and lease accounting.
pub struct StubHost {
    pub meta: BufferMetadata,
    pixels: RefCell<Vec<u8>>,
    pub fail_metadata: bool,
    pub deny_lease: bool,
    pub return_null: bool,
    /// Overrides the leased length
    pub lease_len: Option<usize>,
    leased: Cell<bool>,
    acquires: Cell<usize>,
    releases: Cell<usize>,
}

impl StubHost {
    pub fn rgba(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        let dims = FrameDimensions::new(width, height);
        assert_eq!(pixels.len(), dims.byte_len());
        Self {
            meta: BufferMetadata::rgba(dims),
            pixels: RefCell::new(pixels),
            fail_metadata: false,
            deny_lease: false,
            return_null: false,
            lease_len: None,
            leased: Cell::new(false),
            acquires: Cell::new(0),
            releases: Cell::new(0),
        }
    }

    pub fn filled(width: u32, height: u32, px: [u8; 4]) -> Self {
        let n = (width * height) as usize;
        Self::rgba(width, height, px.repeat(n))
    }

    pub fn zeroed(width: u32, height: u32) -> Self {
        Self::filled(width, height, [0; 4])
    }

    /// Reports arbitrary metadata, backed by `len` bytes of memory.
    pub fn with_metadata(width: i32, height: i32, stride: u32, format: PixelFormat, len: usize) -> Self {
        Self {
            meta: BufferMetadata {
                width,
                height,
                stride,
                format,
            },
            pixels: RefCell::new(vec![0; len]),
            fail_metadata: false,
            deny_lease: false,
            return_null: false,
            lease_len: None,
            leased: Cell::new(false),
            acquires: Cell::new(0),
            releases: Cell::new(0),
        }
    }

    pub fn pixels(&self) -> Vec<u8> {
        assert!(!self.leased.get(), "pixels read while leased");
        self.pixels.borrow().clone()
    }

    pub fn acquires(&self) -> usize {
        self.acquires.get()
    }

    pub fn releases(&self) -> usize {
        self.releases.get()
    }

    pub fn balanced(&self) -> bool {
        !self.leased.get() && self.acquires.get() == self.releases.get()
    }
}

impl PixelBufferHandle for StubHost {
    fn metadata(&self) -> Result<BufferMetadata, HostError> {
        if self.fail_metadata {
            return Err(HostError::new(-22, "metadata unavailable"));
        }
        Ok(self.meta)
    }

    fn acquire_lease(&self) -> Result<RawMemoryView, HostError> {
        if self.deny_lease {
            return Err(HostError::new(-13, "lease denied"));
        }
        if self.leased.get() {
            return Err(HostError::new(HostError::BUSY, "already leased"));
        }
        self.leased.set(true);
        self.acquires.set(self.acquires.get() + 1);

        let mut pixels = self.pixels.borrow_mut();
        let len = self.lease_len.unwrap_or(pixels.len()).min(pixels.len());
        let ptr = match self.return_null {
            true => std::ptr::null_mut(),
            false => pixels.as_mut_ptr(),
        };
        Ok(unsafe { RawMemoryView::new(ptr, len) })
    }

    fn release_lease(&self) {
        assert!(self.leased.get(), "release without a lease");
        self.leased.set(false);
        self.releases.set(self.releases.get() + 1);
    }
}

/// Deterministic pseudo-random RGBA frame.
pub fn noise(width: u32, height: u32, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..width * height * 4)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}
