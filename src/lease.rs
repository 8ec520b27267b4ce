// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Host pixel buffers and scoped access to their memory.
//!
//! A host owns every pixel buffer. The core asks a [`PixelBufferHandle`] for
//! its metadata and for a lease on its memory, and gives the lease back when
//! it is done. [`Lease`] pairs the two: a guard only exists after a
//! successful acquire and releases exactly once when dropped, so early
//! returns and unwinding panics cannot leak or double-release a lease.

use crate::image::{FrameDimensions, PixelFormat, RGBA_CHANNELS};
use std::{
    cell::{Cell, UnsafeCell},
    fmt, io,
    slice::{from_raw_parts, from_raw_parts_mut},
};
use tracing::{debug, warn};

/// Failure reported by a host while describing or locking a buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (host code {code})")]
pub struct HostError {
    pub code: i32,
    pub message: String,
}

impl HostError {
    /// Code used when a buffer is already leased elsewhere.
    pub const BUSY: i32 = -16;

    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Buffer description as reported by the host.
///
/// Width and height are signed because hosts report them that way; the
/// gateway rejects negative values.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BufferMetadata {
    pub width: i32,
    pub height: i32,
    /// Bytes per row
    pub stride: u32,
    pub format: PixelFormat,
}

impl BufferMetadata {
    /// Metadata of an unpadded RGBA buffer.
    pub fn rgba(dims: FrameDimensions) -> Self {
        Self {
            width: dims.width as i32,
            height: dims.height as i32,
            stride: dims.width * RGBA_CHANNELS as u32,
            format: PixelFormat::Rgba8888,
        }
    }

    /// The dimensions, or `None` if either one is negative.
    pub fn dimensions(&self) -> Option<FrameDimensions> {
        let width = u32::try_from(self.width).ok()?;
        let height = u32::try_from(self.height).ok()?;
        Some(FrameDimensions::new(width, height))
    }
}

impl fmt::Display for BufferMetadata {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} {} stride:{}",
            self.width, self.height, self.format, self.stride
        )
    }
}

/// Pixel memory granted by a lease.
#[derive(Copy, Clone, Debug)]
pub struct RawMemoryView {
    ptr: *mut u8,
    len: usize,
}

impl RawMemoryView {
    /// Wraps a host memory region.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    /// - `ptr` is valid for reads and writes of `len` bytes until the lease
    ///   that produced it is released
    /// - no other code accesses the region while the lease is held
    pub unsafe fn new(ptr: *mut u8, len: usize) -> Self {
        Self { ptr, len }
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The three operations the core performs on a host-owned buffer.
///
/// Implementations use interior mutability: hosts hand out shared handles
/// and track lock state themselves. A handle must deny a second lease while
/// one is outstanding.
pub trait PixelBufferHandle {
    fn metadata(&self) -> Result<BufferMetadata, HostError>;

    fn acquire_lease(&self) -> Result<RawMemoryView, HostError>;

    /// Gives back the lease obtained by the last successful
    /// [`acquire_lease`](PixelBufferHandle::acquire_lease).
    fn release_lease(&self);
}

/// Exclusive access to a host buffer's memory for the guard's lifetime.
pub struct Lease<'h, H: PixelBufferHandle + ?Sized> {
    handle: &'h H,
    view: RawMemoryView,
}

impl<'h, H: PixelBufferHandle + ?Sized> Lease<'h, H> {
    /// Acquires a lease on `handle`. Nothing needs releasing when this fails.
    pub fn acquire(handle: &'h H) -> Result<Self, HostError> {
        let view = handle.acquire_lease()?;
        let lease = Self { handle, view };
        debug!(len = view.len(), "lease acquired");

        if view.as_ptr().is_null() && !view.is_empty() {
            // dropping the guard hands the lease back
            return Err(HostError::new(-1, "host returned a null pixel pointer"));
        }
        Ok(lease)
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        if self.view.is_empty() {
            return &[];
        }
        unsafe { from_raw_parts(self.view.as_ptr(), self.view.len()) }
    }

    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        if self.view.is_empty() {
            return &mut [];
        }
        unsafe { from_raw_parts_mut(self.view.as_ptr(), self.view.len()) }
    }
}

impl<H: PixelBufferHandle + ?Sized> Drop for Lease<'_, H> {
    fn drop(&mut self) {
        self.handle.release_lease();
        debug!(len = self.view.len(), "lease released")
    }
}

/// Heap-backed RGBA buffer that behaves like a host bitmap.
///
/// Used for decoded files and converted camera frames, and by hosts that
/// embed the library directly. Leases are exclusive and counted.
///
/// # Thread Safety
///
/// `MemoryBuffer` is `Send` but not `Sync`; lease state is not synchronised.
pub struct MemoryBuffer {
    dims: FrameDimensions,
    format: PixelFormat,
    data: UnsafeCell<Vec<u8>>,
    leased: Cell<bool>,
    acquired: Cell<usize>,
    released: Cell<usize>,
}

impl MemoryBuffer {
    /// Allocates a zeroed RGBA buffer.
    pub fn new(dims: FrameDimensions) -> Self {
        Self::wrap(dims, vec![0u8; dims.byte_len()])
    }

    /// Wraps existing RGBA pixels.
    ///
    /// # Errors
    ///
    /// Returns an error if `pixels` is not exactly `dims.byte_len()` bytes.
    pub fn from_pixels(dims: FrameDimensions, pixels: Vec<u8>) -> Result<Self, io::Error> {
        if pixels.len() != dims.byte_len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{} frame needs {} bytes, got {}",
                    dims,
                    dims.byte_len(),
                    pixels.len()
                ),
            ));
        }
        Ok(Self::wrap(dims, pixels))
    }

    fn wrap(dims: FrameDimensions, pixels: Vec<u8>) -> Self {
        Self {
            dims,
            format: PixelFormat::Rgba8888,
            data: UnsafeCell::new(pixels),
            leased: Cell::new(false),
            acquired: Cell::new(0),
            released: Cell::new(0),
        }
    }

    /// Overrides the reported pixel format without touching the memory.
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn dimensions(&self) -> FrameDimensions {
        self.dims
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Pixel contents. Requires `&mut self` so no lease can be outstanding.
    pub fn pixels(&mut self) -> &[u8] {
        self.data.get_mut()
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        self.data.get_mut()
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.data.into_inner()
    }

    pub fn is_leased(&self) -> bool {
        self.leased.get()
    }

    /// Number of successful acquires and of releases so far.
    pub fn lease_counts(&self) -> (usize, usize) {
        (self.acquired.get(), self.released.get())
    }
}

impl PixelBufferHandle for MemoryBuffer {
    fn metadata(&self) -> Result<BufferMetadata, HostError> {
        let mut meta = BufferMetadata::rgba(self.dims);
        meta.format = self.format;
        Ok(meta)
    }

    fn acquire_lease(&self) -> Result<RawMemoryView, HostError> {
        if self.leased.get() {
            return Err(HostError::new(HostError::BUSY, "buffer already leased"));
        }
        self.leased.set(true);
        self.acquired.set(self.acquired.get() + 1);

        // SAFETY: the leased flag keeps this the only live view until
        // release_lease, and pixels() needs &mut self which no guard allows.
        unsafe {
            let data = &mut *self.data.get();
            Ok(RawMemoryView::new(data.as_mut_ptr(), data.len()))
        }
    }

    fn release_lease(&self) {
        if !self.leased.get() {
            warn!("release_lease called on a buffer that is not leased");
            return;
        }
        self.leased.set(false);
        self.released.set(self.released.get() + 1);
    }
}

impl fmt::Debug for MemoryBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MemoryBuffer")
            .field("dims", &self.dims)
            .field("format", &self.format)
            .field("leased", &self.leased.get())
            .finish()
    }
}
