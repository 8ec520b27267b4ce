// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    image::PixelFormat,
    lease::{BufferMetadata, HostError, PixelBufferHandle, RawMemoryView},
};
use core::fmt;
use dma_heap::{Heap, HeapKind};
use libc::{mmap, munmap, MAP_FAILED, MAP_SHARED, PROT_READ, PROT_WRITE};
use std::{
    cell::Cell,
    error::Error,
    ffi::c_void,
    io,
    os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd},
    ptr::null_mut,
};
use tracing::{debug, warn};
use videostream::{camera::CameraBuffer, fourcc::FourCC};

/// DMA-backed image buffer.
///
/// `DmaImage` represents an image buffer allocated in DMA memory or
/// borrowed from a V4L2 camera buffer. CPU access goes through a lease,
/// which maps the buffer for the lease's duration. The file descriptor is
/// closed when the `DmaImage` is dropped.
///
/// # Example
///
/// ```no_run
/// use edgevision_rt::{dma::DmaImage, image::RGBA, lease::Lease};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let img = DmaImage::new(1920, 1080, RGBA)?;
/// let mut lease = Lease::acquire(&img)?;
/// lease.as_slice_mut().fill(0);
/// # Ok(())
/// # }
/// ```
pub struct DmaImage {
    fd: OwnedFd,
    width: u32,
    height: u32,
    format: FourCC,
    mapping: Cell<Option<RawMemoryView>>,
}

impl DmaImage {
    /// Allocates a new image buffer from the CMA DMA heap.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The format has no known memory layout
    /// - DMA heap allocation fails (out of memory)
    /// - The DMA heap device is not accessible
    pub fn new(width: u32, height: u32, format: FourCC) -> Result<Self, Box<dyn Error>> {
        let size = PixelFormat::from(format)
            .frame_size(width, height)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("no memory layout for {format}"),
                )
            })?;
        let heap = Heap::new(HeapKind::Cma)?;
        let fd = heap.allocate(size)?;
        debug!(width, height, %format, size, "DMA image allocated");
        Ok(Self::new_preallocated(fd, width, height, format))
    }

    pub fn new_preallocated(fd: OwnedFd, width: u32, height: u32, format: FourCC) -> Self {
        Self {
            fd,
            width,
            height,
            format,
            mapping: Cell::new(None),
        }
    }

    /// Wraps a V4L2 camera buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the file descriptor cannot be duplicated.
    pub fn from_camera(buffer: &CameraBuffer) -> Result<Self, Box<dyn Error>> {
        let fd = buffer.fd();

        Ok(Self::new_preallocated(
            fd.try_clone_to_owned()?,
            buffer.width() as u32,
            buffer.height() as u32,
            buffer.format(),
        ))
    }

    pub fn fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> FourCC {
        self.format
    }

    pub fn size(&self) -> usize {
        PixelFormat::from(self.format)
            .frame_size(self.width, self.height)
            .unwrap_or(0)
    }

    fn unmap(&self) {
        if let Some(view) = self.mapping.take() {
            if unsafe { munmap(view.as_ptr().cast::<c_void>(), view.len()) } != 0 {
                warn!(err = %io::Error::last_os_error(), "unmap failed!");
            }
        }
    }
}

impl PixelBufferHandle for DmaImage {
    fn metadata(&self) -> Result<BufferMetadata, HostError> {
        let format = PixelFormat::from(self.format);
        Ok(BufferMetadata {
            width: self.width as i32,
            height: self.height as i32,
            stride: format.row_stride(self.width).unwrap_or(0) as u32,
            format,
        })
    }

    fn acquire_lease(&self) -> Result<RawMemoryView, HostError> {
        if self.mapping.get().is_some() {
            return Err(HostError::new(HostError::BUSY, "DMA image already mapped"));
        }
        let size = self.size();
        if size == 0 {
            return Err(HostError::new(-1, format!("cannot map {self}")));
        }

        let ptr = unsafe {
            mmap(
                null_mut(),
                size,
                PROT_READ | PROT_WRITE,
                MAP_SHARED,
                self.fd.as_raw_fd(),
                0,
            )
        };
        if ptr == MAP_FAILED {
            let err = io::Error::last_os_error();
            return Err(HostError::new(
                err.raw_os_error().unwrap_or(-1),
                format!("mmap failed: {err}"),
            ));
        }

        // SAFETY: the mapping stays valid until release_lease unmaps it.
        let view = unsafe { RawMemoryView::new(ptr.cast::<u8>(), size) };
        self.mapping.set(Some(view));
        Ok(view)
    }

    fn release_lease(&self) {
        self.unmap();
    }
}

impl Drop for DmaImage {
    fn drop(&mut self) {
        self.unmap();
    }
}

impl fmt::Display for DmaImage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} {} fd:{:?}",
            self.width, self.height, self.format, self.fd
        )
    }
}
