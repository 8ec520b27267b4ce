// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! C ABI for managed-runtime hosts.
//!
//! A host describes each bitmap with an [`EvHostBitmap`] vtable (the same
//! shape as the Android NDK `AndroidBitmap_getInfo` / `lockPixels` /
//! `unlockPixels` trio) and calls [`edgevision_process_frame`]. Every entry
//! point returns a status code and never unwinds into the host.

use crate::{
    gateway::{
        FrameProcessor, ProcessingError, STATUS_BUFFER_TOO_SMALL, STATUS_DIMENSION_MISMATCH,
        STATUS_INVALID_MODE, STATUS_KERNEL_FAULT, STATUS_LEASE_FAILED,
        STATUS_METADATA_UNAVAILABLE, STATUS_OK, STATUS_UNSUPPORTED_FORMAT,
    },
    image::{FrameDimensions, PixelFormat},
    kernel::{CannyParams, ProcessingMode},
    lease::{BufferMetadata, HostError, PixelBufferHandle, RawMemoryView},
    logging::{self, HostLogFn},
};
use std::{
    cell::Cell,
    ffi::{c_char, c_int, c_void},
    panic::{self, AssertUnwindSafe},
    ptr::null_mut,
    slice::{from_raw_parts, from_raw_parts_mut},
};
use tracing::warn;

/// A required pointer argument was null.
pub const STATUS_NULL_HANDLE: c_int = -8;

/// A global logger was already installed.
pub const STATUS_LOGGER_INSTALLED: c_int = -9;

/// Bitmap description filled in by the host.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default)]
pub struct EvBitmapInfo {
    pub width: u32,
    pub height: u32,
    /// Bytes per row
    pub stride: u32,
    /// Host format code, `1` for RGBA 8888
    pub format: i32,
    pub flags: u32,
}

pub type GetInfoFn = unsafe extern "C" fn(*mut c_void, *mut EvBitmapInfo) -> c_int;
pub type LockPixelsFn = unsafe extern "C" fn(*mut c_void, *mut *mut c_void) -> c_int;
pub type UnlockPixelsFn = unsafe extern "C" fn(*mut c_void) -> c_int;

/// Host bitmap vtable. Each callback returns `0` on success and receives
/// `context` as its first argument.
#[repr(C)]
pub struct EvHostBitmap {
    pub context: *mut c_void,
    pub get_info: Option<GetInfoFn>,
    pub lock_pixels: Option<LockPixelsFn>,
    pub unlock_pixels: Option<UnlockPixelsFn>,
}

impl EvHostBitmap {
    fn info(&self) -> Result<EvBitmapInfo, HostError> {
        let get_info = self
            .get_info
            .ok_or_else(|| HostError::new(-1, "host bitmap has no get_info"))?;
        let mut info = EvBitmapInfo::default();
        let rc = unsafe { get_info(self.context, &mut info) };
        if rc != 0 {
            return Err(HostError::new(rc, "get_info failed"));
        }
        Ok(info)
    }
}

/// One frame's view of an [`EvHostBitmap`]. The info read for metadata is
/// kept so the lease is sized from the same description that was validated.
struct HostBitmap<'a> {
    vtable: &'a EvHostBitmap,
    info: Cell<Option<EvBitmapInfo>>,
}

impl<'a> HostBitmap<'a> {
    fn new(vtable: &'a EvHostBitmap) -> Self {
        Self {
            vtable,
            info: Cell::new(None),
        }
    }

    fn info(&self) -> Result<EvBitmapInfo, HostError> {
        if let Some(info) = self.info.get() {
            return Ok(info);
        }
        let info = self.vtable.info()?;
        self.info.set(Some(info));
        Ok(info)
    }
}

impl PixelBufferHandle for HostBitmap<'_> {
    fn metadata(&self) -> Result<BufferMetadata, HostError> {
        let info = self.info()?;
        Ok(BufferMetadata {
            width: i32::try_from(info.width).unwrap_or(-1),
            height: i32::try_from(info.height).unwrap_or(-1),
            stride: info.stride,
            format: PixelFormat::from_host_code(info.format),
        })
    }

    fn acquire_lease(&self) -> Result<RawMemoryView, HostError> {
        let info = self.info()?;
        let len = (info.stride as usize)
            .checked_mul(info.height as usize)
            .ok_or_else(|| HostError::new(-1, "bitmap size overflows"))?;
        let lock_pixels = self
            .vtable
            .lock_pixels
            .ok_or_else(|| HostError::new(-1, "host bitmap has no lock_pixels"))?;

        let mut pixels: *mut c_void = null_mut();
        let rc = unsafe { lock_pixels(self.vtable.context, &mut pixels) };
        if rc != 0 {
            return Err(HostError::new(rc, "lock_pixels failed"));
        }

        // SAFETY: the host keeps locked pixels valid until unlock_pixels.
        Ok(unsafe { RawMemoryView::new(pixels.cast::<u8>(), len) })
    }

    fn release_lease(&self) {
        let Some(unlock_pixels) = self.vtable.unlock_pixels else {
            warn!("host bitmap has no unlock_pixels");
            return;
        };
        let rc = unsafe { unlock_pixels(self.vtable.context) };
        if rc != 0 {
            warn!(rc, "unlock_pixels failed");
        }
    }
}

fn guarded(f: impl FnOnce() -> Result<(), ProcessingError>) -> c_int {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => STATUS_OK,
        Ok(Err(err)) => {
            warn!(%err, "frame rejected");
            err.status_code()
        }
        Err(_) => STATUS_KERNEL_FAULT,
    }
}

/// Processes one frame from `input` into `output`.
///
/// `mode` is a raw [`ProcessingMode`] code; unknown codes fall back to
/// grayscale.
///
/// # Safety
///
/// `input` and `output` must be null or point to valid [`EvHostBitmap`]s
/// whose callbacks honour the vtable contract for the duration of the call.
/// `get_info` is called once per bitmap; the locked pixels must cover
/// `stride * height` bytes of that description.
#[no_mangle]
pub unsafe extern "C" fn edgevision_process_frame(
    input: *const EvHostBitmap,
    output: *const EvHostBitmap,
    mode: c_int,
) -> c_int {
    let (Some(input), Some(output)) = (input.as_ref(), output.as_ref()) else {
        return STATUS_NULL_HANDLE;
    };
    let (input, output) = (HostBitmap::new(input), HostBitmap::new(output));
    guarded(|| FrameProcessor::default().process(&input, &output, ProcessingMode::from_raw(mode)))
}

/// Processes already-locked RGBA pixels. `src` and `dst` may be the same
/// buffer, in which case the input is copied before processing.
///
/// # Safety
///
/// `src` must be readable and `dst` writable for `width * height * 4` bytes,
/// and nothing else may access them during the call.
#[no_mangle]
pub unsafe extern "C" fn edgevision_process_pixels(
    src: *const u8,
    dst: *mut u8,
    width: c_int,
    height: c_int,
    mode: c_int,
) -> c_int {
    if src.is_null() || dst.is_null() {
        return STATUS_NULL_HANDLE;
    }
    let (Ok(width), Ok(height)) = (u32::try_from(width), u32::try_from(height)) else {
        return STATUS_DIMENSION_MISMATCH;
    };
    let dims = FrameDimensions::new(width, height);
    let Some(len) = dims.checked_byte_len() else {
        return STATUS_DIMENSION_MISMATCH;
    };
    let mode = ProcessingMode::from_raw(mode);

    guarded(|| {
        let copy;
        let input = if src == dst.cast_const() {
            copy = from_raw_parts(src, len).to_vec();
            copy.as_slice()
        } else {
            from_raw_parts(src, len)
        };
        let output = from_raw_parts_mut(dst, len);
        mode.apply(input, output, dims, &CannyParams::default())
            .map_err(ProcessingError::from)
    })
}

/// Static description of a status code. Never null.
#[no_mangle]
pub extern "C" fn edgevision_status_message(code: c_int) -> *const c_char {
    let msg = match code {
        STATUS_OK => c"ok",
        STATUS_METADATA_UNAVAILABLE => c"buffer metadata unavailable",
        STATUS_LEASE_FAILED => c"pixel lease denied",
        STATUS_DIMENSION_MISMATCH => c"input and output dimensions differ",
        STATUS_INVALID_MODE => c"invalid processing mode",
        STATUS_KERNEL_FAULT => c"kernel fault",
        STATUS_UNSUPPORTED_FORMAT => c"unsupported pixel format",
        STATUS_BUFFER_TOO_SMALL => c"leased memory too small",
        STATUS_NULL_HANDLE => c"null handle",
        STATUS_LOGGER_INSTALLED => c"logger already installed",
        _ => c"unknown status",
    };
    msg.as_ptr()
}

#[no_mangle]
pub extern "C" fn edgevision_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr().cast()
}

/// Routes library logging to `callback` for events at `min_priority` and
/// above (Android priorities, 2 = verbose … 6 = error).
#[no_mangle]
pub extern "C" fn edgevision_set_log_callback(
    callback: Option<HostLogFn>,
    min_priority: c_int,
) -> c_int {
    let Some(callback) = callback else {
        return STATUS_NULL_HANDLE;
    };
    match logging::install_host_logger(callback, logging::level_filter(min_priority)) {
        Ok(()) => STATUS_OK,
        Err(_) => STATUS_LOGGER_INSTALLED,
    }
}
