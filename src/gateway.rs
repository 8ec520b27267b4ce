// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Frame processing gateway.
//!
//! Runs one frame end to end: read both buffers' metadata, lease input then
//! output, validate, run a kernel behind a panic boundary, release both
//! leases, and classify the outcome. Nothing here unwinds to the caller.
//!
//! Callers must not submit overlapping buffer pairs from several threads at
//! once. On failure the output buffer's contents are unspecified; there is
//! no rollback to the previous frame.

use crate::{
    image::{FrameDimensions, PixelFormat, RGBA_CHANNELS},
    kernel::{self, CannyParams, KernelError, ProcessingMode},
    lease::{BufferMetadata, HostError, Lease, PixelBufferHandle},
};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};
use tracing::{debug, error, instrument, warn};

pub const STATUS_OK: i32 = 0;
pub const STATUS_METADATA_UNAVAILABLE: i32 = -1;
pub const STATUS_LEASE_FAILED: i32 = -2;
pub const STATUS_DIMENSION_MISMATCH: i32 = -3;
pub const STATUS_INVALID_MODE: i32 = -4;
pub const STATUS_KERNEL_FAULT: i32 = -5;
pub const STATUS_UNSUPPORTED_FORMAT: i32 = -6;
pub const STATUS_BUFFER_TOO_SMALL: i32 = -7;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessingError {
    #[error("buffer metadata unavailable: {0}")]
    MetadataUnavailable(#[source] HostError),

    #[error("pixel lease denied: {0}")]
    LeaseAcquisitionFailed(#[source] HostError),

    #[error(
        "dimension mismatch: input {}x{}, output {}x{}",
        .input.0, .input.1, .output.0, .output.1
    )]
    DimensionMismatch { input: (i32, i32), output: (i32, i32) },

    #[error("unsupported pixel format {format} with stride {stride}")]
    UnsupportedFormat { format: PixelFormat, stride: u32 },

    #[error("leased memory too small: expected {expected} bytes, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },

    #[error("invalid processing mode {0}")]
    InvalidMode(i32),

    #[error("kernel fault: {0}")]
    KernelFault(String),
}

impl ProcessingError {
    /// Status code reported across the C boundary.
    pub fn status_code(&self) -> i32 {
        match self {
            ProcessingError::MetadataUnavailable(_) => STATUS_METADATA_UNAVAILABLE,
            ProcessingError::LeaseAcquisitionFailed(_) => STATUS_LEASE_FAILED,
            ProcessingError::DimensionMismatch { .. } => STATUS_DIMENSION_MISMATCH,
            ProcessingError::UnsupportedFormat { .. } => STATUS_UNSUPPORTED_FORMAT,
            ProcessingError::BufferTooSmall { .. } => STATUS_BUFFER_TOO_SMALL,
            ProcessingError::InvalidMode(_) => STATUS_INVALID_MODE,
            ProcessingError::KernelFault(_) => STATUS_KERNEL_FAULT,
        }
    }

    /// Whether the same call may succeed on a later frame without the
    /// caller changing anything.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProcessingError::MetadataUnavailable(_) | ProcessingError::LeaseAcquisitionFailed(_)
        )
    }
}

impl From<KernelError> for ProcessingError {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::UnknownMode(code) => ProcessingError::InvalidMode(code),
            other => ProcessingError::KernelFault(other.to_string()),
        }
    }
}

/// Processes frames with a fixed kernel configuration.
///
/// Holds no per-frame state, so one processor can serve any number of
/// independent calls.
///
/// # Example
///
/// ```
/// use edgevision_rt::{
///     gateway::FrameProcessor,
///     image::FrameDimensions,
///     kernel::ProcessingMode,
///     lease::MemoryBuffer,
/// };
///
/// let dims = FrameDimensions::new(4, 4);
/// let input = MemoryBuffer::from_pixels(dims, vec![100; dims.byte_len()]).unwrap();
/// let mut output = MemoryBuffer::new(dims);
///
/// FrameProcessor::default()
///     .process(&input, &output, ProcessingMode::EdgeDetect)
///     .unwrap();
/// assert!(output.pixels().chunks(4).all(|p| p == [0, 0, 0, 255]));
/// ```
#[derive(Clone, Debug, Default)]
pub struct FrameProcessor {
    canny: CannyParams,
}

impl FrameProcessor {
    pub fn new(canny: CannyParams) -> Self {
        Self { canny }
    }

    pub fn canny(&self) -> &CannyParams {
        &self.canny
    }

    /// Runs the kernel selected by `mode` from `input` into `output`.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::MetadataUnavailable`] if either host cannot
    ///   describe its buffer; nothing has been leased.
    /// - [`ProcessingError::LeaseAcquisitionFailed`] if either lease is
    ///   denied; a held input lease is released first.
    /// - [`ProcessingError::DimensionMismatch`],
    ///   [`ProcessingError::UnsupportedFormat`] or
    ///   [`ProcessingError::BufferTooSmall`] when validation fails.
    /// - [`ProcessingError::KernelFault`] if the kernel errors or panics.
    #[instrument(skip_all, fields(mode = %mode))]
    pub fn process<I, O>(
        &self,
        input: &I,
        output: &O,
        mode: ProcessingMode,
    ) -> Result<(), ProcessingError>
    where
        I: PixelBufferHandle + ?Sized,
        O: PixelBufferHandle + ?Sized,
    {
        let canny = &self.canny;
        self.process_with(input, output, |src, dst, dims| {
            mode.apply(src, dst, dims, canny)
        })
    }

    /// Same contract as [`process`](FrameProcessor::process) with a caller
    /// supplied kernel in place of a [`ProcessingMode`].
    pub fn process_with<I, O, F>(
        &self,
        input: &I,
        output: &O,
        run: F,
    ) -> Result<(), ProcessingError>
    where
        I: PixelBufferHandle + ?Sized,
        O: PixelBufferHandle + ?Sized,
        F: FnOnce(&[u8], &mut [u8], FrameDimensions) -> kernel::Result<()>,
    {
        let input_meta = input
            .metadata()
            .map_err(ProcessingError::MetadataUnavailable)?;
        let output_meta = output
            .metadata()
            .map_err(ProcessingError::MetadataUnavailable)?;

        let input_lease = Lease::acquire(input).map_err(|e| {
            warn!(%e, "input lease denied");
            ProcessingError::LeaseAcquisitionFailed(e)
        })?;
        let mut output_lease = Lease::acquire(output).map_err(|e| {
            warn!(%e, "output lease denied");
            ProcessingError::LeaseAcquisitionFailed(e)
        })?;

        let dims = validate(&input_meta, &output_meta)?;
        let expected = dims.byte_len();
        for actual in [input_lease.len(), output_lease.len()] {
            if actual < expected {
                return Err(ProcessingError::BufferTooSmall { expected, actual });
            }
        }

        let src = &input_lease.as_slice()[..expected];
        let dst = &mut output_lease.as_slice_mut()[..expected];

        match panic::catch_unwind(AssertUnwindSafe(|| run(src, dst, dims))) {
            Ok(Ok(())) => {
                debug!(%dims, "frame processed");
                Ok(())
            }
            Ok(Err(err)) => {
                error!(%err, "kernel failed");
                Err(ProcessingError::KernelFault(err.to_string()))
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                error!(%msg, "kernel panicked");
                Err(ProcessingError::KernelFault(msg))
            }
        }
    }
}

/// Processes one frame with the default kernel configuration.
pub fn process_frame<I, O>(input: &I, output: &O, mode: ProcessingMode) -> Result<(), ProcessingError>
where
    I: PixelBufferHandle + ?Sized,
    O: PixelBufferHandle + ?Sized,
{
    FrameProcessor::default().process(input, output, mode)
}

fn validate(
    input: &BufferMetadata,
    output: &BufferMetadata,
) -> Result<FrameDimensions, ProcessingError> {
    let mismatch = || ProcessingError::DimensionMismatch {
        input: (input.width, input.height),
        output: (output.width, output.height),
    };

    let (Some(in_dims), Some(out_dims)) = (input.dimensions(), output.dimensions()) else {
        return Err(mismatch());
    };
    if in_dims != out_dims {
        return Err(mismatch());
    }

    let row = in_dims.width as usize * RGBA_CHANNELS;
    for meta in [input, output] {
        if meta.format != PixelFormat::Rgba8888 || meta.stride as usize != row {
            return Err(ProcessingError::UnsupportedFormat {
                format: meta.format,
                stride: meta.stride,
            });
        }
    }
    Ok(in_dims)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "kernel panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_distinct() {
        let host = HostError::new(-1, "x");
        let errors = [
            ProcessingError::MetadataUnavailable(host.clone()),
            ProcessingError::LeaseAcquisitionFailed(host),
            ProcessingError::DimensionMismatch {
                input: (1, 1),
                output: (2, 2),
            },
            ProcessingError::UnsupportedFormat {
                format: PixelFormat::Rgb565,
                stride: 2,
            },
            ProcessingError::BufferTooSmall {
                expected: 4,
                actual: 0,
            },
            ProcessingError::InvalidMode(9),
            ProcessingError::KernelFault("boom".into()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(|e| e.status_code()).collect();
        assert!(codes.iter().all(|c| *c < STATUS_OK));
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_retryable() {
        let host = HostError::new(HostError::BUSY, "busy");
        assert!(ProcessingError::LeaseAcquisitionFailed(host).is_retryable());
        assert!(!ProcessingError::InvalidMode(7).is_retryable());
    }

    #[test]
    fn test_kernel_error_conversion() {
        assert_eq!(
            ProcessingError::from(KernelError::UnknownMode(5)),
            ProcessingError::InvalidMode(5)
        );
        assert!(matches!(
            ProcessingError::from(KernelError::SizeMismatch {
                expected: 4,
                actual: 3
            }),
            ProcessingError::KernelFault(_)
        ));
    }

    #[test]
    fn test_validate_rejects_padding() {
        let dims = FrameDimensions::new(4, 4);
        let good = BufferMetadata::rgba(dims);
        let padded = BufferMetadata {
            stride: 32,
            ..good
        };
        assert_eq!(validate(&good, &good), Ok(dims));
        assert_eq!(
            validate(&good, &padded),
            Err(ProcessingError::UnsupportedFormat {
                format: PixelFormat::Rgba8888,
                stride: 32
            })
        );
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("bad pixel");
        assert_eq!(panic_message(payload.as_ref()), "bad pixel");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
    }
}
