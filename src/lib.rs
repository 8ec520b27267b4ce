// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # EdgeVision RT Library
//!
//! Native frame processing for camera previews. A host (a managed runtime,
//! a V4L2 capture loop, or plain Rust code) owns two pixel buffers; this
//! library leases both, runs a pixel kernel from the input into the output,
//! and always hands the leases back before returning a classified result.
//!
//! ## Features
//!
//! - **Pixel Kernels**: passthrough, grayscale, neighbour-difference edge
//!   detection and a Canny-style edge mask over tightly packed RGBA.
//! - **Frame Gateway**: metadata checks, scoped leases and a panic boundary
//!   around every kernel call.
//! - **C ABI**: status-code entry points for hosts that describe bitmaps
//!   through a small callback vtable, plus a log bridge into the host log.
//! - **DMA Buffers**: CMA heap allocation and V4L2 camera buffers mapped on
//!   demand through the same lease interface.
//! - **JPEG Encoding**: turbojpeg with SIMD.
//!
//! ## Example
//!
//! ```
//! use edgevision_rt::{
//!     gateway::process_frame,
//!     image::FrameDimensions,
//!     kernel::ProcessingMode,
//!     lease::MemoryBuffer,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dims = FrameDimensions::new(320, 240);
//! let input = MemoryBuffer::from_pixels(dims, vec![128; dims.byte_len()])?;
//! let mut output = MemoryBuffer::new(dims);
//!
//! process_frame(&input, &output, ProcessingMode::Grayscale)?;
//! assert_eq!(&output.pixels()[..4], &[128, 128, 128, 255]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Requirements
//!
//! - **Linux**: Kernel 5.10+ with V4L2 and DMA heap support for the `dma`
//!   module and the camera binary
//! - The kernels, gateway and C ABI are portable
//!
//! ## Safety
//!
//! `unsafe` is confined to the lease boundary (`lease`, `dma`) and the C ABI
//! (`ffi`). Kernels only ever see safe slices.

pub mod convert;
pub mod dma;
pub mod ffi;
pub mod gateway;
pub mod image;
pub mod kernel;
pub mod lease;
pub mod logging;
pub mod stats;
