// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Camera colour conversion into the RGBA layout the kernels expect.

use crate::{
    image::{FrameDimensions, RGBA_CHANNELS},
    kernel::{KernelError, Result},
};

/// Converts one BT.601 limited-range YUV sample to RGB.
#[inline]
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let clip = |x: i32| (x >> 8).clamp(0, 255) as u8;
    [
        clip(298 * c + 409 * e + 128),
        clip(298 * c - 100 * d - 208 * e + 128),
        clip(298 * c + 516 * d + 128),
    ]
}

/// Converts a packed YUYV 4:2:2 frame into opaque RGBA.
///
/// `src` holds `2 * width` bytes per row. For odd widths the last pixel of
/// each row has no chroma pair and is converted as neutral grey chroma.
pub fn yuyv_to_rgba(src: &[u8], dst: &mut [u8], dims: FrameDimensions) -> Result<()> {
    let w = dims.width as usize;
    let h = dims.height as usize;
    let src_row = 2 * w;

    if src.len() < src_row * h {
        return Err(KernelError::SizeMismatch {
            expected: src_row * h,
            actual: src.len(),
        });
    }
    if dst.len() != dims.byte_len() {
        return Err(KernelError::SizeMismatch {
            expected: dims.byte_len(),
            actual: dst.len(),
        });
    }
    if w == 0 {
        return Ok(());
    }

    for (s, d) in src
        .chunks_exact(src_row)
        .zip(dst.chunks_exact_mut(w * RGBA_CHANNELS))
        .take(h)
    {
        let pairs = s.chunks_exact(4);
        let tail = pairs.remainder();
        let mut out = d.chunks_exact_mut(RGBA_CHANNELS);

        for p in pairs {
            let (y0, u, y1, v) = (p[0], p[1], p[2], p[3]);
            for y in [y0, y1] {
                if let Some(px) = out.next() {
                    px[..3].copy_from_slice(&yuv_to_rgb(y, u, v));
                    px[3] = 255;
                }
            }
        }
        if let (Some(&y), Some(px)) = (tail.first(), out.next()) {
            px[..3].copy_from_slice(&yuv_to_rgb(y, 128, 128));
            px[3] = 255;
        }
    }
    Ok(())
}
