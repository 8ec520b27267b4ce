// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! RGBA pixel kernels.
//!
//! Every kernel reads a tightly packed RGBA frame and writes a frame of the
//! same dimensions. Kernels are total over well-formed input: the only error
//! they report is a slice whose length does not match the dimensions.
//! Frames narrower or shorter than 3 pixels are accepted; the neighbourhood
//! loops are simply not entered.
//!
//! | Mode | Output |
//! |---|---|
//! | [`passthrough`] | byte-for-byte copy |
//! | [`grayscale`] | `(l, l, l, 255)` with `l = (R + G + B) / 3` |
//! | [`edge_detect`] | neighbour-difference strength, black opaque border |
//! | [`canny_style`] | blur, Sobel, non-maximum suppression, hysteresis |

use crate::image::{FrameDimensions, RGBA_CHANNELS};
use core::fmt;
use tracing::warn;

pub type Result<T> = std::result::Result<T, KernelError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("unknown processing mode {0}")]
    UnknownMode(i32),
}

const OPAQUE: u8 = 255;

/// tan(22.5°), boundary between axis-aligned and diagonal directions.
const TAN_22_5: f32 = 0.414_213_56;

/// Kernel selector chosen by the caller for each frame.
///
/// The discriminants are the raw codes hosts pass across the C boundary.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ProcessingMode {
    /// Blur, gradient and hysteresis edge mask
    CannyStyle = 0,
    /// Unweighted RGB average
    Grayscale = 1,
    /// Direct neighbour-difference gradient magnitude
    EdgeDetect = 2,
    /// Copy input to output unchanged
    Passthrough = 3,
}

impl ProcessingMode {
    pub const ALL: [ProcessingMode; 4] = [
        ProcessingMode::CannyStyle,
        ProcessingMode::Grayscale,
        ProcessingMode::EdgeDetect,
        ProcessingMode::Passthrough,
    ];

    /// Kernel used when a host sends a selector this library does not know.
    pub const FALLBACK: ProcessingMode = ProcessingMode::Grayscale;

    /// Lenient conversion from a raw selector: unknown codes fall back to
    /// [`ProcessingMode::FALLBACK`] instead of failing.
    pub fn from_raw(code: i32) -> Self {
        Self::try_from(code).unwrap_or_else(|_| {
            warn!(code, fallback = %Self::FALLBACK, "unknown processing mode");
            Self::FALLBACK
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            ProcessingMode::CannyStyle => "canny",
            ProcessingMode::Grayscale => "grayscale",
            ProcessingMode::EdgeDetect => "edge",
            ProcessingMode::Passthrough => "passthrough",
        }
    }

    /// Runs the kernel selected by `self`.
    pub fn apply(
        self,
        src: &[u8],
        dst: &mut [u8],
        dims: FrameDimensions,
        canny: &CannyParams,
    ) -> Result<()> {
        match self {
            ProcessingMode::CannyStyle => canny_style(src, dst, dims, canny),
            ProcessingMode::Grayscale => grayscale(src, dst, dims),
            ProcessingMode::EdgeDetect => edge_detect(src, dst, dims),
            ProcessingMode::Passthrough => passthrough(src, dst, dims),
        }
    }
}

impl TryFrom<i32> for ProcessingMode {
    type Error = KernelError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(ProcessingMode::CannyStyle),
            1 => Ok(ProcessingMode::Grayscale),
            2 => Ok(ProcessingMode::EdgeDetect),
            3 => Ok(ProcessingMode::Passthrough),
            other => Err(KernelError::UnknownMode(other)),
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tuning for [`canny_style`]. Thresholds are on the L1 Sobel magnitude of
/// the blurred 8-bit luminance plane.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CannyParams {
    pub low_threshold: f32,
    pub high_threshold: f32,
    /// Half-width of the Gaussian kernel; the kernel has `2 * radius + 1` taps.
    pub blur_radius: usize,
    pub blur_sigma: f32,
}

impl Default for CannyParams {
    fn default() -> Self {
        Self {
            low_threshold: 50.0,
            high_threshold: 150.0,
            blur_radius: 2,
            blur_sigma: 1.5,
        }
    }
}

fn check_len(len: usize, dims: FrameDimensions) -> Result<()> {
    let expected = dims.byte_len();
    if len != expected {
        return Err(KernelError::SizeMismatch {
            expected,
            actual: len,
        });
    }
    Ok(())
}

fn check_frames(src: &[u8], dst: &[u8], dims: FrameDimensions) -> Result<()> {
    check_len(src.len(), dims)?;
    check_len(dst.len(), dims)
}

/// Unweighted average of the colour channels, truncated.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((r as u16 + g as u16 + b as u16) / 3) as u8
}

pub fn passthrough(src: &[u8], dst: &mut [u8], dims: FrameDimensions) -> Result<()> {
    check_frames(src, dst, dims)?;
    dst.copy_from_slice(src);
    Ok(())
}

/// Replaces every pixel with its luminance. Alpha is always written opaque,
/// so the output is a fixed point of this kernel.
pub fn grayscale(src: &[u8], dst: &mut [u8], dims: FrameDimensions) -> Result<()> {
    check_frames(src, dst, dims)?;
    for (s, d) in src
        .chunks_exact(RGBA_CHANNELS)
        .zip(dst.chunks_exact_mut(RGBA_CHANNELS))
    {
        let l = luminance(s[0], s[1], s[2]);
        d[..3].fill(l);
        d[3] = OPAQUE;
    }
    Ok(())
}

/// Cheap gradient magnitude: `|L(right) - L(left)| + |L(down) - L(up)|`,
/// clamped to 255, for interior pixels only.
///
/// The output frame is cleared to opaque black first, so border rows and
/// columns come out as `(0, 0, 0, 255)`. There is no centre term: a lone
/// bright pixel produces zero at its own position and a response in its
/// four neighbours.
pub fn edge_detect(src: &[u8], dst: &mut [u8], dims: FrameDimensions) -> Result<()> {
    check_frames(src, dst, dims)?;
    for d in dst.chunks_exact_mut(RGBA_CHANNELS) {
        d.copy_from_slice(&[0, 0, 0, OPAQUE]);
    }

    let w = dims.width as usize;
    let h = dims.height as usize;
    if w < 3 || h < 3 {
        return Ok(());
    }

    let lum = |x: usize, y: usize| -> i16 {
        let i = (y * w + x) * RGBA_CHANNELS;
        luminance(src[i], src[i + 1], src[i + 2]) as i16
    };

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let gx = (lum(x + 1, y) - lum(x - 1, y)).abs();
            let gy = (lum(x, y + 1) - lum(x, y - 1)).abs();
            let strength = (gx + gy).min(255) as u8;

            let i = (y * w + x) * RGBA_CHANNELS;
            dst[i..i + 3].fill(strength);
        }
    }
    Ok(())
}

/// Canny-style binary edge mask replicated into RGB with opaque alpha.
pub fn canny_style(
    src: &[u8],
    dst: &mut [u8],
    dims: FrameDimensions,
    params: &CannyParams,
) -> Result<()> {
    check_frames(src, dst, dims)?;
    let w = dims.width as usize;
    let h = dims.height as usize;

    let luma: Vec<u8> = src
        .chunks_exact(RGBA_CHANNELS)
        .map(|p| luminance(p[0], p[1], p[2]))
        .collect();
    let blurred = gaussian_blur(&luma, w, h, params.blur_radius, params.blur_sigma);
    let (mag, dir) = gradients_and_directions(&blurred, w, h);
    let suppressed = non_max_suppression(w, h, &mag, &dir);

    let low = params.low_threshold;
    let high = params.high_threshold.max(low);
    let mask = hysteresis(w, h, &suppressed, low, high);

    for (m, d) in mask.iter().zip(dst.chunks_exact_mut(RGBA_CHANNELS)) {
        d[..3].fill(*m);
        d[3] = OPAQUE;
    }
    Ok(())
}

/// Normalised 1D Gaussian with `2 * radius + 1` taps.
///
/// A non-positive `sigma` is derived from the kernel size the same way
/// OpenCV does.
pub fn gaussian_kernel_1d(radius: usize, sigma: f32) -> Vec<f32> {
    let size = 2 * radius + 1;
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
    };
    let sigma2 = sigma * sigma;

    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-(x * x) / (2.0 * sigma2)).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    if sum != 0.0 {
        for v in &mut kernel {
            *v /= sum;
        }
    }
    kernel
}

/// Separable Gaussian blur with replicated borders, rounded back to 8 bits.
fn gaussian_blur(src: &[u8], w: usize, h: usize, radius: usize, sigma: f32) -> Vec<u8> {
    let kernel = gaussian_kernel_1d(radius, sigma);
    let r = radius as isize;

    let mut horizontal = vec![0.0f32; w * h];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = (x as isize + k as isize - r).clamp(0, w as isize - 1) as usize;
                acc += row[sx] as f32 * weight;
            }
            horizontal[y * w + x] = acc;
        }
    }

    let mut out = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y as isize + k as isize - r).clamp(0, h as isize - 1) as usize;
                acc += horizontal[sy * w + x] * weight;
            }
            out[y * w + x] = acc.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// 3x3 Sobel on interior pixels. Returns the L1 magnitude and the direction
/// quantised to 0 (0°), 1 (45°), 2 (90°) or 3 (135°).
fn gradients_and_directions(src: &[u8], w: usize, h: usize) -> (Vec<f32>, Vec<u8>) {
    let mut magnitude = vec![0.0f32; w * h];
    let mut direction = vec![0u8; w * h];
    if w < 3 || h < 3 {
        return (magnitude, direction);
    }

    for y in 1..h - 1 {
        let r0 = &src[(y - 1) * w..y * w];
        let r1 = &src[y * w..(y + 1) * w];
        let r2 = &src[(y + 1) * w..(y + 2) * w];

        for x in 1..w - 1 {
            let p = |row: &[u8], dx: usize| row[x + dx - 1] as i32;

            let gx = -p(r0, 0) + p(r0, 2) - 2 * p(r1, 0) + 2 * p(r1, 2) - p(r2, 0) + p(r2, 2);
            let gy = -p(r0, 0) - 2 * p(r0, 1) - p(r0, 2) + p(r2, 0) + 2 * p(r2, 1) + p(r2, 2);

            let abs_gx = gx.abs() as f32;
            let abs_gy = gy.abs() as f32;
            let idx = y * w + x;
            magnitude[idx] = abs_gx + abs_gy;

            direction[idx] = if abs_gy <= abs_gx * TAN_22_5 {
                0
            } else if abs_gx <= abs_gy * TAN_22_5 {
                2
            } else if (gx > 0) == (gy > 0) {
                1
            } else {
                3
            };
        }
    }
    (magnitude, direction)
}

fn non_max_suppression(w: usize, h: usize, mag: &[f32], dir: &[u8]) -> Vec<f32> {
    let mut out = vec![0.0f32; w * h];
    if w < 3 || h < 3 {
        return out;
    }

    for y in 1..h - 1 {
        let above = (y - 1) * w;
        let row = y * w;
        let below = (y + 1) * w;

        for x in 1..w - 1 {
            let m = mag[row + x];
            let (m1, m2) = match dir[row + x] {
                0 => (mag[row + x - 1], mag[row + x + 1]),
                1 => (mag[above + x + 1], mag[below + x - 1]),
                2 => (mag[above + x], mag[below + x]),
                _ => (mag[above + x - 1], mag[below + x + 1]),
            };
            if m >= m1 && m >= m2 {
                out[row + x] = m;
            }
        }
    }
    out
}

/// Double threshold plus 8-connected edge tracking from strong pixels.
fn hysteresis(w: usize, h: usize, suppressed: &[f32], low: f32, high: f32) -> Vec<u8> {
    const STRONG: u8 = 255;
    const WEAK: u8 = 75;

    let mut state = vec![0u8; w * h];
    let mut stack = Vec::new();

    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let idx = y * w + x;
            let v = suppressed[idx];
            if v >= high {
                state[idx] = STRONG;
                stack.push((x, y));
            } else if v >= low {
                state[idx] = WEAK;
            }
        }
    }

    while let Some((x, y)) = stack.pop() {
        for ny in y - 1..=y + 1 {
            for nx in x - 1..=x + 1 {
                let nidx = ny * w + nx;
                if state[nidx] == WEAK {
                    state[nidx] = STRONG;
                    stack.push((nx, ny));
                }
            }
        }
    }

    state
        .into_iter()
        .map(|s| if s == STRONG { 255 } else { 0 })
        .collect()
}
