// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use core::fmt;
use std::{error::Error, io};
use turbojpeg::OwnedBuf;
use videostream::fourcc::FourCC;

/// Number of interleaved 8-bit channels in every frame the kernels touch.
pub const RGBA_CHANNELS: usize = 4;

/// RGB 24-bit pixel format (8 bits per channel, no alpha)
pub const RGB3: FourCC = FourCC(*b"RGB3");

/// RGBX 32-bit pixel format (8 bits per channel, unused alpha)
pub const RGBX: FourCC = FourCC(*b"RGBX");

/// RGBA 32-bit pixel format (8 bits per channel, with alpha)
pub const RGBA: FourCC = FourCC(*b"RGBA");

/// YUYV 4:2:2 YUV packed format (common camera output format)
pub const YUYV: FourCC = FourCC(*b"YUYV");

/// NV12 4:2:0 YUV semi-planar format
pub const NV12: FourCC = FourCC(*b"NV12");

/// Host bitmap format code for 32-bit RGBA.
pub const HOST_FORMAT_RGBA_8888: i32 = 1;

/// Host bitmap format code for 16-bit RGB 5:6:5.
pub const HOST_FORMAT_RGB_565: i32 = 4;

/// Host bitmap format code for 8-bit alpha masks.
pub const HOST_FORMAT_A_8: i32 = 8;

/// Pixel layout of a buffer as reported by its owner.
///
/// Only [`PixelFormat::Rgba8888`] is accepted by the frame gateway; the other
/// variants exist so that hosts and camera buffers can describe themselves
/// and be rejected with a precise error instead of being misread.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// R, G, B, A interleaved, 8 bits each
    Rgba8888,
    /// R, G, B, X interleaved, alpha byte unused
    Rgbx8888,
    /// R, G, B interleaved, no alpha
    Rgb888,
    /// 16-bit packed RGB 5:6:5
    Rgb565,
    /// Single 8-bit alpha channel
    Alpha8,
    /// Packed YUV 4:2:2
    Yuyv,
    /// Semi-planar YUV 4:2:0
    Nv12,
    /// Anything else, carrying the raw code it was reported with
    Unknown(u32),
}

impl PixelFormat {
    /// Maps a host bitmap format code onto a pixel format.
    pub fn from_host_code(code: i32) -> Self {
        match code {
            HOST_FORMAT_RGBA_8888 => PixelFormat::Rgba8888,
            HOST_FORMAT_RGB_565 => PixelFormat::Rgb565,
            HOST_FORMAT_A_8 => PixelFormat::Alpha8,
            other => PixelFormat::Unknown(other as u32),
        }
    }

    /// Bytes per row of an unpadded buffer of this format, `None` when the
    /// layout is not known.
    pub const fn row_stride(self, width: u32) -> Option<usize> {
        let width = width as usize;
        match self {
            PixelFormat::Rgba8888 | PixelFormat::Rgbx8888 => Some(4 * width),
            PixelFormat::Rgb888 => Some(3 * width),
            PixelFormat::Rgb565 | PixelFormat::Yuyv => Some(2 * width),
            PixelFormat::Alpha8 => Some(width),
            PixelFormat::Nv12 => Some(width / 2 + width),
            PixelFormat::Unknown(_) => None,
        }
    }

    /// Total size in bytes of an unpadded `width` x `height` buffer.
    pub const fn frame_size(self, width: u32, height: u32) -> Option<usize> {
        match self.row_stride(width) {
            Some(stride) => Some(stride * height as usize),
            None => None,
        }
    }
}

impl From<FourCC> for PixelFormat {
    fn from(value: FourCC) -> Self {
        [
            (RGBA, PixelFormat::Rgba8888),
            (RGBX, PixelFormat::Rgbx8888),
            (RGB3, PixelFormat::Rgb888),
            (YUYV, PixelFormat::Yuyv),
            (NV12, PixelFormat::Nv12),
        ]
        .into_iter()
        .find_map(|(fourcc, format)| (fourcc == value).then_some(format))
        .unwrap_or_else(|| PixelFormat::Unknown(u32::from(value)))
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PixelFormat::Rgba8888 => write!(f, "RGBA8888"),
            PixelFormat::Rgbx8888 => write!(f, "RGBX8888"),
            PixelFormat::Rgb888 => write!(f, "RGB888"),
            PixelFormat::Rgb565 => write!(f, "RGB565"),
            PixelFormat::Alpha8 => write!(f, "A8"),
            PixelFormat::Yuyv => write!(f, "YUYV"),
            PixelFormat::Nv12 => write!(f, "NV12"),
            PixelFormat::Unknown(code) => write!(f, "unknown({code:#x})"),
        }
    }
}

/// Width and height of a frame in pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

impl FrameDimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size of an unpadded RGBA frame with these dimensions.
    pub const fn byte_len(self) -> usize {
        self.pixel_count() * RGBA_CHANNELS
    }

    /// [`byte_len`](Self::byte_len), or `None` if the frame could not be
    /// addressed as a single slice.
    pub fn checked_byte_len(self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(RGBA_CHANNELS)
            .filter(|&len| len <= isize::MAX as usize)
    }

    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for FrameDimensions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Encodes an RGBA frame to JPEG using turbojpeg.
///
/// # Arguments
///
/// * `pix` - Raw RGBA pixel data, at least `dims.byte_len()` bytes
/// * `dims` - Frame dimensions
/// * `quality` - JPEG quality in the range 1..=100
///
/// # Errors
///
/// Returns an error if the pixel data is shorter than the frame or if
/// compression fails.
///
/// # Example
///
/// ```no_run
/// use edgevision_rt::image::{encode_jpeg, FrameDimensions};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dims = FrameDimensions::new(640, 480);
/// let pixels = vec![0u8; dims.byte_len()];
/// let jpeg = encode_jpeg(&pixels, dims, 90)?;
/// println!("Compressed to {} bytes", jpeg.len());
/// # Ok(())
/// # }
/// ```
pub fn encode_jpeg(
    pix: &[u8],
    dims: FrameDimensions,
    quality: i32,
) -> Result<OwnedBuf, Box<dyn Error>> {
    if pix.len() < dims.byte_len() {
        return Err(Box::new(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "{} frame needs {} bytes, got {}",
                dims,
                dims.byte_len(),
                pix.len()
            ),
        )));
    }

    let img = turbojpeg::Image {
        width: dims.width as usize,
        height: dims.height as usize,
        format: turbojpeg::PixelFormat::RGBA,
        pixels: &pix[..dims.byte_len()],
        pitch: dims.width as usize * RGBA_CHANNELS,
    };

    Ok(turbojpeg::compress(img, quality, turbojpeg::Subsamp::Sub2x2)?)
}

/// Decodes a JPEG into tightly packed RGBA pixels.
pub fn decode_jpeg(jpeg: &[u8]) -> Result<(FrameDimensions, Vec<u8>), Box<dyn Error>> {
    let img = turbojpeg::decompress(jpeg, turbojpeg::PixelFormat::RGBA)?;
    let dims = FrameDimensions::new(img.width as u32, img.height as u32);
    let row = img.width * RGBA_CHANNELS;

    if img.pitch == row {
        let mut pixels = img.pixels;
        pixels.truncate(dims.byte_len());
        return Ok((dims, pixels));
    }

    let mut pixels = Vec::with_capacity(dims.byte_len());
    for line in img.pixels.chunks(img.pitch).take(img.height) {
        pixels.extend_from_slice(&line[..row]);
    }
    Ok((dims, pixels))
}
