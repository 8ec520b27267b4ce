// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgevision_rt::kernel::{CannyParams, ProcessingMode};
use serde_json::json;
use std::path::PathBuf;
use videostream::camera::Mirror;
use zenoh::config::{Config, WhatAmI};

/// Camera image mirroring options.
///
/// Determines how the camera image should be flipped before processing.
/// Useful for correcting camera orientation.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Copy)]
pub enum MirrorSetting {
    /// No mirroring
    None,
    /// Flip horizontally (left-right)
    Horizontal,
    /// Flip vertically (top-bottom)
    Vertical,
    /// Flip both horizontally and vertically (180-degree rotation)
    Both,
}

impl From<MirrorSetting> for Mirror {
    fn from(setting: MirrorSetting) -> Self {
        match setting {
            MirrorSetting::None => Mirror::None,
            MirrorSetting::Horizontal => Mirror::Horizontal,
            MirrorSetting::Vertical => Mirror::Vertical,
            MirrorSetting::Both => Mirror::Both,
        }
    }
}

/// Processing filter applied to every frame.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Copy)]
pub enum Filter {
    /// Blur, gradient and hysteresis edge mask
    Canny,
    /// Unweighted RGB average
    Grayscale,
    /// Neighbour-difference gradient strength
    Edge,
    /// Publish the camera image unchanged
    Passthrough,
}

impl From<Filter> for ProcessingMode {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Canny => ProcessingMode::CannyStyle,
            Filter::Grayscale => ProcessingMode::Grayscale,
            Filter::Edge => ProcessingMode::EdgeDetect,
            Filter::Passthrough => ProcessingMode::Passthrough,
        }
    }
}

/// Command-line arguments for the EdgeVision node.
///
/// Without `--input` the node captures from the camera, processes every
/// frame and publishes the result over Zenoh. With `--input` it processes a
/// single JPEG file and exits. Arguments can be specified via command line
/// or environment variables.
///
/// # Example
///
/// ```bash
/// # Live edge preview
/// edgevision --camera /dev/video0 --filter canny
///
/// # One-shot file processing
/// edgevision --input frame.jpg --output edges.jpg --filter edge
///
/// # Via environment variables
/// export CAMERA=/dev/video0
/// export FILTER=grayscale
/// edgevision
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera capture device path (e.g., /dev/video0)
    #[arg(short, long, env = "CAMERA", default_value = "/dev/video3")]
    pub camera: String,

    /// Camera capture resolution in pixels (width height)
    #[arg(
        long,
        env = "CAMERA_SIZE",
        default_value = "1280 720",
        value_delimiter = ' ',
        num_args = 2
    )]
    pub camera_size: Vec<u32>,

    /// Camera image mirroring setting
    #[arg(long, env = "MIRROR", default_value = "none", value_enum)]
    pub mirror: MirrorSetting,

    /// Processing filter
    #[arg(short, long, env = "FILTER", default_value = "canny", value_enum)]
    pub filter: Filter,

    /// Process this JPEG file instead of the camera
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Where to write the processed JPEG in file mode
    #[arg(short, long, default_value = "output.jpg")]
    pub output: PathBuf,

    /// JPEG quality for published and written images (1-100)
    #[arg(long, env = "JPEG_QUALITY", default_value = "80",
          value_parser = clap::value_parser!(i32).range(1..=100))]
    pub jpeg_quality: i32,

    /// Canny hysteresis low threshold
    #[arg(long, env = "CANNY_LOW", default_value = "50")]
    pub canny_low: f32,

    /// Canny hysteresis high threshold
    #[arg(long, env = "CANNY_HIGH", default_value = "150")]
    pub canny_high: f32,

    /// Zenoh topic for processed JPEG images (sensor_msgs/CompressedImage)
    #[arg(long, default_value = "rt/edgevision/jpeg")]
    pub jpeg_topic: String,

    /// Zenoh topic for frame statistics (JSON)
    #[arg(long, default_value = "rt/edgevision/stats")]
    pub stats_topic: String,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Forward logs to the systemd journal
    #[arg(long, env = "JOURNALD")]
    pub journald: bool,

    /// Enable Tokio async runtime console for debugging
    #[arg(long, env = "TOKIO_CONSOLE")]
    pub tokio_console: bool,

    /// Enable Tracy profiler for performance analysis
    #[arg(long, env = "TRACY")]
    pub tracy: bool,

    /// Zenoh participant mode (peer, client, or router)
    #[arg(long, env = "MODE", default_value = "peer")]
    mode: WhatAmI,

    /// Zenoh endpoints to connect to (can specify multiple)
    #[arg(long, env = "CONNECT")]
    connect: Vec<String>,

    /// Zenoh endpoints to listen on (can specify multiple)
    #[arg(long, env = "LISTEN")]
    listen: Vec<String>,

    /// Disable Zenoh multicast peer discovery
    #[arg(long, env = "NO_MULTICAST_SCOUTING")]
    no_multicast_scouting: bool,
}

impl Args {
    pub fn canny(&self) -> CannyParams {
        CannyParams {
            low_threshold: self.canny_low,
            high_threshold: self.canny_high,
            ..CannyParams::default()
        }
    }
}

impl TryFrom<Args> for Config {
    type Error = zenoh::Error;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let mut config = Config::default();

        config.insert_json5("mode", &json!(args.mode).to_string())?;

        if !args.connect.is_empty() {
            config.insert_json5("connect/endpoints", &json!(args.connect).to_string())?;
        }

        if !args.listen.is_empty() {
            config.insert_json5("listen/endpoints", &json!(args.listen).to_string())?;
        }

        if args.no_multicast_scouting {
            config.insert_json5("scouting/multicast/enabled", &json!(false).to_string())?;
        }

        Ok(config)
    }
}
