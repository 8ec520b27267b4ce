// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use args::Args;
use cdr::{CdrLe, Infinite};
use clap::Parser;
use edgefirst_schemas::{builtin_interfaces::Time, sensor_msgs::CompressedImage, std_msgs::Header};
use edgevision_rt::{
    convert::yuyv_to_rgba,
    dma::DmaImage,
    gateway::FrameProcessor,
    image::{decode_jpeg, encode_jpeg, FrameDimensions, YUYV},
    kernel::ProcessingMode,
    lease::{Lease, MemoryBuffer},
    stats::FrameStats,
};
use std::{error::Error, fs, path::Path, time::Instant};
use tracing::{debug, error, info, info_span, instrument, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, Layer};
use unix_ts::Timestamp;
use videostream::camera::create_camera;
use zenoh::{Session, Wait};

mod args;

/// A processed frame on its way to the publisher.
struct Frame {
    pixels: Vec<u8>,
    dims: FrameDimensions,
    stamp: Time,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(&args)?;

    let mode = ProcessingMode::from(args.filter);
    info!(%mode, "EdgeVision RT {}", env!("CARGO_PKG_VERSION"));

    if let Some(input) = &args.input {
        return process_file(&args, input, mode);
    }

    let config = zenoh::Config::try_from(args.clone()).map_err(zenoh_err)?;
    let session = zenoh::open(config).await.map_err(zenoh_err)?;
    let (tx, rx) = kanal::bounded(1);

    // JPEG encoding lives on its own thread as it can be much slower than the
    // camera frame rate; frames arriving while it is busy are dropped.
    let publisher = {
        let session = session.clone();
        let args = args.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = publish(&session, &args, rx) {
                error!("publisher stopped: {e}");
            }
        })
    };

    let capture_task = tokio::task::spawn_blocking(move || {
        if let Err(e) = capture(&session, &args, mode, tx) {
            error!("capture stopped: {e}");
        }
    });

    capture_task.await?;
    publisher.await?;
    Ok(())
}

/// Zenoh errors are `Send + Sync`; the rest of the node uses plain boxed errors.
fn zenoh_err(err: zenoh::Error) -> Box<dyn Error> {
    err
}

fn init_tracing(args: &Args) -> Result<(), Box<dyn Error>> {
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let stdout = tracing_subscriber::fmt::layer().with_filter(level);

    let journald = match args.journald {
        true => Some(tracing_journald::layer()?.with_filter(level)),
        false => None,
    };

    let tracy = match args.tracy {
        true => {
            tracy_client::Client::start();
            Some(tracing_tracy::TracyLayer::default().with_filter(level))
        }
        false => None,
    };

    let console = args.tokio_console.then(console_subscriber::spawn);

    let subscriber = tracing_subscriber::registry()
        .with(stdout)
        .with(journald)
        .with(tracy)
        .with(console);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;

    Ok(())
}

#[instrument(skip(args))]
fn process_file(args: &Args, input: &Path, mode: ProcessingMode) -> Result<(), Box<dyn Error>> {
    let jpeg = fs::read(input)?;
    let (dims, pixels) = decode_jpeg(&jpeg)?;

    let src = MemoryBuffer::from_pixels(dims, pixels)?;
    let mut dst = MemoryBuffer::new(dims);

    let now = Instant::now();
    FrameProcessor::new(args.canny()).process(&src, &dst, mode)?;
    let process_time = now.elapsed();

    let out = encode_jpeg(dst.pixels(), dims, args.jpeg_quality)?;
    fs::write(&args.output, &*out)?;

    info!(
        "{} | {} | Proc: {:.2?} -> {}",
        mode,
        dims,
        process_time,
        args.output.display()
    );
    Ok(())
}

fn capture(
    session: &Session,
    args: &Args,
    mode: ProcessingMode,
    tx: kanal::Sender<Frame>,
) -> Result<(), Box<dyn Error>> {
    let cam = create_camera()
        .with_device(&args.camera)
        .with_resolution(args.camera_size[0] as i32, args.camera_size[1] as i32)
        .with_format(YUYV)
        .with_mirror(args.mirror.into())
        .open()?;
    cam.start()?;

    if cam.width() as u32 != args.camera_size[0] || cam.height() as u32 != args.camera_size[1] {
        warn!(
            "requested {}x{} resolution but camera set {}x{}",
            args.camera_size[0],
            args.camera_size[1],
            cam.width(),
            cam.height()
        );
    }

    let dims = FrameDimensions::new(cam.width() as u32, cam.height() as u32);
    let processor = FrameProcessor::new(args.canny());
    let mut rgba = MemoryBuffer::new(dims);
    let mut out = MemoryBuffer::new(dims);
    let mut stats = FrameStats::default();

    loop {
        let buf = cam.read()?;
        let ts: Timestamp = buf.timestamp();
        let _span = info_span!("frame").entered();
        let now = Instant::now();

        let src = DmaImage::from_camera(&buf)?;
        if src.format() != YUYV {
            return Err(format!("camera delivered {} frames, expected YUYV", src.format()).into());
        }
        {
            let lease = Lease::acquire(&src)?;
            yuyv_to_rgba(lease.as_slice(), rgba.pixels_mut(), dims)?;
        }

        if let Err(e) = processor.process(&rgba, &out, mode) {
            warn!("dropping frame: {e}");
            continue;
        }
        let process_time = now.elapsed();

        let frame = Frame {
            pixels: out.pixels().to_vec(),
            dims,
            stamp: ros_time(&ts),
        };
        if !tx.try_send(frame)? {
            debug!("publisher busy, frame dropped");
        }

        if let Some(report) = stats.record(Instant::now(), process_time) {
            info!(
                "{} | FPS: {:.1} | {} | Proc: {:.1}ms",
                mode, report.fps, dims, report.avg_processing_ms
            );
            let json = serde_json::to_vec(&report)?;
            session
                .put(args.stats_topic.as_str(), json)
                .wait()
                .map_err(zenoh_err)?;
        }
    }
}

fn ros_time(ts: &Timestamp) -> Time {
    Time {
        sec: ts.seconds() as i32,
        nanosec: ts.subsec(9),
    }
}

fn publish(session: &Session, args: &Args, rx: kanal::Receiver<Frame>) -> Result<(), Box<dyn Error>> {
    while let Ok(frame) = rx.recv() {
        let msg = match build_jpeg_msg(&frame, args.jpeg_quality) {
            Ok(m) => m,
            Err(e) => {
                error!("jpeg encode failed: {e}");
                continue;
            }
        };
        let encoded = cdr::serialize::<_, _, CdrLe>(&msg, Infinite)?;
        session
            .put(args.jpeg_topic.as_str(), encoded)
            .wait()
            .map_err(zenoh_err)?;
    }
    Ok(())
}

#[instrument(skip_all, fields(dims = %frame.dims))]
fn build_jpeg_msg(frame: &Frame, quality: i32) -> Result<CompressedImage, Box<dyn Error>> {
    let now = Instant::now();
    let jpeg = encode_jpeg(&frame.pixels, frame.dims, quality)?;
    debug!(
        "jpeg: {}KB encode: {:.2?}",
        jpeg.len() / 1024,
        now.elapsed()
    );

    Ok(CompressedImage {
        header: Header {
            stamp: frame.stamp.clone(),
            frame_id: "".to_string(),
        },
        format: "jpeg".to_string(),
        data: jpeg.to_vec(),
    })
}
