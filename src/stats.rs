// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use serde::Serialize;
use std::time::{Duration, Instant};

/// Summary of one statistics window.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatsReport {
    /// Frames recorded in the window
    pub frames: u32,
    /// Frames per second over the window
    pub fps: f64,
    /// Mean time spent processing one frame
    pub avg_processing_ms: f64,
}

/// Rolling frame-rate and processing-time counter.
///
/// Frames are accumulated until `window` has elapsed since the first frame
/// of the window, at which point a [`StatsReport`] is produced and the
/// counters restart.
#[derive(Debug)]
pub struct FrameStats {
    window: Duration,
    window_start: Option<Instant>,
    frames: u32,
    processing: Duration,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl FrameStats {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            window_start: None,
            frames: 0,
            processing: Duration::ZERO,
        }
    }

    /// Records a frame seen at `now` that took `processing` to handle.
    pub fn record(&mut self, now: Instant, processing: Duration) -> Option<StatsReport> {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        self.processing += processing;

        let elapsed = now.duration_since(start);
        if elapsed < self.window || elapsed.is_zero() {
            return None;
        }

        let report = StatsReport {
            frames: self.frames,
            fps: self.frames as f64 / elapsed.as_secs_f64(),
            avg_processing_ms: self.processing.as_secs_f64() * 1000.0 / self.frames as f64,
        };

        self.window_start = Some(now);
        self.frames = 0;
        self.processing = Duration::ZERO;
        Some(report)
    }
}
