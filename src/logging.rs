// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Forwarding of `tracing` events to a host-provided logger.
//!
//! Embedding hosts usually own the process log (logcat, os_log, a game
//! engine console). [`HostLogLayer`] renders each event as a single line and
//! hands it to a [`LogSink`]; [`install_host_logger`] wires a C callback up
//! as the global subscriber.

use std::{
    ffi::{c_char, c_int, CString},
    fmt::{self, Write},
};
use tracing::{
    field::{Field, Visit},
    level_filters::LevelFilter,
    Event, Level, Subscriber,
};
use tracing_subscriber::{
    layer::{Context, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
    Layer,
};

pub const PRIORITY_VERBOSE: c_int = 2;
pub const PRIORITY_DEBUG: c_int = 3;
pub const PRIORITY_INFO: c_int = 4;
pub const PRIORITY_WARN: c_int = 5;
pub const PRIORITY_ERROR: c_int = 6;

/// Host log function: `(priority, tag, message)`, both strings NUL-terminated.
pub type HostLogFn = unsafe extern "C" fn(c_int, *const c_char, *const c_char);

/// Host priority for a `tracing` level.
pub fn priority(level: &Level) -> c_int {
    match *level {
        Level::TRACE => PRIORITY_VERBOSE,
        Level::DEBUG => PRIORITY_DEBUG,
        Level::INFO => PRIORITY_INFO,
        Level::WARN => PRIORITY_WARN,
        Level::ERROR => PRIORITY_ERROR,
    }
}

/// Most verbose level that a host minimum priority lets through.
pub fn level_filter(min_priority: c_int) -> LevelFilter {
    match min_priority {
        p if p <= PRIORITY_VERBOSE => LevelFilter::TRACE,
        PRIORITY_DEBUG => LevelFilter::DEBUG,
        PRIORITY_INFO => LevelFilter::INFO,
        PRIORITY_WARN => LevelFilter::WARN,
        PRIORITY_ERROR => LevelFilter::ERROR,
        _ => LevelFilter::OFF,
    }
}

/// Destination for rendered log lines.
pub trait LogSink: Send + Sync + 'static {
    fn log(&self, priority: c_int, tag: &str, message: &str);
}

/// [`LogSink`] calling a host C function.
pub struct CallbackSink(HostLogFn);

impl LogSink for CallbackSink {
    fn log(&self, priority: c_int, tag: &str, message: &str) {
        let tag = to_cstring(tag);
        let message = to_cstring(message);
        unsafe { (self.0)(priority, tag.as_ptr(), message.as_ptr()) }
    }
}

fn to_cstring(s: &str) -> CString {
    CString::new(s.replace('\0', "\\0")).unwrap_or_default()
}

/// `tracing` layer that renders events and passes them to a [`LogSink`].
pub struct HostLogLayer<K> {
    sink: K,
}

impl<K: LogSink> HostLogLayer<K> {
    pub fn new(sink: K) -> Self {
        Self { sink }
    }
}

impl<S: Subscriber, K: LogSink> Layer<S> for HostLogLayer<K> {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.sink
            .log(priority(meta.level()), meta.target(), &visitor.finish());
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(mut self) -> String {
        self.message.push_str(&self.fields);
        self.message
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

/// Installs `callback` as the process-wide `tracing` subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already set.
pub fn install_host_logger(callback: HostLogFn, level: LevelFilter) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(HostLogLayer::new(CallbackSink(callback)).with_filter(level))
        .try_init()
}
