//! Logging and debugging facilities for termweave.
//!
//! This module provides:
//! - Target and span names for filtering the crate's `tracing` output
//! - A text dump of the posted-event queue
//! - Performance spans for timing dispatch work
//!
//! # Tracing Integration
//!
//! termweave uses the `tracing` crate for instrumentation. To see logs, install
//! a subscriber in your application. Since stdout belongs to the UI, write
//! logs to a file:
//!
//! ```ignore
//! let file = std::fs::File::create("termweave.log")?;
//! tracing_subscriber::fmt().with_writer(file).init();
//! ```
//!
//! # Debug Visualization
//!
//! ```ignore
//! use termweave_core::logging::QueueDebug;
//!
//! tracing::debug!("{}", QueueDebug::new(system.thread_data()));
//! ```

use std::fmt::{self, Write as FmtWrite};

use crate::thread_data::ThreadData;

/// Span names used throughout termweave for tracing.
pub mod span_names {
    /// Event loop processing span.
    pub const EVENT_LOOP: &str = "termweave::event_loop";
    /// Posted-event flush span.
    pub const FLUSH: &str = "termweave::flush";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core framework target.
    pub const CORE: &str = "termweave_core";
    /// Synchronous dispatch (`notify`).
    pub const DISPATCH: &str = "termweave_core::dispatch";
    /// Posted-event queue.
    pub const QUEUE: &str = "termweave_core::queue";
    /// Run loops.
    pub const EVENT_LOOP: &str = "termweave_core::event_loop";
    /// Terminal acquisition and input.
    pub const TERMINAL: &str = "termweave_core::terminal";
}

/// Renders the posted-event queue of a [`ThreadData`], one line per entry in
/// dispatch order.
#[derive(Debug, Clone, Copy)]
pub struct QueueDebug<'a> {
    data: &'a ThreadData,
    max_entries: Option<usize>,
}

impl<'a> QueueDebug<'a> {
    /// Render every queued entry.
    pub fn new(data: &'a ThreadData) -> Self {
        Self {
            data,
            max_entries: None,
        }
    }

    /// Render at most `max` entries, summarizing the rest.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Produce the dump as a string.
    pub fn format(&self) -> String {
        self.data.with_queue(|queue| {
            let mut output = String::new();
            let _ = writeln!(
                output,
                "Posted events ({} queued, {} loops active):",
                queue.len(),
                self.data.loop_depth()
            );
            if queue.is_empty() {
                output.push_str("  (empty)\n");
                return output;
            }
            let limit = self.max_entries.unwrap_or(usize::MAX);
            for entry in queue.iter().take(limit) {
                let receiver = match entry.receiver().upgrade() {
                    Some(node) => {
                        let base = node.node_base();
                        let name = base.name();
                        if name.is_empty() {
                            format!("{}", base.id())
                        } else {
                            format!("{} {}", base.id(), name)
                        }
                    }
                    None => "(dropped)".to_string(),
                };
                let _ = writeln!(
                    output,
                    "  [{:>4}] #{:<6} {:?} -> {}",
                    entry.priority(),
                    entry.sequence(),
                    entry.event().event_type(),
                    receiver
                );
            }
            if queue.len() > limit {
                let _ = writeln!(output, "  ... {} more", queue.len() - limit);
            }
            output
        })
    }
}

impl fmt::Display for QueueDebug<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// A guard that emits a tracing span while alive.
///
/// This is useful for tracking the duration of operations.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "termweave::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}
