//! Nested, stoppable run loops.

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::logging::targets;
use crate::system::System;

static NEXT_LOOP_ID: AtomicU64 = AtomicU64::new(1);

/// One execution of the dispatch loop.
///
/// A loop starts out running and stops exactly once, recording the return
/// code it was stopped with. [`System::run`] creates one per call and pushes
/// it onto the thread's loop stack; [`System::exit`] stops every loop on the
/// stack.
#[derive(Debug)]
pub struct EventLoop {
    id: u64,
    running: Cell<bool>,
    return_code: Cell<i32>,
}

impl EventLoop {
    /// Create a running loop with return code 0.
    pub fn new() -> Self {
        Self {
            id: NEXT_LOOP_ID.fetch_add(1, Ordering::Relaxed),
            running: Cell::new(true),
            return_code: Cell::new(0),
        }
    }

    /// Identifier used in logs.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the loop has not been stopped yet.
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// The code the loop was stopped with, or 0 while it is running.
    pub fn return_code(&self) -> i32 {
        self.return_code.get()
    }

    /// Stop the loop with `code`.
    ///
    /// The loop returns from its current iteration; it is not interrupted.
    /// Stopping an already stopped loop keeps the first code.
    pub fn stop(&self, code: i32) {
        if !self.running.replace(false) {
            return;
        }
        self.return_code.set(code);
        tracing::debug!(target: targets::EVENT_LOOP, loop_id = self.id, code, "event loop stopped");
    }

    /// Process work until the loop is stopped, then return its code.
    pub(crate) fn exec(&self, system: &System) -> i32 {
        tracing::debug!(target: targets::EVENT_LOOP, loop_id = self.id, "event loop started");
        while self.is_running() {
            system.process_events_for(system.config().poll_interval);
        }
        self.return_code()
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}
