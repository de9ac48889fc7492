//! In-memory terminal for tests and non-interactive hosts.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use super::{TerminalDriver, TerminalInput};
use crate::config::TerminalMode;

#[derive(Debug, Default)]
struct HeadlessState {
    width: u16,
    height: u16,
    mode: Option<TerminalMode>,
    enter_count: usize,
    leave_count: usize,
    fail_enter: bool,
    pending: VecDeque<TerminalInput>,
}

/// A terminal with fixed dimensions and scripted input.
///
/// Clones share state, so a test can keep one handle while the
/// [`System`](crate::System) owns another and inspect what the system did.
/// [`read_input`](TerminalDriver::read_input) never blocks.
#[derive(Debug, Clone, Default)]
pub struct HeadlessTerminal {
    state: Rc<RefCell<HeadlessState>>,
}

impl HeadlessTerminal {
    /// Create a terminal reporting `width` x `height` cells.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            state: Rc::new(RefCell::new(HeadlessState {
                width,
                height,
                ..HeadlessState::default()
            })),
        }
    }

    /// Create a terminal that refuses to enter managed mode.
    pub fn failing() -> Self {
        let terminal = Self::new(80, 24);
        terminal.state.borrow_mut().fail_enter = true;
        terminal
    }

    /// Queue input to be returned by the next reads.
    pub fn push_input(&self, input: TerminalInput) {
        self.state.borrow_mut().pending.push_back(input);
    }

    /// Change the reported size and queue the matching resize input.
    pub fn resize(&self, width: u16, height: u16) {
        let mut state = self.state.borrow_mut();
        state.width = width;
        state.height = height;
        state
            .pending
            .push_back(TerminalInput::Resize { width, height });
    }

    /// Whether the terminal is currently in managed mode.
    pub fn is_managed(&self) -> bool {
        self.state.borrow().mode.is_some()
    }

    /// The mode currently applied, if managed.
    pub fn mode(&self) -> Option<TerminalMode> {
        self.state.borrow().mode
    }

    /// How many times managed mode was entered.
    pub fn enter_count(&self) -> usize {
        self.state.borrow().enter_count
    }

    /// How many times managed mode was left.
    pub fn leave_count(&self) -> usize {
        self.state.borrow().leave_count
    }

    /// Number of scripted inputs not read yet.
    pub fn pending_input(&self) -> usize {
        self.state.borrow().pending.len()
    }
}

impl TerminalDriver for HeadlessTerminal {
    fn enter_managed_mode(&mut self, mode: &TerminalMode) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_enter {
            return Err(io::Error::other("headless terminal refused managed mode"));
        }
        state.mode = Some(*mode);
        state.enter_count += 1;
        Ok(())
    }

    fn leave_managed_mode(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.mode = None;
        state.leave_count += 1;
        Ok(())
    }

    fn dimensions(&self) -> (u16, u16) {
        let state = self.state.borrow();
        (state.width, state.height)
    }

    fn read_input(&mut self, _timeout: Duration) -> Option<TerminalInput> {
        self.state.borrow_mut().pending.pop_front()
    }
}
