//! Dispatcher state for one UI thread.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::event_loop::EventLoop;
use crate::posted_event::PostedEventQueue;

/// The posted-event queue, loop stack and quit flag of one UI thread.
///
/// A [`System`](crate::System) owns exactly one `ThreadData`. Neither type is
/// `Send`, so the state is only ever touched from the thread that created it.
///
/// Borrows of the queue and loop stack are scoped to single calls; none is
/// held while a handler runs, so handlers may freely post, cancel and nest
/// loops.
#[derive(Debug, Default)]
pub struct ThreadData {
    queue: RefCell<PostedEventQueue>,
    /// Active loops, innermost last.
    event_loops: RefCell<Vec<Rc<EventLoop>>>,
    quit_now: Cell<bool>,
}

impl ThreadData {
    /// Create empty thread state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute a closure with read access to the posted-event queue.
    pub fn with_queue<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&PostedEventQueue) -> R,
    {
        f(&self.queue.borrow())
    }

    /// Execute a closure with write access to the posted-event queue.
    ///
    /// # Panics
    ///
    /// Panics if called from inside another `with_queue*` closure.
    pub fn with_queue_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut PostedEventQueue) -> R,
    {
        f(&mut self.queue.borrow_mut())
    }

    /// Number of queued events.
    pub fn posted_event_count(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Push a loop as the new innermost loop.
    pub fn push_loop(&self, event_loop: Rc<EventLoop>) {
        self.event_loops.borrow_mut().push(event_loop);
    }

    /// Pop the innermost loop.
    pub fn pop_loop(&self) -> Option<Rc<EventLoop>> {
        self.event_loops.borrow_mut().pop()
    }

    /// Remove a specific loop from the stack. Returns `true` if it was there.
    pub fn remove_loop(&self, event_loop: &Rc<EventLoop>) -> bool {
        let mut loops = self.event_loops.borrow_mut();
        match loops.iter().rposition(|l| Rc::ptr_eq(l, event_loop)) {
            Some(index) => {
                loops.remove(index);
                true
            }
            None => false,
        }
    }

    /// The innermost active loop.
    pub fn current_loop(&self) -> Option<Rc<EventLoop>> {
        self.event_loops.borrow().last().cloned()
    }

    /// Number of active loops.
    pub fn loop_depth(&self) -> usize {
        self.event_loops.borrow().len()
    }

    /// Whether [`System::exit`](crate::System::exit) was called since the
    /// last [`System::run`](crate::System::run) started.
    pub fn quit_requested(&self) -> bool {
        self.quit_now.get()
    }

    pub(crate) fn set_quit_now(&self, quit: bool) {
        self.quit_now.set(quit);
    }
}
