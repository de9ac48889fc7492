//! The dispatcher facade: posting, sending, flushing and run loops.
//!
//! # Event Flow
//!
//! When an event is delivered to a node, the following steps occur:
//!
//! 1. **Event Filters**: Every filter installed on the node is invoked in
//!    installation order. If any filter returns `true`, the event is consumed
//!    and processing stops.
//!
//! 2. **Node Handler**: If no filter consumed the event, the node's
//!    [`Node::event`] is called.
//!
//! 3. **Propagation**: If the node did not handle the event and has a
//!    parent, delivery repeats at the parent. This continues up the tree until
//!    a node handles the event or the root is reached.
//!
//! The same steps run for [`System::send_event`] (immediately) and for events
//! queued with [`System::post_event`] once they are flushed.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use static_assertions::assert_not_impl_any;

use crate::config::SystemConfig;
use crate::error::Result;
use crate::event::{Event, EventId, EventType, InputBytes, ResizePayload};
use crate::event_loop::EventLoop;
use crate::logging::{span_names, targets, PerfSpan};
use crate::node::{NodeRef, WeakNodeRef};
use crate::posted_event::PostedEvent;
use crate::terminal::{TerminalDriver, TerminalGuard, TerminalInput};
use crate::thread_data::ThreadData;

/// The event dispatcher for one UI thread.
///
/// Creating a `System` acquires the terminal; dropping it releases the
/// terminal, including when a panic unwinds through its owner. Only one
/// `System` should exist at a time since the terminal is a process-wide
/// resource.
///
/// `System` is neither `Send` nor `Sync`. Everything it owns (queue, loop
/// stack, quit flag, head node) belongs to the thread that created it, and
/// a post from another thread is impossible by construction.
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use termweave_core::{
///     Event, EventType, HeadlessTerminal, Node, NodeBase, NodeRef, System, SystemConfig,
/// };
///
/// struct Root {
///     base: NodeBase,
/// }
///
/// impl Node for Root {
///     fn node_base(&self) -> &NodeBase {
///         &self.base
///     }
///
///     fn event(&self, system: &System, event: &Event) -> bool {
///         if event.event_type() == EventType::Close {
///             system.exit(0);
///             return true;
///         }
///         false
///     }
/// }
///
/// let system = System::with_terminal(
///     Box::new(HeadlessTerminal::new(80, 24)),
///     SystemConfig::default(),
/// )?;
/// let root: NodeRef = Rc::new(Root { base: NodeBase::new() });
/// system.set_head(Some(&root));
/// system.post_event(&root, Event::new(EventType::Close), 0);
/// assert_eq!(system.run(), 0);
/// # Ok::<(), termweave_core::WeaveError>(())
/// ```
pub struct System {
    data: ThreadData,
    config: SystemConfig,
    terminal: RefCell<TerminalGuard>,
    head: RefCell<Option<WeakNodeRef>>,
}

assert_not_impl_any!(System: Send, Sync);

impl System {
    /// Create a dispatcher driving the process's terminal.
    ///
    /// # Errors
    ///
    /// Returns [`WeaveError::TerminalInit`](crate::WeaveError::TerminalInit)
    /// if the terminal cannot be put into managed mode, for example when
    /// stdin is not a tty.
    #[cfg(unix)]
    pub fn new(config: SystemConfig) -> Result<Self> {
        Self::with_terminal(Box::new(crate::terminal::ProcessTerminal::new()), config)
    }

    /// Create a dispatcher driving the process's terminal.
    ///
    /// # Errors
    ///
    /// Always returns
    /// [`WeaveError::UnsupportedPlatform`](crate::WeaveError::UnsupportedPlatform);
    /// use [`System::with_terminal`] with a custom driver.
    #[cfg(not(unix))]
    pub fn new(_config: SystemConfig) -> Result<Self> {
        Err(crate::error::WeaveError::UnsupportedPlatform)
    }

    /// Create a dispatcher around a specific terminal driver.
    ///
    /// # Errors
    ///
    /// Returns [`WeaveError::TerminalInit`](crate::WeaveError::TerminalInit)
    /// if the driver cannot enter the configured mode.
    pub fn with_terminal(driver: Box<dyn TerminalDriver>, config: SystemConfig) -> Result<Self> {
        let guard = TerminalGuard::acquire(driver, &config.terminal_mode)?;
        Ok(Self {
            data: ThreadData::new(),
            config,
            terminal: RefCell::new(guard),
            head: RefCell::new(None),
        })
    }

    /// The configuration this system was created with.
    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// The queue, loop stack and quit flag of this thread.
    pub fn thread_data(&self) -> &ThreadData {
        &self.data
    }

    // -------------------------------------------------------------------------
    // Posting
    // -------------------------------------------------------------------------

    /// Queue `event` for later delivery to `receiver`.
    ///
    /// The queue does not keep `receiver` alive. Call
    /// [`discard_posted_events`](Self::discard_posted_events) before
    /// destroying a node that may still have events queued.
    ///
    /// Returns the event's id, usable with
    /// [`remove_posted_event`](Self::remove_posted_event).
    pub fn post_event<P: Into<i32>>(&self, receiver: &NodeRef, event: Event, priority: P) -> EventId {
        let priority = priority.into();
        tracing::trace!(
            target: targets::DISPATCH,
            receiver = %receiver.node_base().id(),
            event_type = ?event.event_type(),
            priority,
            "post event"
        );
        self.data
            .with_queue_mut(|q| q.insert(Rc::downgrade(receiver), event, priority))
    }

    /// Queue a [`EventType::DeferredDelete`] for `receiver`.
    ///
    /// It is only delivered by a flush asking for exactly that type, which
    /// every run loop iteration performs after ordinary events.
    pub fn post_deferred_delete(&self, receiver: &NodeRef) -> EventId {
        self.post_event(receiver, Event::deferred_delete(), 0)
    }

    /// Cancel a queued event. Returns `true` if it was still queued.
    pub fn remove_posted_event(&self, id: EventId) -> bool {
        self.data.with_queue_mut(|q| q.remove_by_identity(id))
    }

    /// Drop every queued event addressed to `receiver`, deferred deletes
    /// included. Returns how many were dropped.
    pub fn discard_posted_events(&self, receiver: &NodeRef) -> usize {
        let discarded = self
            .data
            .with_queue_mut(|q| q.take_matching(|entry| entry.is_for(receiver)));
        if !discarded.is_empty() {
            tracing::trace!(
                target: targets::DISPATCH,
                receiver = %receiver.node_base().id(),
                count = discarded.len(),
                "discarded posted events"
            );
        }
        discarded.len()
    }

    // -------------------------------------------------------------------------
    // Delivery
    // -------------------------------------------------------------------------

    /// Deliver `event` to `target` immediately. Equivalent to
    /// [`notify`](Self::notify).
    pub fn send_event(&self, target: &NodeRef, event: &Event) -> bool {
        self.notify(target, event)
    }

    /// Deliver queued events matching the filters.
    ///
    /// - `receiver`: `None` for any receiver, otherwise only that node.
    /// - `event_type`: [`EventType::None`] for any type, otherwise only that
    ///   type.
    ///
    /// A [`EventType::DeferredDelete`] entry is only delivered when
    /// `event_type` is exactly `DeferredDelete`; the wildcard never matches
    /// it.
    ///
    /// Only entries queued when the call starts are considered, each once:
    /// the scan resumes after the last delivered entry instead of restarting
    /// at the front. Events posted by handlers during the flush wait for the
    /// next one. Entries are taken one at a time, so a handler can still
    /// cancel a later entry or run a nested loop that sees it. Returns the
    /// number of events delivered.
    ///
    /// # Panics
    ///
    /// Panics if a matching entry's receiver has been dropped.
    #[tracing::instrument(skip(self, receiver), target = "termweave_core::dispatch", level = "trace")]
    pub fn send_posted_events(&self, receiver: Option<&NodeRef>, event_type: EventType) -> usize {
        let _perf = PerfSpan::new(span_names::FLUSH);
        let bound = self.data.with_queue(|q| q.next_sequence());
        let mut cursor = None;
        let mut delivered = 0;
        loop {
            let next = self.data.with_queue_mut(|q| {
                q.take_next_matching(cursor, |entry| {
                    entry.sequence() < bound && flush_matches(entry, receiver, event_type)
                })
            });
            let Some(posted) = next else {
                break;
            };
            cursor = Some(posted.position());
            let (receiver_link, event) = posted.into_parts();
            let Some(target) = receiver_link.upgrade() else {
                panic!(
                    "posted {:?} event outlived its receiver; discard a node's posted events before dropping it",
                    event.event_type()
                );
            };
            self.notify(&target, &event);
            delivered += 1;
        }
        delivered
    }

    /// Run the filter, handler and propagation steps for `event` at `target`.
    ///
    /// Returns `true` if a filter or handler anywhere on the path handled the
    /// event, `false` if it reached the root unhandled.
    ///
    /// # Panics
    ///
    /// Panics if a node on the path has a parent link to a dropped node.
    pub fn notify(&self, target: &NodeRef, event: &Event) -> bool {
        let base = target.node_base();

        // Step 1: Invoke event filters (in installation order)
        for filter in base.event_filters() {
            let Some(filter) = filter.upgrade() else {
                base.prune_event_filters();
                continue;
            };
            if filter.event_filter(self, target, event) {
                tracing::trace!(
                    target: targets::DISPATCH,
                    node = %base.id(),
                    filter = %filter.node_base().id(),
                    event_type = ?event.event_type(),
                    "event consumed by filter"
                );
                return true;
            }
        }

        // Step 2: Send to the target node
        if target.event(self, event) {
            tracing::trace!(
                target: targets::DISPATCH,
                node = %base.id(),
                event_type = ?event.event_type(),
                "event handled"
            );
            return true;
        }

        // Step 3: Propagate to parent
        match base.parent_link() {
            Some(link) => {
                let Some(parent) = link.upgrade() else {
                    panic!(
                        "node {} has a parent link to a dropped node; detach children before dropping their parent",
                        base.id()
                    );
                };
                self.notify(&parent, event)
            }
            None => {
                tracing::trace!(
                    target: targets::DISPATCH,
                    node = %base.id(),
                    event_type = ?event.event_type(),
                    "event unhandled at root"
                );
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // Run loops
    // -------------------------------------------------------------------------

    /// Run a new event loop until it is stopped and return its code.
    ///
    /// Each iteration delivers posted events, waits up to
    /// [`SystemConfig::poll_interval`] for terminal input (posted to the head
    /// node), then delivers deferred deletes. Calling `run` from a handler
    /// starts a nested loop on top of the current one.
    #[tracing::instrument(skip(self), target = "termweave_core::event_loop", level = "debug")]
    pub fn run(&self) -> i32 {
        let event_loop = Rc::new(EventLoop::new());
        self.data.push_loop(Rc::clone(&event_loop));
        self.data.set_quit_now(false);

        let code = event_loop.exec(self);

        self.data.remove_loop(&event_loop);
        self.data.set_quit_now(false);
        code
    }

    /// Stop every active loop, innermost first, with `code`.
    pub fn exit(&self, code: i32) {
        tracing::info!(
            target: targets::EVENT_LOOP,
            code,
            depth = self.data.loop_depth(),
            "exit requested"
        );
        self.data.set_quit_now(true);
        while let Some(event_loop) = self.data.pop_loop() {
            event_loop.stop(code);
        }
    }

    /// Stop only the innermost loop with `code`, leaving outer loops running.
    ///
    /// Returns `false` if no loop is active.
    pub fn exit_loop(&self, code: i32) -> bool {
        match self.data.pop_loop() {
            Some(event_loop) => {
                event_loop.stop(code);
                true
            }
            None => false,
        }
    }

    /// Perform one loop iteration without waiting for input.
    pub fn process_events(&self) {
        self.process_events_for(Duration::ZERO);
    }

    /// Perform one loop iteration, waiting up to `timeout` for input when no
    /// posted work is pending.
    pub(crate) fn process_events_for(&self, timeout: Duration) {
        let _span = PerfSpan::new(span_names::EVENT_LOOP);

        self.send_posted_events(None, EventType::None);

        let mut wait = if self.data.quit_requested() || self.data.posted_event_count() > 0 {
            Duration::ZERO
        } else {
            timeout
        };
        loop {
            let input = self.terminal.borrow_mut().driver_mut().read_input(wait);
            let Some(input) = input else {
                break;
            };
            self.deliver_input(input);
            wait = Duration::ZERO;
        }

        self.send_posted_events(None, EventType::DeferredDelete);
    }

    fn deliver_input(&self, input: TerminalInput) {
        let Some(head) = self.head() else {
            tracing::trace!(target: targets::TERMINAL, ?input, "no head node, input dropped");
            return;
        };
        let event = match input {
            TerminalInput::Bytes(bytes) => Event::with_payload(EventType::Input, InputBytes(bytes)),
            TerminalInput::Resize { width, height } => {
                Event::with_payload(EventType::Resize, ResizePayload { width, height })
            }
        };
        self.post_event(&head, event, self.config.input_priority);
    }

    // -------------------------------------------------------------------------
    // Head node and terminal queries
    // -------------------------------------------------------------------------

    /// The designated root node, if set and still alive.
    pub fn head(&self) -> Option<NodeRef> {
        self.head.borrow().as_ref().and_then(|h| h.upgrade())
    }

    /// Designate the root node, or clear it with `None`. The system does not
    /// keep the node alive.
    pub fn set_head(&self, node: Option<&NodeRef>) {
        *self.head.borrow_mut() = node.map(Rc::downgrade);
    }

    /// Terminal width in columns.
    pub fn max_width(&self) -> u16 {
        self.terminal.borrow().driver().dimensions().0
    }

    /// Terminal height in rows.
    pub fn max_height(&self) -> u16 {
        self.terminal.borrow().driver().dimensions().1
    }
}

impl Drop for System {
    fn drop(&mut self) {
        let pending = self.data.posted_event_count();
        if pending > 0 {
            tracing::debug!(target: targets::DISPATCH, pending, "dropping undelivered posted events");
        }
    }
}

/// Whether a flush with these filters delivers `entry`.
fn flush_matches(entry: &PostedEvent, receiver: Option<&NodeRef>, event_type: EventType) -> bool {
    let entry_type = entry.event().event_type();
    let receiver_ok = receiver.is_none_or(|r| entry.is_for(r));
    let type_ok = event_type.is_wildcard() || event_type == entry_type;
    let delete_ok = entry_type != EventType::DeferredDelete || event_type == EventType::DeferredDelete;
    receiver_ok && type_ok && delete_ok
}
