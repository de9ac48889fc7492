//! Event dispatch core for termweave.
//!
//! This crate provides the layer beneath termweave's widgets:
//!
//! - **Events**: Typed events with optional payloads and unique ids
//! - **Nodes**: The [`Node`] trait, parent links and event filters
//! - **Dispatch**: Synchronous delivery with filtering and propagation to parents
//! - **Posted Events**: A priority queue of deferred events, with cancellation
//! - **Run Loops**: Nestable event loops and a cascading exit
//! - **Terminal**: Scoped acquisition of the terminal and input delivery
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use termweave_core::{
//!     Event, EventPriority, EventType, HeadlessTerminal, Node, NodeBase, NodeRef, System,
//!     SystemConfig,
//! };
//!
//! struct Window {
//!     base: NodeBase,
//!     paints: Cell<u32>,
//! }
//!
//! impl Node for Window {
//!     fn node_base(&self) -> &NodeBase {
//!         &self.base
//!     }
//!
//!     fn event(&self, system: &System, event: &Event) -> bool {
//!         match event.event_type() {
//!             EventType::Paint => {
//!                 self.paints.set(self.paints.get() + 1);
//!                 true
//!             }
//!             EventType::Close => {
//!                 system.exit(0);
//!                 true
//!             }
//!             _ => false,
//!         }
//!     }
//! }
//!
//! let system = System::with_terminal(
//!     Box::new(HeadlessTerminal::new(80, 24)),
//!     SystemConfig::default(),
//! )?;
//!
//! let window = Rc::new(Window { base: NodeBase::with_name("main"), paints: Cell::new(0) });
//! let node: NodeRef = window.clone();
//!
//! system.post_event(&node, Event::new(EventType::Paint), EventPriority::Normal);
//! system.post_event(&node, Event::new(EventType::Close), EventPriority::Low);
//!
//! assert_eq!(system.run(), 0);
//! assert_eq!(window.paints.get(), 1);
//! # Ok::<(), termweave_core::WeaveError>(())
//! ```

mod config;
mod error;
mod event;
mod event_loop;
pub mod logging;
mod node;
mod posted_event;
mod system;
pub mod terminal;
mod thread_data;

pub use config::{SystemConfig, TerminalMode, DEFAULT_POLL_INTERVAL};
pub use error::{Result, WeaveError};
pub use event::{Event, EventId, EventPriority, EventType, InputBytes, ResizePayload};
pub use event_loop::EventLoop;
pub use logging::{PerfSpan, QueueDebug};
pub use node::{Node, NodeBase, NodeId, NodeRef, WeakNodeRef};
pub use posted_event::{PostedEvent, PostedEventQueue, QueuePosition};
pub use system::System;
#[cfg(unix)]
pub use terminal::ProcessTerminal;
pub use terminal::{HeadlessTerminal, TerminalDriver, TerminalGuard, TerminalInput};
pub use thread_data::ThreadData;

static_assertions::assert_impl_all!(EventType: Copy, Send, Sync);
static_assertions::assert_impl_all!(EventId: Copy, Send, Sync);
static_assertions::assert_not_impl_any!(Event: Clone);
