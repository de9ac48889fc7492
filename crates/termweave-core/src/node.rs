//! The capability contract the dispatcher requires from hierarchy nodes.
//!
//! The dispatcher never owns nodes. It needs three things from each one:
//!
//! - an optional, non-owning link to its parent,
//! - an ordered list of filter observers that see events first,
//! - a handler reporting whether an event was handled.
//!
//! [`NodeBase`] stores the first two; include it as a field and return it from
//! [`Node::node_base`], the same way widgets embed their base state.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use termweave_core::{Event, EventType, Node, NodeBase, NodeRef, System};
//!
//! struct Label {
//!     base: NodeBase,
//! }
//!
//! impl Node for Label {
//!     fn node_base(&self) -> &NodeBase {
//!         &self.base
//!     }
//!
//!     fn event(&self, _system: &System, event: &Event) -> bool {
//!         event.event_type() == EventType::Paint
//!     }
//! }
//!
//! let window: NodeRef = Rc::new(Label { base: NodeBase::with_name("window") });
//! let label: NodeRef = Rc::new(Label { base: NodeBase::with_name("label") });
//! label.node_base().set_parent(Some(&window)).unwrap();
//! assert!(Rc::ptr_eq(&label.node_base().parent().unwrap(), &window));
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, WeaveError};
use crate::event::Event;
use crate::system::System;

/// Shared handle to a node. The hierarchy owns nodes through these.
pub type NodeRef = Rc<dyn Node>;

/// Non-owning handle to a node, used for parent links, filter lists and
/// queued receivers.
pub type WeakNodeRef = Weak<dyn Node>;

/// A unique identifier for a node, used in logs and debug output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Get the raw u64 value of this node ID.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

fn next_node_id() -> NodeId {
    NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
}

/// A participant in the event hierarchy.
///
/// Both handlers receive the [`System`] so they can post, cancel or send
/// further events, start a nested loop, or call [`System::exit`].
pub trait Node {
    /// The parent link and filter list for this node.
    fn node_base(&self) -> &NodeBase;

    /// Handle an event sent or posted to this node.
    ///
    /// Return `true` if the event was handled. Unhandled events bubble to the
    /// parent.
    fn event(&self, _system: &System, _event: &Event) -> bool {
        false
    }

    /// Intercept an event addressed to `target`.
    ///
    /// Called when this node is installed as a filter on `target`. Returning
    /// `true` consumes the event: remaining filters and the target's own
    /// handler are skipped.
    fn event_filter(&self, _system: &System, _target: &NodeRef, _event: &Event) -> bool {
        false
    }
}

/// Parent link, filter list and name of a [`Node`].
pub struct NodeBase {
    id: NodeId,
    name: RefCell<String>,
    parent: RefCell<Option<WeakNodeRef>>,
    event_filters: RefCell<Vec<WeakNodeRef>>,
}

impl NodeBase {
    /// Create an unnamed base with no parent and no filters.
    pub fn new() -> Self {
        Self {
            id: next_node_id(),
            name: RefCell::new(String::new()),
            parent: RefCell::new(None),
            event_filters: RefCell::new(Vec::new()),
        }
    }

    /// Create a named base.
    pub fn with_name(name: impl Into<String>) -> Self {
        let base = Self::new();
        *base.name.borrow_mut() = name.into();
        base
    }

    /// The node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node's name.
    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    /// Set the node's name.
    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.borrow_mut() = name.into();
    }

    /// The raw parent link, live or not.
    pub fn parent_link(&self) -> Option<WeakNodeRef> {
        self.parent.borrow().clone()
    }

    /// The parent node, if there is one and it is still alive.
    pub fn parent(&self) -> Option<NodeRef> {
        self.parent.borrow().as_ref().and_then(Weak::upgrade)
    }

    /// Link this node under `parent`, or detach it with `None`.
    ///
    /// The link never keeps the parent alive. Whoever destroys a parent must
    /// detach or destroy its children first.
    ///
    /// # Errors
    ///
    /// Returns [`WeaveError::CircularParentage`] if `parent` is this node or
    /// one of its descendants.
    pub fn set_parent(&self, parent: Option<&NodeRef>) -> Result<()> {
        if let Some(parent) = parent {
            let mut current = Some(Rc::clone(parent));
            while let Some(node) = current {
                if node.node_base().id == self.id {
                    return Err(WeaveError::CircularParentage);
                }
                current = node.node_base().parent();
            }
        }
        *self.parent.borrow_mut() = parent.map(Rc::downgrade);
        Ok(())
    }

    /// Install `filter` as an event filter on this node.
    ///
    /// Filters run in installation order. Installing the same filter twice
    /// has no effect.
    pub fn install_event_filter(&self, filter: &NodeRef) {
        let addr = node_addr(filter);
        let mut filters = self.event_filters.borrow_mut();
        if !filters.iter().any(|f| weak_addr(f) == addr) {
            filters.push(Rc::downgrade(filter));
        }
    }

    /// Remove a previously installed filter. Returns `true` if it was found.
    pub fn remove_event_filter(&self, filter: &NodeRef) -> bool {
        let addr = node_addr(filter);
        let mut filters = self.event_filters.borrow_mut();
        let before = filters.len();
        filters.retain(|f| weak_addr(f) != addr);
        filters.len() != before
    }

    /// Snapshot of the installed filters, in installation order.
    pub fn event_filters(&self) -> Vec<WeakNodeRef> {
        self.event_filters.borrow().clone()
    }

    /// Drop filter entries whose node no longer exists.
    pub fn prune_event_filters(&self) {
        self.event_filters
            .borrow_mut()
            .retain(|f| f.strong_count() > 0);
    }
}

impl Default for NodeBase {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeBase")
            .field("id", &self.id)
            .field("name", &*self.name.borrow())
            .field("has_parent", &self.parent.borrow().is_some())
            .field("event_filters", &self.event_filters.borrow().len())
            .finish()
    }
}

/// Address of a node, ignoring the vtable, for identity comparisons.
#[inline]
pub(crate) fn node_addr(node: &NodeRef) -> *const () {
    Rc::as_ptr(node) as *const ()
}

/// Address of a weakly referenced node, live or not.
#[inline]
pub(crate) fn weak_addr(node: &WeakNodeRef) -> *const () {
    node.as_ptr() as *const ()
}
