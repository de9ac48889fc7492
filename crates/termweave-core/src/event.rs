//! Event types routed through the termweave dispatcher.
//!
//! An [`Event`] is a type tag plus an optional opaque payload. The dispatcher
//! only ever looks at the tag; payload structure belongs to the widgets that
//! produce and consume it.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// The type tag of an [`Event`].
///
/// Two tags are reserved by the dispatcher:
///
/// - [`EventType::None`] is the wildcard used by
///   [`System::send_posted_events`](crate::System::send_posted_events) to mean
///   "any type".
/// - [`EventType::DeferredDelete`] marks a scheduled destruction. It is only
///   delivered by a flush that asks for exactly this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Wildcard; matches every type when used as a flush filter.
    None,
    /// Scheduled destruction of the receiver.
    DeferredDelete,
    /// Undecoded terminal input bytes (payload: [`InputBytes`]).
    Input,
    /// A decoded key press.
    KeyPress,
    /// A mouse button went down.
    MouseButtonPress,
    /// A mouse button went up.
    MouseButtonRelease,
    /// A mouse button was double-clicked.
    MouseButtonDoubleClick,
    /// The mouse wheel moved.
    Wheel,
    /// The terminal or a widget changed size (payload: [`ResizePayload`]).
    Resize,
    /// A widget moved.
    Move,
    /// A widget must repaint.
    Paint,
    /// A widget gained keyboard focus.
    FocusIn,
    /// A widget lost keyboard focus.
    FocusOut,
    /// A widget became enabled.
    Enable,
    /// A widget became disabled.
    Disable,
    /// A widget became visible.
    Show,
    /// A widget was hidden.
    Hide,
    /// A child was attached to the receiver.
    ChildAdded,
    /// A child was detached from the receiver.
    ChildRemoved,
    /// A widget is asked to close.
    Close,
    /// A timer fired.
    Timer,
    /// Application-defined type.
    User(u16),
}

impl EventType {
    /// Whether this is the wildcard tag.
    #[inline]
    pub fn is_wildcard(self) -> bool {
        self == Self::None
    }
}

/// A unique identifier for an [`Event`].
///
/// Identity, not value, is what the posted-event queue compares: two events
/// built from the same type and payload still have different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

impl EventId {
    /// Get the raw u64 value of this event ID.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Global counter for generating unique event IDs.
static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

fn next_event_id() -> EventId {
    EventId(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Named priority levels for posted events.
///
/// Posting accepts any `i32`; these are the levels the framework itself uses.
/// Higher values are dispatched first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum EventPriority {
    /// Background work, repaint coalescing.
    Low = -1,
    /// Most application events.
    #[default]
    Normal = 0,
    /// User input.
    High = 1,
    /// Shutdown and other events that must overtake everything queued.
    Critical = 2,
}

impl From<EventPriority> for i32 {
    fn from(priority: EventPriority) -> Self {
        priority as i32
    }
}

/// A typed notification delivered to a [`Node`](crate::Node).
///
/// Events are immutable once built and own their payload. They are not
/// `Clone`: each event has a single identity from construction until it is
/// dropped after delivery.
pub struct Event {
    id: EventId,
    event_type: EventType,
    payload: Option<Box<dyn Any>>,
}

impl Event {
    /// Create an event with no payload.
    pub fn new(event_type: EventType) -> Self {
        Self {
            id: next_event_id(),
            event_type,
            payload: None,
        }
    }

    /// Create an event carrying a payload.
    pub fn with_payload<T: Any>(event_type: EventType, payload: T) -> Self {
        Self {
            id: next_event_id(),
            event_type,
            payload: Some(Box::new(payload)),
        }
    }

    /// Create a [`EventType::DeferredDelete`] event.
    pub fn deferred_delete() -> Self {
        Self::new(EventType::DeferredDelete)
    }

    /// This event's identity.
    #[inline]
    pub fn id(&self) -> EventId {
        self.id
    }

    /// This event's type tag.
    #[inline]
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Borrow the payload if it is a `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }

    /// Whether the event carries any payload.
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

/// Payload of [`EventType::Input`]: raw bytes read from the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBytes(pub Vec<u8>);

/// Payload of [`EventType::Resize`]: the new size in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePayload {
    /// Width in columns.
    pub width: u16,
    /// Height in rows.
    pub height: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_events_have_distinct_ids() {
        let a = Event::new(EventType::Paint);
        let b = Event::new(EventType::Paint);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.event_type(), b.event_type());
    }

    #[test]
    fn test_payload_downcast() {
        let event = Event::with_payload(
            EventType::Resize,
            ResizePayload {
                width: 80,
                height: 24,
            },
        );
        let size = event.payload::<ResizePayload>().copied();
        assert_eq!(
            size,
            Some(ResizePayload {
                width: 80,
                height: 24
            })
        );
        assert!(event.payload::<InputBytes>().is_none());
    }

    #[test]
    fn test_priority_levels_order() {
        assert!(i32::from(EventPriority::Critical) > i32::from(EventPriority::High));
        assert!(i32::from(EventPriority::High) > i32::from(EventPriority::Normal));
        assert!(i32::from(EventPriority::Normal) > i32::from(EventPriority::Low));
        assert_eq!(i32::from(EventPriority::default()), 0);
    }

    #[test]
    fn test_wildcard() {
        assert!(EventType::None.is_wildcard());
        assert!(!EventType::DeferredDelete.is_wildcard());
        assert!(!EventType::User(0).is_wildcard());
    }
}
