//! Queued, not-yet-delivered events.
//!
//! [`PostedEventQueue`] keeps its entries in dispatch order: higher priority
//! first, and among equal priorities the entry posted first. The sequence
//! number assigned at insertion is what breaks priority ties.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;

use crate::event::{Event, EventId};
use crate::logging::targets;
use crate::node::{node_addr, weak_addr, NodeRef, WeakNodeRef};

/// Where an entry sits in dispatch order.
///
/// Positions compare the way entries are dispatched: a smaller position is
/// delivered first. A scan can resume after a position with
/// [`PostedEventQueue::take_next_matching`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueuePosition {
    priority: Reverse<i32>,
    sequence: u64,
}

impl QueuePosition {
    fn new(priority: i32, sequence: u64) -> Self {
        Self {
            priority: Reverse(priority),
            sequence,
        }
    }
}

/// An event waiting in a [`PostedEventQueue`] for its receiver.
pub struct PostedEvent {
    receiver: WeakNodeRef,
    event: Event,
    priority: i32,
    /// Sequence number for stable ordering of same-priority events.
    sequence: u64,
}

impl PostedEvent {
    fn new(receiver: WeakNodeRef, event: Event, priority: i32, sequence: u64) -> Self {
        Self {
            receiver,
            event,
            priority,
            sequence,
        }
    }

    /// The node this event is addressed to. The queue does not keep it alive.
    pub fn receiver(&self) -> &WeakNodeRef {
        &self.receiver
    }

    /// Whether this entry is addressed to `node`.
    pub fn is_for(&self, node: &NodeRef) -> bool {
        weak_addr(&self.receiver) == node_addr(node)
    }

    /// The queued event.
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// The priority the event was posted with.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Position among all events ever inserted into the owning queue.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// This entry's place in dispatch order.
    pub fn position(&self) -> QueuePosition {
        QueuePosition::new(self.priority, self.sequence)
    }

    /// Split into receiver and event for delivery.
    pub fn into_parts(self) -> (WeakNodeRef, Event) {
        (self.receiver, self.event)
    }
}

impl fmt::Debug for PostedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostedEvent")
            .field("event", &self.event)
            .field("priority", &self.priority)
            .field("sequence", &self.sequence)
            .field("receiver_alive", &(self.receiver.strong_count() > 0))
            .finish()
    }
}

/// Priority-ordered queue of [`PostedEvent`]s.
///
/// Entries are kept sorted at insertion, so iteration, [`peek_front`] and
/// [`pop_front`] all observe dispatch order.
///
/// [`peek_front`]: Self::peek_front
/// [`pop_front`]: Self::pop_front
#[derive(Debug, Default)]
pub struct PostedEventQueue {
    entries: BTreeMap<QueuePosition, PostedEvent>,
    next_sequence: u64,
}

impl PostedEventQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `event` for `receiver`.
    ///
    /// The entry is placed after every entry of equal or higher priority, so
    /// equal priorities come out in insertion order.
    pub fn insert(&mut self, receiver: WeakNodeRef, event: Event, priority: i32) -> EventId {
        let id = event.id();
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let entry = PostedEvent::new(receiver, event, priority, sequence);
        self.entries.insert(entry.position(), entry);
        tracing::trace!(
            target: targets::QUEUE,
            event_id = id.as_u64(),
            priority,
            sequence,
            "queued event"
        );
        id
    }

    /// Remove and drop the entry holding the event with `id`.
    ///
    /// Returns `true` if an entry was removed. Removing an event that is not
    /// queued (never posted, already delivered, already removed) is a no-op.
    pub fn remove_by_identity(&mut self, id: EventId) -> bool {
        let found = self
            .entries
            .iter()
            .find(|(_, e)| e.event.id() == id)
            .map(|(position, _)| *position);
        match found {
            Some(position) => {
                self.entries.remove(&position);
                tracing::trace!(target: targets::QUEUE, event_id = id.as_u64(), "removed queued event");
                true
            }
            None => false,
        }
    }

    /// Remove every entry matching `pred`, in dispatch order.
    ///
    /// Each queued entry is tested exactly once. Entries that do not match
    /// stay queued in their original relative order.
    pub fn take_matching<F>(&mut self, mut pred: F) -> Vec<PostedEvent>
    where
        F: FnMut(&PostedEvent) -> bool,
    {
        let mut taken = Vec::new();
        for (position, entry) in std::mem::take(&mut self.entries) {
            if pred(&entry) {
                taken.push(entry);
            } else {
                self.entries.insert(position, entry);
            }
        }
        taken
    }

    /// Remove the first entry matching `pred` that comes after `after` in
    /// dispatch order, or from the front when `after` is `None`.
    ///
    /// Entries at or before `after` are not tested. Passing the position of
    /// the previously taken entry walks the queue once across repeated calls,
    /// while entries cancelled between calls are simply no longer there.
    pub fn take_next_matching<F>(
        &mut self,
        after: Option<QueuePosition>,
        mut pred: F,
    ) -> Option<PostedEvent>
    where
        F: FnMut(&PostedEvent) -> bool,
    {
        let start = match after {
            Some(position) => Bound::Excluded(position),
            None => Bound::Unbounded,
        };
        let position = self
            .entries
            .range((start, Bound::Unbounded))
            .find(|(_, entry)| pred(entry))
            .map(|(position, _)| *position)?;
        self.entries.remove(&position)
    }

    /// The entry that would be dispatched next.
    pub fn peek_front(&self) -> Option<&PostedEvent> {
        self.entries.values().next()
    }

    /// Remove the entry that would be dispatched next.
    pub fn pop_front(&mut self) -> Option<PostedEvent> {
        self.entries.pop_first().map(|(_, entry)| entry)
    }

    /// Iterate over the queued entries in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &PostedEvent> {
        self.entries.values()
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The sequence number the next inserted entry will receive.
    ///
    /// Every entry currently queued has a smaller sequence number.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::event::EventType;
    use crate::node::{Node, NodeBase};

    struct Sink {
        base: NodeBase,
    }

    impl Node for Sink {
        fn node_base(&self) -> &NodeBase {
            &self.base
        }
    }

    fn sink() -> NodeRef {
        Rc::new(Sink {
            base: NodeBase::new(),
        })
    }

    fn priorities(queue: &PostedEventQueue) -> Vec<(i32, u64)> {
        queue.iter().map(|e| (e.priority(), e.sequence())).collect()
    }

    #[test]
    fn test_priority_then_fifo_order() {
        let node = sink();
        let mut queue = PostedEventQueue::new();
        for priority in [1, 5, 5, 2] {
            queue.insert(Rc::downgrade(&node), Event::new(EventType::Paint), priority);
        }

        assert_eq!(priorities(&queue), vec![(5, 1), (5, 2), (2, 3), (1, 0)]);

        let mut popped = Vec::new();
        while let Some(entry) = queue.pop_front() {
            popped.push((entry.priority(), entry.sequence()));
        }
        assert_eq!(popped, vec![(5, 1), (5, 2), (2, 3), (1, 0)]);
    }

    #[test]
    fn test_negative_priorities_go_last() {
        let node = sink();
        let mut queue = PostedEventQueue::new();
        queue.insert(Rc::downgrade(&node), Event::new(EventType::Paint), -3);
        queue.insert(Rc::downgrade(&node), Event::new(EventType::Paint), 0);
        queue.insert(Rc::downgrade(&node), Event::new(EventType::Paint), -3);

        assert_eq!(priorities(&queue), vec![(0, 1), (-3, 0), (-3, 2)]);
        assert_eq!(queue.peek_front().map(|e| e.sequence()), Some(1));
    }

    #[test]
    fn test_remove_by_identity() {
        let node = sink();
        let mut queue = PostedEventQueue::new();
        let keep = queue.insert(Rc::downgrade(&node), Event::new(EventType::Paint), 0);
        let drop_id = queue.insert(Rc::downgrade(&node), Event::new(EventType::Paint), 0);

        assert!(queue.remove_by_identity(drop_id));
        assert!(!queue.remove_by_identity(drop_id));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek_front().map(|e| e.event().id()), Some(keep));
    }

    #[test]
    fn test_take_matching_partitions_in_order() {
        let node = sink();
        let mut queue = PostedEventQueue::new();
        queue.insert(Rc::downgrade(&node), Event::new(EventType::Paint), 0);
        queue.insert(Rc::downgrade(&node), Event::new(EventType::Resize), 0);
        queue.insert(Rc::downgrade(&node), Event::new(EventType::Paint), 0);
        queue.insert(Rc::downgrade(&node), Event::new(EventType::Resize), 1);

        let taken = queue.take_matching(|e| e.event().event_type() == EventType::Resize);
        let taken: Vec<u64> = taken.iter().map(|e| e.sequence()).collect();
        assert_eq!(taken, vec![3, 1]);
        assert_eq!(priorities(&queue), vec![(0, 0), (0, 2)]);
    }

    #[test]
    fn test_take_matching_nothing_terminates() {
        let node = sink();
        let mut queue = PostedEventQueue::new();
        for _ in 0..3 {
            queue.insert(Rc::downgrade(&node), Event::new(EventType::Paint), 0);
        }
        let mut calls = 0;
        let taken = queue.take_matching(|_| {
            calls += 1;
            false
        });
        assert!(taken.is_empty());
        assert_eq!(calls, 3);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_take_next_matching_from_front() {
        let node = sink();
        let mut queue = PostedEventQueue::new();
        queue.insert(Rc::downgrade(&node), Event::new(EventType::Paint), 0);
        queue.insert(Rc::downgrade(&node), Event::new(EventType::Close), 0);
        queue.insert(Rc::downgrade(&node), Event::new(EventType::Close), 0);

        let first = queue.take_next_matching(None, |e| e.event().event_type() == EventType::Close);
        assert_eq!(first.map(|e| e.sequence()), Some(1));
        assert_eq!(queue.len(), 2);
        assert!(queue
            .take_next_matching(None, |e| e.event().event_type() == EventType::Timer)
            .is_none());
    }

    #[test]
    fn test_take_next_matching_skips_entries_before_cursor() {
        let node = sink();
        let mut queue = PostedEventQueue::new();
        queue.insert(Rc::downgrade(&node), Event::new(EventType::Close), 3);
        queue.insert(Rc::downgrade(&node), Event::new(EventType::Close), 0);
        let cursor = queue.peek_front().map(PostedEvent::position);

        let next = queue.take_next_matching(cursor, |_| true);
        assert_eq!(next.map(|e| (e.priority(), e.sequence())), Some((0, 1)));
        assert!(queue.take_next_matching(cursor, |_| true).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_resumed_scan_tests_each_entry_once() {
        let node = sink();
        let mut queue = PostedEventQueue::new();
        let n = 500;
        for _ in 0..n {
            queue.insert(Rc::downgrade(&node), Event::deferred_delete(), 10);
        }
        for _ in 0..n {
            queue.insert(Rc::downgrade(&node), Event::new(EventType::Paint), 0);
        }

        let mut evaluations = 0;
        let mut taken = 0;
        let mut cursor = None;
        while let Some(entry) = queue.take_next_matching(cursor, |e| {
            evaluations += 1;
            e.event().event_type() == EventType::Paint
        }) {
            cursor = Some(entry.position());
            taken += 1;
        }

        assert_eq!(taken, n);
        assert_eq!(evaluations, 2 * n);
        assert_eq!(queue.len(), n);
    }

    #[test]
    fn test_is_for_receiver() {
        let a = sink();
        let b = sink();
        let mut queue = PostedEventQueue::new();
        queue.insert(Rc::downgrade(&a), Event::new(EventType::Paint), 0);
        let entry = queue.peek_front().unwrap();
        assert!(entry.is_for(&a));
        assert!(!entry.is_for(&b));
    }

    #[test]
    fn test_next_sequence_bounds_queued_entries() {
        let node = sink();
        let mut queue = PostedEventQueue::new();
        assert_eq!(queue.next_sequence(), 0);
        queue.insert(Rc::downgrade(&node), Event::new(EventType::Paint), 0);
        queue.insert(Rc::downgrade(&node), Event::new(EventType::Paint), 0);
        let bound = queue.next_sequence();
        assert!(queue.iter().all(|e| e.sequence() < bound));
    }
}
