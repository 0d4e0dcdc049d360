//! Ordered queue of pending events.
//!
//! Events live in a `BTreeMap` keyed by [`EventKey`], so iteration order is
//! dispatch order. A side index maps each tag to the keys carrying it, which
//! keeps tag-based replacement and cancellation off the full scan.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::trace;

use super::{Event, EventKey, Tag};
use crate::Asn;

pub struct EventQueue<A> {
    events: BTreeMap<EventKey, Event<A>>,
    by_tag: HashMap<Tag, BTreeSet<EventKey>>,
    next_sequence: u64,
}

impl<A> Default for EventQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> EventQueue<A> {
    pub fn new() -> Self {
        Self {
            events: BTreeMap::new(),
            by_tag: HashMap::new(),
            next_sequence: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Inserts an event and returns its key. Ties on `(time, priority)` are
    /// broken by insertion order: the earlier call dispatches first.
    ///
    /// This does not touch existing events with the same tag; callers that
    /// want replacement semantics call [`EventQueue::remove_tagged`] first.
    pub fn insert(&mut self, time: Asn, priority: i32, tag: Option<Tag>, action: A) -> EventKey {
        let key = EventKey {
            time,
            priority,
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        if let Some(tag) = &tag {
            self.by_tag.entry(tag.clone()).or_default().insert(key);
        }
        self.events.insert(key, Event { key, tag, action });
        key
    }

    /// Removes every pending event carrying `tag`, except one scheduled at
    /// `spare` when given. Returns how many events were removed.
    pub fn remove_tagged(&mut self, tag: &Tag, spare: Option<Asn>) -> usize {
        let Some(keys) = self.by_tag.get_mut(tag) else {
            return 0;
        };

        let doomed: Vec<EventKey> = keys
            .iter()
            .filter(|key| Some(key.time) != spare)
            .copied()
            .collect();

        for key in &doomed {
            keys.remove(key);
            self.events.remove(key);
        }
        if keys.is_empty() {
            self.by_tag.remove(tag);
        }

        if !doomed.is_empty() {
            trace!(%tag, removed = doomed.len(), "removed tagged events");
        }
        doomed.len()
    }

    /// Number of pending events carrying `tag`.
    pub fn count_tagged(&self, tag: &Tag) -> usize {
        self.by_tag.get(tag).map_or(0, BTreeSet::len)
    }

    pub fn contains_tag(&self, tag: &Tag) -> bool {
        self.count_tagged(tag) > 0
    }

    /// The earliest pending event.
    pub fn peek(&self) -> Option<&Event<A>> {
        self.events.values().next()
    }

    pub fn next_time(&self) -> Option<Asn> {
        self.events.keys().next().map(|key| key.time)
    }

    /// All events sharing the earliest pending time, in dispatch order.
    pub fn peek_earliest(&self) -> impl Iterator<Item = &Event<A>> {
        let time = self.next_time();
        self.events
            .values()
            .take_while(move |event| Some(event.time()) == time)
    }

    /// Pops the earliest event if it is due at `time`.
    pub fn pop_due(&mut self, time: Asn) -> Option<Event<A>> {
        let entry = self.events.first_entry()?;
        if entry.key().time != time {
            return None;
        }
        let event = entry.remove();
        self.unindex(&event);
        Some(event)
    }

    /// Removes and returns every event sharing the earliest pending time.
    pub fn pop_due_batch(&mut self) -> Vec<Event<A>> {
        let Some(time) = self.next_time() else {
            return Vec::new();
        };
        let mut batch = Vec::new();
        while let Some(event) = self.pop_due(time) {
            batch.push(event);
        }
        batch
    }

    /// Pending events in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Event<A>> {
        self.events.values()
    }

    /// Drops every pending event. The insertion counter keeps counting so
    /// keys handed out earlier are never reused.
    pub fn clear(&mut self) {
        self.events.clear();
        self.by_tag.clear();
    }

    fn unindex(&mut self, event: &Event<A>) {
        let Some(tag) = event.tag() else {
            return;
        };
        if let Some(keys) = self.by_tag.get_mut(tag) {
            keys.remove(&event.key());
            if keys.is_empty() {
                self.by_tag.remove(tag);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn orders_by_time_then_priority() {
        let mut queue = EventQueue::new();
        queue.insert(5, 0, None, "a");
        queue.insert(5, 1, None, "b");
        queue.insert(3, 0, None, "c");

        let order: Vec<_> = queue.pop_due_batch().into_iter().map(|e| *e.action()).collect();
        assert_eq!(order, vec!["c"]);
        let order: Vec<_> = queue.pop_due_batch().into_iter().map(|e| *e.action()).collect();
        assert_eq!(order, vec!["a", "b"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn ties_dispatch_in_insertion_order() {
        let mut queue = EventQueue::new();
        for i in 0..10 {
            queue.insert(7, 2, None, i);
        }
        let order: Vec<_> = queue.pop_due_batch().into_iter().map(|e| *e.action()).collect();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn remove_tagged_drops_all_matches() {
        let mut queue = EventQueue::new();
        let tag = Tag::node(1, "tx");
        queue.insert(4, 0, Some(tag.clone()), ());
        queue.insert(9, 0, Some(tag.clone()), ());
        queue.insert(6, 0, Some(Tag::node(2, "tx")), ());
        queue.insert(6, 0, None, ());

        assert_eq!(queue.remove_tagged(&tag, None), 2);
        assert!(!queue.contains_tag(&tag));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.remove_tagged(&tag, None), 0);
    }

    #[test]
    fn remove_tagged_spares_current_time() {
        let mut queue = EventQueue::new();
        let tag = Tag::global("beacon");
        queue.insert(4, 0, Some(tag.clone()), ());
        queue.insert(9, 0, Some(tag.clone()), ());

        assert_eq!(queue.remove_tagged(&tag, Some(4)), 1);
        assert_eq!(queue.count_tagged(&tag), 1);
        assert_eq!(queue.next_time(), Some(4));
    }

    #[test]
    fn pop_due_only_takes_matching_time() {
        let mut queue = EventQueue::new();
        queue.insert(2, 0, Some(Tag::global("x")), ());
        assert!(queue.pop_due(1).is_none());
        assert!(queue.pop_due(2).is_some());
        assert!(!queue.contains_tag(&Tag::global("x")));
        assert!(queue.pop_due(2).is_none());
    }

    #[test]
    fn peek_earliest_is_non_destructive() {
        let mut queue = EventQueue::new();
        queue.insert(3, 1, None, 'b');
        queue.insert(3, 0, None, 'a');
        queue.insert(8, 0, None, 'c');

        let peeked: Vec<_> = queue.peek_earliest().map(|e| *e.action()).collect();
        assert_eq!(peeked, vec!['a', 'b']);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek().map(|e| *e.action()), Some('a'));
    }

    #[test]
    fn clear_keeps_sequence_counter() {
        let mut queue = EventQueue::new();
        let first = queue.insert(1, 0, Some(Tag::global("x")), ());
        queue.clear();
        assert!(queue.is_empty());
        assert!(!queue.contains_tag(&Tag::global("x")));
        let second = queue.insert(1, 0, None, ());
        assert!(second.sequence > first.sequence);
    }

    proptest! {
        #[test]
        fn always_sorted_after_mutation(
            ops in prop::collection::vec((0u64..50, -3i32..3, prop::option::of(0u32..4), any::<bool>()), 1..200)
        ) {
            let mut queue = EventQueue::new();
            for (time, priority, tag, remove) in ops {
                let tag = tag.map(|id| Tag::node(id, "op"));
                match (&tag, remove) {
                    (Some(tag), true) => {
                        queue.remove_tagged(tag, None);
                    }
                    _ => {
                        if let Some(tag) = &tag {
                            queue.remove_tagged(tag, None);
                        }
                        queue.insert(time, priority, tag.clone(), ());
                    }
                }

                let keys: Vec<EventKey> = queue.iter().map(|e| e.key()).collect();
                prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
                for id in 0..4 {
                    prop_assert!(queue.count_tagged(&Tag::node(id, "op")) <= 1);
                }
            }
        }
    }
}
