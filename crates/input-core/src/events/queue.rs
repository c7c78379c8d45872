//! Bounded FIFO of [`InputEvent`]s with O(1) removal from any position.
//!
//! # How the queue is stored (for beginners)
//!
//! A classic linked list allocates a node per element and links nodes with
//! pointers.  Here the nodes live in one `Vec` (the *arena*) and the links are
//! plain indices into it:
//!
//! ```text
//!   head ──► [slot 2] ◄──► [slot 0] ◄──► [slot 3] ◄── tail
//!             free list: [1, 4]
//! ```
//!
//! Removing an entry from the middle only relinks its two neighbours, and its
//! slot goes onto the free list for reuse.  Each slot carries a *generation*
//! counter that is bumped on every reuse; an [`EntryHandle`] remembers the
//! generation it was issued for, so a stale handle can never cut a newer entry
//! that happens to occupy the same slot.
//!
//! This type does no locking.  [`EventSystem`](super::EventSystem) wraps it in
//! a mutex.

use std::ops::RangeInclusive;

use super::types::{EventKind, InputEvent};

/// Default maximum number of queued events.
pub const DEFAULT_CAPACITY: usize = 65535;

/// Stable reference to one queued entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryHandle {
    index: usize,
    generation: u32,
}

#[derive(Debug)]
struct Entry {
    event: InputEvent,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Arena-backed doubly linked event queue.
#[derive(Debug)]
pub struct EventQueue {
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
    capacity: usize,
    max_seen: usize,
}

impl EventQueue {
    /// Creates an empty queue holding at most `capacity` events.
    ///
    /// Slots are allocated on demand, so a large capacity costs nothing up front.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            capacity,
            max_seen: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Highest number of events ever queued at once.
    pub fn max_seen(&self) -> usize {
        self.max_seen
    }

    /// Appends one event.  Returns `None` when the queue is full.
    pub fn push_back(&mut self, event: InputEvent) -> Option<EntryHandle> {
        if self.len >= self.capacity {
            return None;
        }
        let entry = Entry {
            event,
            prev: self.tail,
            next: None,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index].entry = Some(entry);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                self.slots.len() - 1
            }
        };
        match self.tail {
            Some(tail) => {
                if let Some(prev) = self.entry_mut(tail) {
                    prev.next = Some(index);
                }
            }
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;
        self.max_seen = self.max_seen.max(self.len);
        Some(EntryHandle {
            index,
            generation: self.slots[index].generation,
        })
    }

    /// Appends as many of `events` as fit and returns how many were stored.
    pub fn add(&mut self, events: &[InputEvent]) -> usize {
        events
            .iter()
            .take_while(|event| self.push_back((*event).clone()).is_some())
            .count()
    }

    /// Copies up to `n` events whose kind lies in `range`, oldest first.
    pub fn peek(&self, n: usize, range: RangeInclusive<EventKind>) -> Vec<InputEvent> {
        self.iter()
            .filter(|event| range.contains(&event.kind()))
            .take(n)
            .cloned()
            .collect()
    }

    /// Removes and returns up to `n` events whose kind lies in `range`, oldest first.
    ///
    /// Non-matching entries keep their relative order.
    pub fn get(&mut self, n: usize, range: RangeInclusive<EventKind>) -> Vec<InputEvent> {
        let matching: Vec<EntryHandle> = self
            .handles_where(|event| range.contains(&event.kind()))
            .into_iter()
            .take(n)
            .collect();
        matching.into_iter().filter_map(|h| self.cut(h)).collect()
    }

    /// Returns `true` if at least one queued event lies in `range`.
    pub fn contains(&self, range: RangeInclusive<EventKind>) -> bool {
        self.iter().any(|event| range.contains(&event.kind()))
    }

    /// Number of queued events whose kind lies in `range`.
    pub fn count(&self, range: RangeInclusive<EventKind>) -> usize {
        self.iter().filter(|event| range.contains(&event.kind())).count()
    }

    /// Removes the entry `handle` refers to and returns its event.
    ///
    /// Returns `None` for a handle whose entry was already removed.  Runs in
    /// constant time regardless of the entry's position.
    pub fn cut(&mut self, handle: EntryHandle) -> Option<InputEvent> {
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);

        match entry.prev {
            Some(prev) => {
                if let Some(prev) = self.entry_mut(prev) {
                    prev.next = entry.next;
                }
            }
            None => self.head = entry.next,
        }
        match entry.next {
            Some(next) => {
                if let Some(next) = self.entry_mut(next) {
                    next.prev = entry.prev;
                }
            }
            None => self.tail = entry.prev,
        }
        self.free.push(handle.index);
        self.len -= 1;
        Some(entry.event)
    }

    /// Handles of every queued entry, oldest first.
    pub fn handles(&self) -> Vec<EntryHandle> {
        self.handles_where(|_| true)
    }

    /// Removes every event whose kind lies in `range`.
    pub fn flush(&mut self, range: RangeInclusive<EventKind>) -> usize {
        let before = self.len;
        self.retain(|event| !range.contains(&event.kind()));
        before - self.len
    }

    /// Keeps only the events for which `keep` returns `true`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&InputEvent) -> bool,
    {
        for handle in self.handles_where(|event| !keep(event)) {
            self.cut(handle);
        }
    }

    /// Removes every event.  Capacity and the high-water mark are kept.
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.entry.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            self.free.push(index);
        }
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Iterates queued events oldest first.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            queue: self,
            cursor: self.head,
        }
    }

    fn handles_where<F>(&self, mut pred: F) -> Vec<EntryHandle>
    where
        F: FnMut(&InputEvent) -> bool,
    {
        let mut out = Vec::new();
        let mut cursor = self.head;
        while let Some(index) = cursor {
            let slot = &self.slots[index];
            let Some(entry) = slot.entry.as_ref() else {
                break;
            };
            if pred(&entry.event) {
                out.push(EntryHandle {
                    index,
                    generation: slot.generation,
                });
            }
            cursor = entry.next;
        }
        out
    }

    fn entry_mut(&mut self, index: usize) -> Option<&mut Entry> {
        self.slots.get_mut(index).and_then(|slot| slot.entry.as_mut())
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

/// Oldest-first iterator over an [`EventQueue`].
pub struct Iter<'a> {
    queue: &'a EventQueue,
    cursor: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a InputEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let entry = self.queue.slots.get(index)?.entry.as_ref()?;
        self.cursor = entry.next;
        Some(&entry.event)
    }
}
