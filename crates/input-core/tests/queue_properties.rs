//! Property tests for the event queue.
//!
//! Random push/cut/get sequences are checked against a plain `Vec` model of
//! the same queue.  A threaded test then runs producers and a consumer
//! against one small `EventSystem`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use input_core::events::{EventQueue, UserEvent, WindowEventKind};
use input_core::{EventKind, EventPayload, EventSystem, InputEvent, WindowId};
use proptest::prelude::*;

/// Builds events of a few distinct kinds, tagged so they can be told apart.
fn event(tag: u8) -> InputEvent {
    match tag % 3 {
        0 => InputEvent::user(i32::from(tag), 0, 0),
        1 => InputEvent::window(WindowId(u32::from(tag)), WindowEventKind::Shown),
        _ => InputEvent::quit(),
    }
}

proptest! {
    #[test]
    fn test_queue_never_exceeds_capacity(capacity in 1usize..32, tags in prop::collection::vec(any::<u8>(), 0..100)) {
        let mut queue = EventQueue::with_capacity(capacity);
        let mut stored = 0usize;
        for tag in &tags {
            if queue.push_back(event(*tag)).is_some() {
                stored += 1;
            }
            prop_assert!(queue.len() <= capacity);
        }
        prop_assert_eq!(stored, tags.len().min(capacity));
        prop_assert_eq!(queue.max_seen(), stored);
    }

    #[test]
    fn test_range_get_preserves_fifo_order(tags in prop::collection::vec(any::<u8>(), 0..64)) {
        // Arrange
        let mut queue = EventQueue::with_capacity(128);
        let events: Vec<InputEvent> = tags.iter().map(|t| event(*t)).collect();
        for e in &events {
            queue.push_back(e.clone());
        }
        let users: Vec<InputEvent> = events.iter().filter(|e| e.kind() == EventKind::User).cloned().collect();
        let others: Vec<InputEvent> = events.iter().filter(|e| e.kind() != EventKind::User).cloned().collect();

        // Act
        let got = queue.get(usize::MAX, EventKind::User.only());

        // Assert
        prop_assert_eq!(got, users);
        prop_assert_eq!(queue.iter().cloned().collect::<Vec<_>>(), others);
    }

    #[test]
    fn test_cut_in_random_order_matches_model(
        tags in prop::collection::vec(any::<u8>(), 1..48),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..48),
    ) {
        let mut queue = EventQueue::with_capacity(64);
        let mut model: Vec<(input_core::events::EntryHandle, InputEvent)> = Vec::new();
        for tag in &tags {
            let e = event(*tag);
            if let Some(handle) = queue.push_back(e.clone()) {
                model.push((handle, e));
            }
        }

        for pick in picks {
            if model.is_empty() {
                break;
            }
            let (handle, expected) = model.remove(pick.index(model.len()));
            prop_assert_eq!(queue.cut(handle), Some(expected));
            prop_assert_eq!(queue.cut(handle), None);
        }

        prop_assert_eq!(queue.len(), model.len());
        let remaining: Vec<InputEvent> = model.into_iter().map(|(_, e)| e).collect();
        prop_assert_eq!(queue.iter().cloned().collect::<Vec<_>>(), remaining);
    }
}

#[test]
fn test_concurrent_add_and_get_lose_and_duplicate_nothing() {
    // Arrange
    const PRODUCERS: i32 = 4;
    const PER_PRODUCER: i32 = 500;
    const CAPACITY: usize = 16;
    let events = EventSystem::new(CAPACITY);
    events.start().unwrap();
    let over_capacity = AtomicBool::new(false);

    // Act: producers retry while the queue is full; one consumer drains it.
    let received = thread::scope(|scope| {
        for producer in 0..PRODUCERS {
            let events = &events;
            scope.spawn(move || {
                for seq in 0..PER_PRODUCER {
                    let event = InputEvent::user(producer, i64::from(seq), 0);
                    while !events.push(event.clone()).unwrap() {
                        thread::yield_now();
                    }
                }
            });
        }

        let consumer = scope.spawn(|| {
            let total = (PRODUCERS * PER_PRODUCER) as usize;
            let mut received = Vec::with_capacity(total);
            while received.len() < total {
                if events.len() > CAPACITY {
                    over_capacity.store(true, Ordering::Relaxed);
                }
                let batch = events.get(4, EventKind::User.only()).unwrap();
                if batch.is_empty() {
                    thread::yield_now();
                }
                received.extend(batch);
            }
            received
        });
        consumer.join().unwrap()
    });

    // Assert
    assert!(!over_capacity.load(Ordering::Relaxed));
    assert!(events.max_seen() <= CAPACITY);
    assert!(events.is_empty());
    let mut next = vec![0i64; PRODUCERS as usize];
    for event in received {
        let EventPayload::User(UserEvent { code, data1, .. }) = event.payload else {
            panic!("unexpected event {event:?}");
        };
        // Each producer's events arrive exactly once and in push order.
        assert_eq!(data1, next[code as usize], "producer {code}");
        next[code as usize] += 1;
    }
    assert!(next.iter().all(|n| *n == i64::from(PER_PRODUCER)));
}
