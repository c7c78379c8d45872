//! Thread-safe event system: the queue plus filter, watchers and enable set.
//!
//! # The push pipeline (for beginners)
//!
//! Every event handed to [`EventSystem::push`] goes through the same steps:
//!
//! ```text
//!  push(event)
//!     │
//!     ├─ kind disabled?  ──────────────► dropped  (Ok(false))
//!     ├─ stamp timestamp
//!     ├─ run every watcher, in order     (observe only, cannot reject)
//!     ├─ run the filter  ─── rejects ──► dropped  (Ok(false))
//!     └─ append to queue ─── full ─────► dropped  (Ok(false), logged)
//! ```
//!
//! Watchers are how derived events are produced: the controller layer installs
//! one that turns raw joystick events into controller events and pushes them
//! back into this same system.
//!
//! # Reentrancy
//!
//! Callbacks run with **no** internal lock held.  The filter and watcher list
//! are cloned out of the mutex (they are `Arc`s, so this is a reference-count
//! bump) and the lock is released before any of them is called.  A watcher may
//! therefore call `push` again; nested pushes complete depth-first before the
//! outer event reaches the filter.

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use enum_map::EnumMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::queue::EventQueue;
use super::types::{EventKind, InputEvent};

/// Callback that may reject an event before it is queued.  Return `false` to drop.
pub type EventFilter = Arc<dyn Fn(&InputEvent) -> bool + Send + Sync>;

/// Callback observing every pushed event.  Receives the system so it can push more.
pub type EventWatcher = Arc<dyn Fn(&EventSystem, &InputEvent) + Send + Sync>;

/// Identifies a registered watcher for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatcherId(u64);

/// Errors returned by [`EventSystem`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The system has not been started, or has been stopped.
    #[error("event system is not active")]
    Inactive,

    /// The queue mutex was poisoned by a panicking thread.
    #[error("event queue lock is unavailable")]
    LockFailure,

    /// Startup could not bring the queue into a usable state.
    #[error("event system failed to start: {0}")]
    InitFailed(String),
}

struct Inner {
    active: bool,
    queue: EventQueue,
    filter: Option<EventFilter>,
    watchers: Arc<Vec<(WatcherId, EventWatcher)>>,
    enabled: EnumMap<EventKind, bool>,
}

impl Inner {
    fn reset(&mut self) {
        self.queue.clear();
        self.filter = None;
        self.watchers = Arc::new(Vec::new());
        self.enabled = EnumMap::from_fn(|_| true);
    }
}

/// The shared event queue and its callbacks.
pub struct EventSystem {
    inner: Mutex<Inner>,
    arrived: Condvar,
    epoch: Instant,
    next_watcher: AtomicU64,
}

impl EventSystem {
    /// Creates an inactive system whose queue holds at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                active: false,
                queue: EventQueue::with_capacity(capacity),
                filter: None,
                watchers: Arc::new(Vec::new()),
                enabled: EnumMap::from_fn(|_| true),
            }),
            arrived: Condvar::new(),
            epoch: Instant::now(),
            next_watcher: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, EventError> {
        self.inner.lock().map_err(|_| EventError::LockFailure)
    }

    fn lock_active(&self) -> Result<MutexGuard<'_, Inner>, EventError> {
        let inner = self.lock()?;
        if inner.active {
            Ok(inner)
        } else {
            Err(EventError::Inactive)
        }
    }

    /// Milliseconds since the system was created.  Wraps after ~49 days.
    pub fn ticks_ms(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// `Inactive → Active`.  Clears the queue, filter, watchers and disabled kinds.
    pub fn start(&self) -> Result<(), EventError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| EventError::InitFailed("queue lock poisoned".into()))?;
        inner.reset();
        inner.active = true;
        info!(capacity = inner.queue.capacity(), "event system started");
        Ok(())
    }

    /// `Active → Inactive`.  Clears everything and wakes any waiting thread.
    pub fn stop(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.reset();
            inner.active = false;
            info!("event system stopped");
        }
        self.arrived.notify_all();
    }

    pub fn is_active(&self) -> bool {
        self.lock().map(|inner| inner.active).unwrap_or(false)
    }

    // ── Pushing ──────────────────────────────────────────────────────────────

    /// Runs `event` through the push pipeline.
    ///
    /// Returns `Ok(true)` when the event was queued and `Ok(false)` when it was
    /// disabled, rejected by the filter or dropped because the queue is full.
    pub fn push(&self, mut event: InputEvent) -> Result<bool, EventError> {
        let kind = event.kind();
        let (filter, watchers) = {
            let inner = self.lock_active()?;
            if !inner.enabled[kind] {
                return Ok(false);
            }
            (inner.filter.clone(), Arc::clone(&inner.watchers))
        };

        event.timestamp_ms = self.ticks_ms();

        for (_, watcher) in watchers.iter() {
            watcher(self, &event);
        }

        if let Some(filter) = filter {
            if !filter(&event) {
                debug!(?kind, "event rejected by filter");
                return Ok(false);
            }
        }

        let stored = {
            let mut inner = self.lock_active()?;
            inner.queue.push_back(event).is_some()
        };
        if stored {
            self.arrived.notify_all();
        } else {
            warn!(?kind, "event queue full, dropping event");
        }
        Ok(stored)
    }

    /// Appends events directly, bypassing the enable set, watchers and filter.
    ///
    /// Returns the number actually stored.
    pub fn add(&self, events: &[InputEvent]) -> Result<usize, EventError> {
        let stored = self.lock_active()?.queue.add(events);
        if stored > 0 {
            self.arrived.notify_all();
        }
        if stored < events.len() {
            warn!(dropped = events.len() - stored, "event queue full");
        }
        Ok(stored)
    }

    // ── Reading ──────────────────────────────────────────────────────────────

    /// Copies up to `n` matching events without removing them.
    pub fn peek(&self, n: usize, range: RangeInclusive<EventKind>) -> Result<Vec<InputEvent>, EventError> {
        Ok(self.lock_active()?.queue.peek(n, range))
    }

    /// Removes and returns up to `n` matching events.
    pub fn get(&self, n: usize, range: RangeInclusive<EventKind>) -> Result<Vec<InputEvent>, EventError> {
        Ok(self.lock_active()?.queue.get(n, range))
    }

    /// Removes and returns the oldest event of any kind.
    pub fn poll(&self) -> Result<Option<InputEvent>, EventError> {
        Ok(self.get(1, EventKind::ALL)?.pop())
    }

    /// Returns `true` if a matching event is queued.
    pub fn has_event(&self, range: RangeInclusive<EventKind>) -> bool {
        self.lock_active()
            .map(|inner| inner.queue.contains(range))
            .unwrap_or(false)
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.queue.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest number of events ever queued at once.
    pub fn max_seen(&self) -> usize {
        self.lock().map(|inner| inner.queue.max_seen()).unwrap_or(0)
    }

    // ── Removing ─────────────────────────────────────────────────────────────

    /// Removes every queued event in `range`.  Returns the number removed.
    pub fn flush(&self, range: RangeInclusive<EventKind>) -> Result<usize, EventError> {
        Ok(self.lock_active()?.queue.flush(range))
    }

    /// Removes every queued event matching `pred`.  Returns the number removed.
    pub fn flush_where<F>(&self, mut pred: F) -> Result<usize, EventError>
    where
        F: FnMut(&InputEvent) -> bool,
    {
        let mut inner = self.lock_active()?;
        let before = inner.queue.len();
        inner.queue.retain(|event| !pred(event));
        Ok(before - inner.queue.len())
    }

    /// Drops every queued event `keep` returns `false` for.
    ///
    /// `keep` runs with the queue lock held and must not call back into the system.
    pub fn filter_events<F>(&self, keep: F) -> Result<(), EventError>
    where
        F: FnMut(&InputEvent) -> bool,
    {
        self.lock_active()?.queue.retain(keep);
        Ok(())
    }

    // ── Filter and watchers ──────────────────────────────────────────────────

    /// Flushes the queue, then installs `filter` (or removes it with `None`).
    pub fn set_filter(&self, filter: Option<EventFilter>) -> Result<(), EventError> {
        let mut inner = self.lock_active()?;
        inner.queue.clear();
        inner.filter = filter;
        Ok(())
    }

    pub fn filter(&self) -> Option<EventFilter> {
        self.lock().ok().and_then(|inner| inner.filter.clone())
    }

    /// Appends a watcher.  Watchers run in registration order.
    pub fn add_watcher(&self, watcher: EventWatcher) -> Result<WatcherId, EventError> {
        let id = WatcherId(self.next_watcher.fetch_add(1, Ordering::Relaxed));
        let mut inner = self.lock_active()?;
        Arc::make_mut(&mut inner.watchers).push((id, watcher));
        Ok(id)
    }

    /// Removes a watcher.  Returns `false` if it was not registered.
    ///
    /// A push already in progress on another thread may still call it once.
    pub fn remove_watcher(&self, id: WatcherId) -> Result<bool, EventError> {
        let mut inner = self.lock_active()?;
        let watchers = Arc::make_mut(&mut inner.watchers);
        let before = watchers.len();
        watchers.retain(|(existing, _)| *existing != id);
        Ok(watchers.len() != before)
    }

    // ── Enable set ───────────────────────────────────────────────────────────

    /// Enables or disables one kind and returns its previous state.
    ///
    /// Disabling a kind also flushes any queued events of that kind.
    pub fn set_event_enabled(&self, kind: EventKind, enabled: bool) -> Result<bool, EventError> {
        let mut inner = self.lock_active()?;
        let previous = std::mem::replace(&mut inner.enabled[kind], enabled);
        if !enabled {
            inner.queue.flush(kind.only());
        }
        debug!(?kind, enabled, "event kind state changed");
        Ok(previous)
    }

    pub fn is_event_enabled(&self, kind: EventKind) -> bool {
        self.lock().map(|inner| inner.enabled[kind]).unwrap_or(false)
    }

    // ── Waiting ──────────────────────────────────────────────────────────────

    /// Waits for a matching event and removes it.
    ///
    /// `pump` runs (without any lock held) before every check.  Between checks
    /// the thread sleeps for at most `granularity`, waking early when a push
    /// arrives.  `timeout = None` waits indefinitely; on expiry returns `Ok(None)`.
    pub fn wait_for<P>(
        &self,
        range: RangeInclusive<EventKind>,
        timeout: Option<Duration>,
        granularity: Duration,
        mut pump: P,
    ) -> Result<Option<InputEvent>, EventError>
    where
        P: FnMut(),
    {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            pump();

            let mut inner = self.lock_active()?;
            if let Some(event) = inner.queue.get(1, range.clone()).pop() {
                return Ok(Some(event));
            }
            let step = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    granularity.min(deadline - now)
                }
                None => granularity,
            };
            let (guard, _) = self
                .arrived
                .wait_timeout(inner, step)
                .map_err(|_| EventError::LockFailure)?;
            inner = guard;
            if !inner.active {
                return Err(EventError::Inactive);
            }
        }
    }
}

impl Default for EventSystem {
    fn default() -> Self {
        Self::new(super::queue::DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for EventSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSystem")
            .field("active", &self.is_active())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::EventPayload;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn started(capacity: usize) -> EventSystem {
        let events = EventSystem::new(capacity);
        events.start().expect("start");
        events
    }

    #[test]
    fn test_push_before_start_is_inactive() {
        let events = EventSystem::new(4);
        assert_eq!(events.push(InputEvent::quit()), Err(EventError::Inactive));
    }

    #[test]
    fn test_push_and_poll_preserve_fifo() {
        let events = started(8);
        for code in 0..3 {
            assert_eq!(events.push(InputEvent::user(code, 0, 0)), Ok(true));
        }

        let polled: Vec<i32> = std::iter::from_fn(|| events.poll().ok().flatten())
            .filter_map(|e| match e.payload {
                EventPayload::User(u) => Some(u.code),
                _ => None,
            })
            .collect();

        assert_eq!(polled, vec![0, 1, 2]);
    }

    #[test]
    fn test_full_queue_reports_drop() {
        let events = started(1);
        assert_eq!(events.push(InputEvent::quit()), Ok(true));
        assert_eq!(events.push(InputEvent::quit()), Ok(false));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_filter_rejects_but_watchers_still_see_event() {
        // Arrange
        let events = started(8);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        events
            .add_watcher(Arc::new(move |_: &EventSystem, _: &InputEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        events
            .set_filter(Some(Arc::new(|e: &InputEvent| e.kind() != EventKind::Quit)))
            .unwrap();

        // Act
        let quit = events.push(InputEvent::quit()).unwrap();
        let user = events.push(InputEvent::user(1, 0, 0)).unwrap();

        // Assert
        assert!(!quit);
        assert!(user);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_set_filter_flushes_queue() {
        let events = started(8);
        events.push(InputEvent::quit()).unwrap();
        events.set_filter(None).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_watcher_can_push_reentrantly() {
        // Arrange: every Quit produces a follow-up user event.
        let events = started(8);
        events
            .add_watcher(Arc::new(|system: &EventSystem, event: &InputEvent| {
                if event.kind() == EventKind::Quit {
                    system.push(InputEvent::user(42, 0, 0)).unwrap();
                }
            }))
            .unwrap();

        // Act
        events.push(InputEvent::quit()).unwrap();

        // Assert: the nested push completes before the outer event is queued.
        let queued = events.get(8, EventKind::ALL).unwrap();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].kind(), EventKind::User);
        assert_eq!(queued[1].kind(), EventKind::Quit);
    }

    #[test]
    fn test_removed_watcher_no_longer_runs() {
        let events = started(8);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let id = events
            .add_watcher(Arc::new(move |_: &EventSystem, _: &InputEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        assert_eq!(events.remove_watcher(id), Ok(true));
        assert_eq!(events.remove_watcher(id), Ok(false));
        events.push(InputEvent::quit()).unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disabling_kind_drops_and_flushes() {
        let events = started(8);
        events.push(InputEvent::user(1, 0, 0)).unwrap();
        events.push(InputEvent::quit()).unwrap();

        assert_eq!(events.set_event_enabled(EventKind::User, false), Ok(true));
        assert_eq!(events.push(InputEvent::user(2, 0, 0)), Ok(false));

        assert!(!events.is_event_enabled(EventKind::User));
        assert!(!events.has_event(EventKind::User.only()));
        assert!(events.has_event(EventKind::Quit.only()));
    }

    #[test]
    fn test_stop_clears_and_deactivates() {
        let events = started(8);
        events.push(InputEvent::quit()).unwrap();
        events.stop();

        assert!(!events.is_active());
        assert_eq!(events.len(), 0);
        assert_eq!(events.poll(), Err(EventError::Inactive));
    }

    #[test]
    fn test_wait_times_out_with_none() {
        let events = started(8);
        let mut pumps = 0;
        let got = events
            .wait_for(
                EventKind::ALL,
                Some(Duration::from_millis(30)),
                Duration::from_millis(10),
                || pumps += 1,
            )
            .unwrap();
        assert!(got.is_none());
        assert!(pumps >= 2);
    }

    #[test]
    fn test_wait_returns_event_pushed_from_pump() {
        let events = started(8);
        let got = events
            .wait_for(EventKind::ALL, None, Duration::from_millis(10), || {
                let _ = events.push(InputEvent::quit());
            })
            .unwrap();
        assert_eq!(got.map(|e| e.kind()), Some(EventKind::Quit));
    }

    #[test]
    fn test_wait_wakes_on_push_from_other_thread() {
        let events = Arc::new(started(8));
        let producer = Arc::clone(&events);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.push(InputEvent::user(5, 0, 0)).unwrap();
        });

        let got = events
            .wait_for(
                EventKind::User.only(),
                Some(Duration::from_secs(5)),
                Duration::from_millis(10),
                || {},
            )
            .unwrap();

        handle.join().unwrap();
        assert_eq!(got.map(|e| e.kind()), Some(EventKind::User));
    }

    #[test]
    fn test_flush_where_removes_matching_only() {
        let events = started(8);
        for code in 0..4 {
            events.push(InputEvent::user(code, 0, 0)).unwrap();
        }
        let removed = events
            .flush_where(|e| matches!(e.payload, EventPayload::User(u) if u.code % 2 == 0))
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_timestamps_are_stamped_on_push() {
        let events = started(8);
        thread::sleep(Duration::from_millis(5));
        events.push(InputEvent::quit()).unwrap();
        let event = events.poll().unwrap().unwrap();
        assert!(event.timestamp_ms >= 5);
    }
}
