//! Dedicated producer thread with a pause handshake.
//!
//! # States (for beginners)
//!
//! ```text
//!            pause()                 top of next iteration
//!  Running ───────────► PausePending ──────────────────────► Paused
//!     ▲                                                        │
//!     └──────────────────── last PauseGuard dropped ───────────┘
//!
//!  any state ── stop() / drop ──► Stopping ──► thread exits, joined
//! ```
//!
//! `pause()` blocks until the producer thread has acknowledged, so when it
//! returns the thread is guaranteed not to be inside its work function.  The
//! consumer uses this to mutate device lists without racing the producer.

use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use tracing::{debug, info, warn};

/// Lifecycle of the producer thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerState {
    Running,
    PausePending,
    Paused,
    Stopping,
}

#[derive(Debug)]
struct Control {
    state: ProducerState,
    pauses: u32,
}

#[derive(Debug)]
struct Shared {
    control: Mutex<Control>,
    changed: Condvar,
}

impl Shared {
    fn lock(&self) -> Option<MutexGuard<'_, Control>> {
        self.control.lock().ok()
    }
}

/// Handle to the running producer thread.  Dropping it stops and joins the thread.
#[derive(Debug)]
pub struct ProducerThread {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl ProducerThread {
    /// Starts a thread that calls `work` every `interval` until stopped.
    pub fn spawn<F>(interval: Duration, work: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::new(Shared {
            control: Mutex::new(Control {
                state: ProducerState::Running,
                pauses: 0,
            }),
            changed: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("input-producer".to_string())
            .spawn(move || run(&thread_shared, interval, work))?;
        let thread_id = handle.thread().id();
        info!(interval_ms = interval.as_millis() as u64, "producer thread started");
        Ok(Self {
            shared,
            handle: Some(handle),
            thread_id,
        })
    }

    pub fn state(&self) -> ProducerState {
        self.shared
            .lock()
            .map_or(ProducerState::Stopping, |control| control.state)
    }

    /// `true` when called from the producer thread itself.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Suspends the producer until the returned guard is dropped.
    ///
    /// Blocks until the thread acknowledges.  From the producer thread itself
    /// this returns immediately with a guard that does nothing.
    pub fn pause(&self) -> PauseGuard<'_> {
        if self.is_current() {
            return PauseGuard { shared: None };
        }
        let Some(mut control) = self.shared.lock() else {
            return PauseGuard { shared: None };
        };
        if control.state == ProducerState::Stopping {
            return PauseGuard { shared: None };
        }
        control.pauses += 1;
        if control.state == ProducerState::Running {
            control.state = ProducerState::PausePending;
            self.shared.changed.notify_all();
        }
        let waited = self
            .shared
            .changed
            .wait_while(control, |c| c.state == ProducerState::PausePending);
        if waited.is_err() {
            warn!("producer control lock poisoned while pausing");
        }
        debug!("producer paused");
        PauseGuard {
            shared: Some(&self.shared),
        }
    }

    /// Stops the thread and waits for it to exit.
    pub fn stop(&mut self) {
        if let Some(mut control) = self.shared.lock() {
            control.state = ProducerState::Stopping;
            self.shared.changed.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("producer thread panicked");
            }
            info!("producer thread stopped");
        }
    }
}

impl Drop for ProducerThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Keeps the producer paused while alive.
#[must_use = "the producer resumes as soon as the guard is dropped"]
#[derive(Debug)]
pub struct PauseGuard<'a> {
    shared: Option<&'a Shared>,
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        let Some(shared) = self.shared else {
            return;
        };
        if let Some(mut control) = shared.lock() {
            control.pauses = control.pauses.saturating_sub(1);
            let paused = matches!(control.state, ProducerState::Paused | ProducerState::PausePending);
            if control.pauses == 0 && paused {
                control.state = ProducerState::Running;
                shared.changed.notify_all();
                debug!("producer resumed");
            }
        }
    }
}

fn run<F>(shared: &Shared, interval: Duration, mut work: F)
where
    F: FnMut(),
{
    loop {
        {
            let Some(mut control) = shared.lock() else {
                return;
            };
            loop {
                match control.state {
                    ProducerState::Stopping => return,
                    ProducerState::Running => break,
                    ProducerState::PausePending => {
                        control.state = ProducerState::Paused;
                        shared.changed.notify_all();
                    }
                    ProducerState::Paused => {
                        control = match shared.changed.wait(control) {
                            Ok(guard) => guard,
                            Err(_) => return,
                        };
                    }
                }
            }
        }

        work();

        let Some(control) = shared.lock() else {
            return;
        };
        if shared
            .changed
            .wait_timeout_while(control, interval, |c| c.state == ProducerState::Running)
            .is_err()
        {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn counting_thread() -> (ProducerThread, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let thread = ProducerThread::spawn(Duration::from_millis(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        (thread, count)
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_thread_runs_work_repeatedly() {
        let (_thread, count) = counting_thread();
        wait_until(|| count.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn test_pause_stops_work_until_guard_dropped() {
        // Arrange
        let (thread, count) = counting_thread();
        wait_until(|| count.load(Ordering::SeqCst) >= 1);

        // Act
        let guard = thread.pause();
        let frozen = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));

        // Assert
        assert_eq!(thread.state(), ProducerState::Paused);
        assert_eq!(count.load(Ordering::SeqCst), frozen);

        drop(guard);
        wait_until(|| count.load(Ordering::SeqCst) > frozen);
        assert_eq!(thread.state(), ProducerState::Running);
    }

    #[test]
    fn test_nested_pauses_resume_after_last_guard() {
        let (thread, count) = counting_thread();
        let outer = thread.pause();
        let inner = thread.pause();
        drop(inner);
        let frozen = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::SeqCst), frozen);

        drop(outer);
        wait_until(|| count.load(Ordering::SeqCst) > frozen);
    }

    #[test]
    fn test_stop_joins_the_thread() {
        let (mut thread, count) = counting_thread();
        thread.stop();
        let after = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::SeqCst), after);
        assert_eq!(thread.state(), ProducerState::Stopping);
        let _noop = thread.pause();
    }

    #[test]
    fn test_pause_from_producer_thread_is_noop() {
        // Arrange
        let seen = Arc::new(Mutex::new(None));
        let seen_in_work = Arc::clone(&seen);
        let holder: Arc<Mutex<Option<ProducerThread>>> = Arc::new(Mutex::new(None));
        let holder_in_work = Arc::clone(&holder);

        // Act
        let thread = ProducerThread::spawn(Duration::from_millis(1), move || {
            if let Ok(guard) = holder_in_work.try_lock() {
                if let Some(thread) = guard.as_ref() {
                    let _pause = thread.pause();
                    *seen_in_work.lock().unwrap() = Some(thread.state());
                }
            }
        })
        .unwrap();
        *holder.lock().unwrap() = Some(thread);

        // Assert
        wait_until(|| seen.lock().unwrap().is_some());
        assert_eq!(*seen.lock().unwrap(), Some(ProducerState::Running));

        let taken = holder.lock().unwrap().take();
        drop(taken);
    }
}
