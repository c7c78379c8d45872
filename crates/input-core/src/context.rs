//! `InputContext`: the explicit lifecycle object that owns every subsystem.
//!
//! # What happens in `new` (for beginners)
//!
//! 1. The event system is created and started (Inactive → Active).
//! 2. The joystick subsystem is created; the controller subsystem shares it.
//! 3. Controller mappings load: built-ins, then configured files, then the
//!    environment variable.  A bad file is logged, not fatal.
//! 4. The controller watcher is registered, so every joystick event pushed
//!    from now on is also translated into controller events.
//! 5. With `use_producer_thread`, a [`ProducerThread`] starts polling the
//!    registered producers; otherwise the consumer polls them from `pump`.
//!
//! Dropping the context stops the thread and the event system, in that order.
//!
//! # Locking
//!
//! Each subsystem sits behind its own mutex.  A report is applied to its
//! subsystem under that lock, the lock is released, and only then are the
//! resulting events pushed.  Watchers running inside the push can therefore
//! lock any subsystem themselves.
//!
//! Every change that produces events (a report, a joystick close, a keyboard
//! reset, a warp, a remap) additionally runs under one ordering lock held
//! from the mutation until its last event is queued.  Queue order therefore
//! matches the order in which device state changed, whichever thread made
//! the change.  [`InputContext::push`] does not take the ordering lock, so a
//! watcher may push re-entrantly; watchers and filters must not call the
//! other mutating methods.

use std::io;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::PlatformBackend;
use crate::config::CoreConfig;
use crate::controller::{ControllerError, ControllerSubsystem, MappingDatabase, MappingUpdate};
use crate::device::InstanceId;
use crate::events::{
    EventError, EventFilter, EventKind, EventPayload, EventSystem, EventWatcher, InputEvent,
    WatcherId, WindowId,
};
use crate::joystick::JoystickSubsystem;
use crate::keyboard::{KeyboardSubsystem, Modifiers};
use crate::mouse::{MouseError, MouseSubsystem};
use crate::producer::{DeviceClass, DeviceProducer, DeviceReport, ProducerThread};

/// Errors returned by [`InputContext`].
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("event system error: {0}")]
    Events(#[from] EventError),

    #[error("failed to spawn producer thread: {0}")]
    ProducerSpawn(#[source] io::Error),

    #[error(transparent)]
    Controller(#[from] ControllerError),

    #[error(transparent)]
    Mouse(#[from] MouseError),

    #[error("{0} subsystem lock is poisoned")]
    LockFailure(&'static str),
}

/// State shared between the consumer and the producer thread.
struct CoreShared {
    events: EventSystem,
    joysticks: Arc<Mutex<JoystickSubsystem>>,
    controllers: Arc<ControllerSubsystem>,
    keyboard: Mutex<KeyboardSubsystem>,
    mouse: Mutex<MouseSubsystem>,
    producers: Mutex<Vec<Box<dyn DeviceProducer>>>,
    /// Held from a state change until its events are queued.
    ordering: Mutex<()>,
}

fn locked<T, R>(what: &'static str, mutex: &Mutex<T>, f: impl FnOnce(&mut T) -> R) -> Result<R, CoreError> {
    let mut guard = mutex.lock().map_err(|_| CoreError::LockFailure(what))?;
    Ok(f(&mut guard))
}

impl CoreShared {
    /// Polls every producer once and applies what they reported.
    fn pump_producers(&self) -> usize {
        let reports: Vec<DeviceReport> = match self.producers.lock() {
            Ok(mut producers) => producers.iter_mut().flat_map(|p| p.poll_once()).collect(),
            Err(_) => {
                warn!("producer list lock poisoned; skipping pump");
                return 0;
            }
        };
        let count = reports.len();
        for report in reports {
            if let Err(err) = self.dispatch(report) {
                warn!(error = %err, "device report not applied");
            }
        }
        count
    }

    fn dispatch(&self, report: DeviceReport) -> Result<(), CoreError> {
        self.ordered(|| self.apply(report))
    }

    /// Runs `f` under the ordering lock.
    fn in_order<R>(&self, f: impl FnOnce() -> R) -> R {
        // The lock guards no data, so a poisoned one is still usable.
        let _order = self.ordering.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Applies a state change and queues its events before any other change
    /// may start.
    fn ordered(&self, change: impl FnOnce() -> Result<Vec<InputEvent>, CoreError>) -> Result<(), CoreError> {
        self.in_order(|| {
            let events = change()?;
            self.push_all(events);
            Ok(())
        })
    }

    fn push_all(&self, events: Vec<InputEvent>) {
        for event in events {
            if let Err(err) = self.events.push(event) {
                debug!(error = %err, "event not delivered");
            }
        }
    }

    fn sync_joystick_focus(&self) -> Result<(), CoreError> {
        let present = locked("keyboard", &self.keyboard, |kb| kb.any_focus().is_some())?;
        locked("joystick", &self.joysticks, |j| j.set_focus_present(present))
    }

    /// Applies one report to its subsystem and returns the events it produced.
    fn apply(&self, report: DeviceReport) -> Result<Vec<InputEvent>, CoreError> {
        let events = match report {
            DeviceReport::Added(announcement) => match announcement.class {
                DeviceClass::Joystick => {
                    let (_, event) =
                        locked("joystick", &self.joysticks, |j| j.add_device(announcement.identity))?;
                    vec![event]
                }
                DeviceClass::Keyboard => {
                    locked("keyboard", &self.keyboard, |kb| kb.add_keyboard(&announcement.identity.name))?;
                    Vec::new()
                }
                DeviceClass::Mouse => {
                    locked("mouse", &self.mouse, |m| m.add_mouse(&announcement.identity.name))?;
                    Vec::new()
                }
                DeviceClass::Other(class) => {
                    warn!(%class, name = %announcement.identity.name, "unsupported device class ignored");
                    Vec::new()
                }
            },
            DeviceReport::Removed(announcement) => match announcement.class {
                DeviceClass::Joystick => {
                    locked("joystick", &self.joysticks, |j| j.remove_device(&announcement.identity))?
                }
                DeviceClass::Keyboard => {
                    let events = locked("keyboard", &self.keyboard, |kb| {
                        match kb.index_of(&announcement.identity.name) {
                            Some(index) => kb.remove_keyboard(index),
                            None => Vec::new(),
                        }
                    })?;
                    self.sync_joystick_focus()?;
                    events
                }
                DeviceClass::Mouse => locked("mouse", &self.mouse, |m| {
                    match m.index_of(&announcement.identity.name) {
                        Some(index) => m.remove_mouse(index),
                        None => Vec::new(),
                    }
                })?,
                DeviceClass::Other(class) => {
                    warn!(%class, name = %announcement.identity.name, "unsupported device class ignored");
                    Vec::new()
                }
            },

            DeviceReport::JoyAxis { device, axis, value } => {
                locked("joystick", &self.joysticks, |j| j.report_axis(device, axis, value))?
                    .into_iter()
                    .collect()
            }
            DeviceReport::JoyButton { device, button, pressed } => {
                locked("joystick", &self.joysticks, |j| j.report_button(device, button, pressed))?
                    .into_iter()
                    .collect()
            }
            DeviceReport::JoyHat { device, hat, value } => {
                locked("joystick", &self.joysticks, |j| j.report_hat(device, hat, value))?
                    .into_iter()
                    .collect()
            }
            DeviceReport::JoyHatAxis { device, hat, horizontal, value } => {
                locked("joystick", &self.joysticks, |j| j.report_hat_axis(device, hat, horizontal, value))?
                    .into_iter()
                    .collect()
            }
            DeviceReport::JoyBall { device, ball, dx, dy } => {
                locked("joystick", &self.joysticks, |j| j.report_ball(device, ball, dx, dy))?
                    .into_iter()
                    .collect()
            }

            DeviceReport::Key { keyboard, scancode, pressed } => {
                locked("keyboard", &self.keyboard, |kb| kb.send_key(keyboard, scancode, pressed))?
            }
            DeviceReport::Text { keyboard, text } => {
                locked("keyboard", &self.keyboard, |kb| kb.send_text(keyboard, &text))?
            }
            DeviceReport::Editing { keyboard, text, start, length } => locked("keyboard", &self.keyboard, |kb| {
                kb.send_editing(keyboard, &text, start, length)
            })?,
            DeviceReport::KeyboardFocus { keyboard, window } => {
                let events = locked("keyboard", &self.keyboard, |kb| kb.set_focus(keyboard, window))?;
                self.sync_joystick_focus()?;
                events
            }

            DeviceReport::MouseMotion { mouse, window, relative, x, y } => {
                locked("mouse", &self.mouse, |m| m.send_motion(mouse, window, relative, x, y))?
            }
            DeviceReport::MouseButton { mouse, window, button, pressed } => {
                locked("mouse", &self.mouse, |m| m.send_button(mouse, window, button, pressed))?
            }
            DeviceReport::MouseWheel { mouse, window, dx, dy } => {
                locked("mouse", &self.mouse, |m| m.send_wheel(mouse, window, dx, dy))?
            }
            DeviceReport::MouseFocus { mouse, window } => {
                locked("mouse", &self.mouse, |m| m.set_focus(mouse, window))?
            }

            DeviceReport::Window { window, event } => vec![InputEvent::window(window, event)],
            DeviceReport::SysWm { window, message } => {
                vec![InputEvent::new(EventPayload::SysWm { window, message })]
            }
            DeviceReport::Quit => vec![InputEvent::quit()],
        };
        Ok(events)
    }
}

/// Owner of the event system and every device subsystem.
pub struct InputContext {
    config: CoreConfig,
    shared: Arc<CoreShared>,
    producer_thread: Option<ProducerThread>,
    controller_watcher: WatcherId,
}

impl InputContext {
    /// Builds and starts every subsystem.
    ///
    /// # Errors
    ///
    /// Fails if the event system cannot start or the producer thread cannot
    /// be spawned.  Unreadable mapping files are logged and skipped.
    pub fn new(config: CoreConfig, backend: Arc<dyn PlatformBackend>) -> Result<Self, CoreError> {
        let events = EventSystem::new(config.queue_capacity);
        events.start()?;

        let joysticks = Arc::new(Mutex::new(JoystickSubsystem::new(
            config.allow_background_joystick_events,
        )));

        let mut database = MappingDatabase::with_defaults();
        for path in &config.mapping_files {
            match database.add_mappings_from_file(path) {
                Ok(stored) => info!(path = %path.display(), stored, "controller mappings loaded"),
                Err(err) => warn!(error = %err, "controller mapping file skipped"),
            }
        }
        database.load_env_overrides(&config.mapping_env_var);
        info!(mappings = database.len(), "controller mapping database ready");

        let controllers = Arc::new(ControllerSubsystem::new(Arc::clone(&joysticks), database));
        let controller_watcher = events.add_watcher(controllers.watcher())?;

        let shared = Arc::new(CoreShared {
            events,
            joysticks,
            controllers,
            keyboard: Mutex::new(KeyboardSubsystem::new()),
            mouse: Mutex::new(MouseSubsystem::new(
                backend,
                config.double_click_time(),
                config.double_click_radius,
            )),
            producers: Mutex::new(Vec::new()),
            ordering: Mutex::new(()),
        });

        let producer_thread = if config.use_producer_thread {
            let worker = Arc::clone(&shared);
            let thread = ProducerThread::spawn(config.producer_interval(), move || {
                worker.pump_producers();
            })
            .map_err(CoreError::ProducerSpawn)?;
            Some(thread)
        } else {
            None
        };

        info!(
            capacity = config.queue_capacity,
            producer_thread = producer_thread.is_some(),
            "input context started"
        );
        Ok(Self {
            config,
            shared,
            producer_thread,
            controller_watcher,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn events(&self) -> &EventSystem {
        &self.shared.events
    }

    /// `true` while a dedicated producer thread is polling producers.
    pub fn has_producer_thread(&self) -> bool {
        self.producer_thread.is_some()
    }

    // ── Producers ────────────────────────────────────────────────────────────

    /// Registers a producer.  The producer thread, if any, is paused meanwhile.
    pub fn add_producer(&self, producer: Box<dyn DeviceProducer>) -> Result<(), CoreError> {
        let _pause = self.producer_thread.as_ref().map(ProducerThread::pause);
        let name = producer.name().to_owned();
        locked("producer", &self.shared.producers, |producers| producers.push(producer))?;
        info!(producer = %name, "producer registered");
        Ok(())
    }

    pub fn producer_count(&self) -> usize {
        self.shared.producers.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Polls producers once, unless the producer thread already does.
    ///
    /// Returns the number of reports applied.
    pub fn pump(&self) -> usize {
        if self.producer_thread.is_some() {
            return 0;
        }
        self.shared.pump_producers()
    }

    /// Applies a report directly, as if a producer had returned it.
    pub fn dispatch(&self, report: DeviceReport) -> Result<(), CoreError> {
        self.shared.dispatch(report)
    }

    // ── Consuming events ─────────────────────────────────────────────────────

    /// Pumps, then removes and returns the oldest event, if any.
    pub fn poll(&self) -> Result<Option<InputEvent>, CoreError> {
        self.pump();
        Ok(self.shared.events.poll()?)
    }

    /// Blocks until an event arrives.
    pub fn wait(&self) -> Result<InputEvent, CoreError> {
        loop {
            if let Some(event) = self.wait_for(EventKind::ALL, None)? {
                return Ok(event);
            }
        }
    }

    /// Blocks until an event arrives or `timeout` passes.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Option<InputEvent>, CoreError> {
        self.wait_for(EventKind::ALL, Some(timeout))
    }

    /// Blocks until an event in `range` arrives or the optional timeout passes.
    pub fn wait_for(
        &self,
        range: RangeInclusive<EventKind>,
        timeout: Option<Duration>,
    ) -> Result<Option<InputEvent>, CoreError> {
        let granularity = self.config.wait_granularity();
        Ok(self
            .shared
            .events
            .wait_for(range, timeout, granularity, || {
                self.pump();
            })?)
    }

    pub fn peek(&self, n: usize, range: RangeInclusive<EventKind>) -> Result<Vec<InputEvent>, CoreError> {
        Ok(self.shared.events.peek(n, range)?)
    }

    pub fn get(&self, n: usize, range: RangeInclusive<EventKind>) -> Result<Vec<InputEvent>, CoreError> {
        Ok(self.shared.events.get(n, range)?)
    }

    pub fn has_event(&self, range: RangeInclusive<EventKind>) -> bool {
        self.shared.events.has_event(range)
    }

    pub fn flush(&self, range: RangeInclusive<EventKind>) -> Result<usize, CoreError> {
        Ok(self.shared.events.flush(range)?)
    }

    // ── Producing events ─────────────────────────────────────────────────────

    /// Pushes an application event.  `Ok(false)` if it was disabled, filtered or dropped.
    pub fn push(&self, event: InputEvent) -> Result<bool, CoreError> {
        Ok(self.shared.events.push(event)?)
    }

    pub fn push_user(&self, code: i32, data1: i64, data2: i64) -> Result<bool, CoreError> {
        self.push(InputEvent::user(code, data1, data2))
    }

    pub fn push_quit(&self) -> Result<bool, CoreError> {
        self.push(InputEvent::quit())
    }

    // ── Filter, watchers and enable set ──────────────────────────────────────

    pub fn set_filter(&self, filter: Option<EventFilter>) -> Result<(), CoreError> {
        Ok(self.shared.events.set_filter(filter)?)
    }

    pub fn filter(&self) -> Option<EventFilter> {
        self.shared.events.filter()
    }

    pub fn add_watcher(&self, watcher: EventWatcher) -> Result<WatcherId, CoreError> {
        Ok(self.shared.events.add_watcher(watcher)?)
    }

    /// Removes an application watcher.  The built-in controller watcher cannot be removed.
    pub fn remove_watcher(&self, id: WatcherId) -> Result<bool, CoreError> {
        if id == self.controller_watcher {
            return Ok(false);
        }
        Ok(self.shared.events.remove_watcher(id)?)
    }

    pub fn set_event_enabled(&self, kind: EventKind, enabled: bool) -> Result<bool, CoreError> {
        Ok(self.shared.events.set_event_enabled(kind, enabled)?)
    }

    pub fn is_event_enabled(&self, kind: EventKind) -> bool {
        self.shared.events.is_event_enabled(kind)
    }

    // ── Joysticks ────────────────────────────────────────────────────────────

    /// Runs `f` with read access to the joystick subsystem.
    pub fn joysticks<R>(&self, f: impl FnOnce(&JoystickSubsystem) -> R) -> Result<R, CoreError> {
        locked("joystick", &self.shared.joysticks, |j| f(j))
    }

    pub fn open_joystick(&self, device_index: usize) -> Result<Option<InstanceId>, CoreError> {
        locked("joystick", &self.shared.joysticks, |j| j.open(device_index))
    }

    /// Releases a joystick; the last release pushes forced neutral events.
    pub fn close_joystick(&self, id: InstanceId) -> Result<(), CoreError> {
        self.shared
            .ordered(|| locked("joystick", &self.shared.joysticks, |j| j.close(id)))
    }

    /// Trackball motion accumulated since the previous call.
    pub fn joystick_ball(&self, id: InstanceId, ball: u8) -> Result<(i32, i32), CoreError> {
        locked("joystick", &self.shared.joysticks, |j| j.ball(id, ball))
    }

    pub fn set_allow_background_joystick_events(&self, allow: bool) -> Result<(), CoreError> {
        locked("joystick", &self.shared.joysticks, |j| j.set_allow_background(allow))
    }

    // ── Controllers ──────────────────────────────────────────────────────────

    pub fn controllers(&self) -> &ControllerSubsystem {
        &self.shared.controllers
    }

    pub fn open_controller(&self, device_index: usize) -> Result<InstanceId, CoreError> {
        Ok(self.shared.controllers.open(device_index)?)
    }

    pub fn close_controller(&self, id: InstanceId) -> Result<(), CoreError> {
        let shared = &self.shared;
        Ok(shared.in_order(|| shared.controllers.close(id, &shared.events))?)
    }

    /// Adds or replaces a mapping; open controllers with that GUID are remapped live.
    pub fn add_mapping(&self, record: &str) -> Result<MappingUpdate, CoreError> {
        let shared = &self.shared;
        Ok(shared.in_order(|| shared.controllers.add_mapping(record, &shared.events))?)
    }

    pub fn add_mappings_from_str(&self, text: &str) -> Result<usize, CoreError> {
        let shared = &self.shared;
        Ok(shared.in_order(|| shared.controllers.add_mappings_from_str(text, &shared.events))?)
    }

    // ── Keyboard ─────────────────────────────────────────────────────────────

    pub fn keyboard<R>(&self, f: impl FnOnce(&KeyboardSubsystem) -> R) -> Result<R, CoreError> {
        locked("keyboard", &self.shared.keyboard, |kb| f(kb))
    }

    pub fn set_modifiers(&self, index: usize, modifiers: Modifiers) -> Result<(), CoreError> {
        locked("keyboard", &self.shared.keyboard, |kb| kb.set_modifiers(index, modifiers))
    }

    /// Releases every pressed key of a keyboard, pushing the key-up events.
    pub fn reset_keyboard(&self, index: usize) -> Result<(), CoreError> {
        self.shared
            .ordered(|| locked("keyboard", &self.shared.keyboard, |kb| kb.reset(index)))
    }

    // ── Mouse ────────────────────────────────────────────────────────────────

    pub fn mouse<R>(&self, f: impl FnOnce(&MouseSubsystem) -> R) -> Result<R, CoreError> {
        locked("mouse", &self.shared.mouse, |m| f(m))
    }

    /// Pressed buttons and motion accumulated since the previous call.
    pub fn relative_mouse_state(&self, index: usize) -> Result<(crate::mouse::MouseButtons, i32, i32), CoreError> {
        locked("mouse", &self.shared.mouse, |m| m.relative_state(index))
    }

    /// Switches relative mode.  Motion reported before the switch is either
    /// flushed or queued after it, never in between.
    pub fn set_relative_mouse_mode(&self, index: usize, enabled: bool) -> Result<(), CoreError> {
        let shared = &self.shared;
        shared.in_order(|| -> Result<(), CoreError> {
            locked("mouse", &shared.mouse, |m| m.set_relative_mode(index, enabled, &shared.events))??;
            Ok(())
        })
    }

    pub fn warp_mouse(&self, index: usize, window: WindowId, x: i32, y: i32) -> Result<(), CoreError> {
        self.shared
            .ordered(|| locked("mouse", &self.shared.mouse, |m| m.warp(index, window, x, y)))
    }

    pub fn show_cursor(&self, visible: bool) -> Result<(), CoreError> {
        locked("mouse", &self.shared.mouse, |m| m.show_cursor(visible))
    }
}

impl Drop for InputContext {
    fn drop(&mut self) {
        if let Some(mut thread) = self.producer_thread.take() {
            thread.stop();
        }
        self.shared.events.stop();
        info!("input context stopped");
    }
}

impl std::fmt::Debug for InputContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputContext")
            .field("config", &self.config)
            .field("events", &self.shared.events)
            .field("producer_thread", &self.producer_thread.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::events::{JoyAxisEvent, JoyHatEvent};
    use crate::joystick::{DeviceIdentity, HatEncoding, HatPosition};
    use crate::keyboard::Scancode;
    use crate::producer::{DeviceAnnouncement, MockProducer};

    fn context(config: CoreConfig) -> InputContext {
        InputContext::new(config, Arc::new(HeadlessBackend::new())).unwrap()
    }

    fn pad() -> DeviceIdentity {
        DeviceIdentity::new("Pad")
            .with_guid("030000005e0400008e02000014010000".parse().unwrap())
            .with_counts(6, 11, 1, 0)
    }

    #[test]
    fn test_new_context_is_active_and_empty() {
        let ctx = context(CoreConfig::default());
        assert!(ctx.events().is_active());
        assert_eq!(ctx.poll().unwrap(), None);
        assert!(!ctx.has_producer_thread());
    }

    #[test]
    fn test_mapped_joystick_added_yields_both_added_events() {
        // Arrange
        let ctx = context(CoreConfig::default());

        // Act
        ctx.dispatch(DeviceReport::Added(DeviceAnnouncement::joystick(pad()))).unwrap();

        // Assert
        let kinds: Vec<EventKind> = ctx.get(10, EventKind::ALL).unwrap().iter().map(InputEvent::kind).collect();
        assert_eq!(kinds, vec![EventKind::ControllerDeviceAdded, EventKind::JoyDeviceAdded]);
    }

    #[test]
    fn test_joystick_events_need_focus_unless_background_allowed() {
        // Arrange
        let ctx = context(CoreConfig::default());
        ctx.dispatch(DeviceReport::Added(DeviceAnnouncement::joystick(pad()))).unwrap();
        ctx.dispatch(DeviceReport::Added(DeviceAnnouncement::keyboard("kbd"))).unwrap();
        ctx.open_joystick(0).unwrap();
        ctx.flush(EventKind::ALL).unwrap();
        let axis = || DeviceReport::JoyAxis { device: 0, axis: 0, value: 1000 };

        // Act / Assert: no focus, suppressed
        ctx.dispatch(axis()).unwrap();
        assert!(!ctx.has_event(EventKind::JOYSTICK));

        ctx.dispatch(DeviceReport::KeyboardFocus { keyboard: 0, window: Some(WindowId(1)) }).unwrap();
        ctx.dispatch(axis()).unwrap();
        assert!(ctx.has_event(EventKind::JoyAxisMotion.only()));
    }

    #[test]
    fn test_mock_producer_is_pumped_by_poll() {
        // Arrange
        let ctx = context(CoreConfig::default());
        let (producer, handle) = MockProducer::new("mock");
        ctx.add_producer(Box::new(producer)).unwrap();
        handle.inject(DeviceReport::Added(DeviceAnnouncement::keyboard("kbd")));
        handle.inject(DeviceReport::Key { keyboard: 0, scancode: Scancode::KeyZ, pressed: true });

        // Act
        let event = ctx.poll().unwrap();

        // Assert
        assert_eq!(event.map(|e| e.kind()), Some(EventKind::KeyDown));
        assert!(ctx.keyboard(|kb| kb.is_pressed(0, Scancode::KeyZ)).unwrap());
    }

    #[test]
    fn test_wait_timeout_returns_none_when_idle() {
        let ctx = context(CoreConfig {
            wait_granularity_ms: 1,
            ..CoreConfig::default()
        });
        assert_eq!(ctx.wait_timeout(Duration::from_millis(5)).unwrap(), None);
    }

    #[test]
    fn test_producer_thread_delivers_reports() {
        // Arrange
        let ctx = context(CoreConfig {
            use_producer_thread: true,
            ..CoreConfig::default()
        });
        let (producer, handle) = MockProducer::new("threaded");
        ctx.add_producer(Box::new(producer)).unwrap();

        // Act
        handle.inject(DeviceReport::Quit);
        let event = ctx.wait_timeout(Duration::from_secs(5)).unwrap();

        // Assert
        assert_eq!(event.map(|e| e.kind()), Some(EventKind::Quit));
        assert_eq!(ctx.pump(), 0);
    }

    #[test]
    fn test_unknown_device_class_is_ignored() {
        let ctx = context(CoreConfig::default());
        let report = DeviceReport::Added(crate::producer::DeviceAnnouncement {
            class: DeviceClass::Other("tablet".into()),
            identity: DeviceIdentity::new("Wacom"),
        });

        ctx.dispatch(report).unwrap();

        assert!(!ctx.has_event(EventKind::ALL));
    }

    #[test]
    fn test_controller_watcher_cannot_be_removed() {
        let ctx = context(CoreConfig::default());
        assert!(!ctx.remove_watcher(ctx.controller_watcher).unwrap());
    }

    #[test]
    fn test_last_joystick_close_pushes_neutral_axis() {
        // Arrange
        let ctx = context(CoreConfig {
            allow_background_joystick_events: true,
            ..CoreConfig::default()
        });
        ctx.dispatch(DeviceReport::Added(DeviceAnnouncement::joystick(pad()))).unwrap();
        let id = ctx.open_joystick(0).unwrap().unwrap();
        ctx.dispatch(DeviceReport::JoyAxis { device: 0, axis: 2, value: -900 }).unwrap();
        ctx.flush(EventKind::ALL).unwrap();

        // Act
        ctx.close_joystick(id).unwrap();

        // Assert
        let events = ctx.get(10, EventKind::JoyAxisMotion.only()).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].payload,
            EventPayload::JoyAxisMotion(JoyAxisEvent { axis: 2, value: 0, .. })
        ));
    }

    #[test]
    fn test_dispatched_hat_values_are_quantized_or_dropped() {
        // Arrange
        let ctx = context(CoreConfig {
            allow_background_joystick_events: true,
            ..CoreConfig::default()
        });
        let bitmask_pad = DeviceIdentity::new("Bitmask").with_counts(0, 0, 1, 0);
        let pov = DeviceIdentity::new("Pov")
            .with_counts(0, 0, 1, 0)
            .with_hat_encoding(HatEncoding::Logical { min: 0, max: 7 });
        ctx.dispatch(DeviceReport::Added(DeviceAnnouncement::joystick(bitmask_pad))).unwrap();
        ctx.dispatch(DeviceReport::Added(DeviceAnnouncement::joystick(pov))).unwrap();
        let bitmask = ctx.open_joystick(0).unwrap().unwrap();
        let logical = ctx.open_joystick(1).unwrap().unwrap();
        ctx.flush(EventKind::ALL).unwrap();
        let up_and_down = i32::from((HatPosition::UP | HatPosition::DOWN).bits());

        // Act
        ctx.dispatch(DeviceReport::JoyHat { device: 0, hat: 0, value: up_and_down }).unwrap();
        ctx.dispatch(DeviceReport::JoyHat { device: 1, hat: 0, value: 6 }).unwrap();

        // Assert
        assert_eq!(ctx.joysticks(|j| j.hat(bitmask, 0)).unwrap(), HatPosition::CENTERED);
        assert_eq!(ctx.joysticks(|j| j.hat(logical, 0)).unwrap(), HatPosition::LEFT);
        let hats = ctx.get(10, EventKind::JoyHatMotion.only()).unwrap();
        assert_eq!(hats.len(), 1);
        assert!(matches!(hats[0].payload, EventPayload::JoyHatMotion(JoyHatEvent { which, .. }) if which == logical));
    }

    #[test]
    fn test_concurrent_close_and_reports_keep_queue_in_step_with_state() {
        // Arrange
        let ctx = context(CoreConfig {
            allow_background_joystick_events: true,
            queue_capacity: 65_536,
            ..CoreConfig::default()
        });
        ctx.dispatch(DeviceReport::Added(DeviceAnnouncement::joystick(pad()))).unwrap();
        let id = ctx.open_joystick(0).unwrap().unwrap();

        // Act: one thread reports axis motion while another closes and reopens.
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..2_000i16 {
                    let value = (i % 50 + 1) * 100;
                    ctx.dispatch(DeviceReport::JoyAxis { device: 0, axis: 0, value }).unwrap();
                }
            });
            scope.spawn(|| {
                for _ in 0..300 {
                    ctx.close_joystick(id).unwrap();
                    ctx.open_joystick(0).unwrap();
                }
            });
        });

        // Assert: the last queued axis value is the cached one.
        let last = ctx
            .get(usize::MAX, EventKind::JoyAxisMotion.only())
            .unwrap()
            .into_iter()
            .filter_map(|e| match e.payload {
                EventPayload::JoyAxisMotion(JoyAxisEvent { axis: 0, value, .. }) => Some(value),
                _ => None,
            })
            .last();
        let cached = ctx.joysticks(|j| j.axis(id, 0)).unwrap();
        assert_eq!(last.unwrap_or(0), cached);
    }

    #[test]
    fn test_keyboard_removal_releases_pressed_keys() {
        let ctx = context(CoreConfig::default());
        ctx.dispatch(DeviceReport::Added(DeviceAnnouncement::keyboard("kbd"))).unwrap();
        ctx.dispatch(DeviceReport::KeyboardFocus { keyboard: 0, window: Some(WindowId(3)) }).unwrap();
        ctx.dispatch(DeviceReport::Key { keyboard: 0, scancode: Scancode::KeyA, pressed: true }).unwrap();
        ctx.flush(EventKind::ALL).unwrap();

        ctx.dispatch(DeviceReport::Removed(DeviceAnnouncement::keyboard("kbd"))).unwrap();

        assert!(ctx.has_event(EventKind::KeyUp.only()));
        assert_eq!(ctx.keyboard(KeyboardSubsystem::keyboard_count).unwrap(), 0);
    }
}
