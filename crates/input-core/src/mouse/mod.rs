//! Mouse normalization: position, buttons, click counting, wheel, focus and
//! relative mode.
//!
//! Like the keyboard layer, [`MouseSubsystem`] is a `&mut self` state machine
//! that returns the events it produced.  What it adds is a dependency on the
//! window system, reached through an injected [`PlatformBackend`]:
//!
//! - absolute positions are clamped to the focused window's size,
//! - [`MouseSubsystem::warp`] asks the backend to move the pointer,
//! - relative mode is switched on and off through the backend.
//!
//! # Click counting (for beginners)
//!
//! Each button remembers when and where it was last pressed.  A new press
//! within `double_click_time` of the previous one, and no further than
//! `double_click_radius` pixels away on either axis, increments the click
//! count (2 = double click, 3 = triple click, ...).  Otherwise the count starts
//! again at 1.  The matching release reports the same count as its press.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::PlatformBackend;
use crate::device::{DeviceHandle, DeviceRecord, DeviceRegistry, InstanceIdAllocator};
use crate::events::{
    EventError, EventKind, EventPayload, EventSystem, InputEvent, MouseButtonEvent,
    MouseMotionEvent, MouseWheelEvent, WindowEventKind, WindowId,
};

/// Errors returned by [`MouseSubsystem::set_relative_mode`].
#[derive(Debug, Error)]
pub enum MouseError {
    #[error("relative mouse mode is not supported by the platform")]
    RelativeModeUnsupported,

    #[error(transparent)]
    Events(#[from] EventError),
}

/// A mouse button number.  Buttons above [`MouseButton::X2`] are allowed but
/// have no bit in [`MouseButtons`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MouseButton(pub u8);

impl MouseButton {
    pub const LEFT: MouseButton = MouseButton(1);
    pub const MIDDLE: MouseButton = MouseButton(2);
    pub const RIGHT: MouseButton = MouseButton(3);
    pub const X1: MouseButton = MouseButton(4);
    pub const X2: MouseButton = MouseButton(5);

    /// The button's bit in a [`MouseButtons`] set.
    pub fn mask(self) -> MouseButtons {
        match self.0 {
            1..=32 => MouseButtons::from_bits_retain(1u32 << (self.0 - 1)),
            _ => MouseButtons::empty(),
        }
    }
}

bitflags! {
    /// Set of pressed mouse buttons.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MouseButtons: u32 {
        const LEFT = 1 << 0;
        const MIDDLE = 1 << 1;
        const RIGHT = 1 << 2;
        const X1 = 1 << 3;
        const X2 = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy)]
struct ClickState {
    last_press: Instant,
    x: i32,
    y: i32,
    count: u8,
}

/// Per-device pointer state.
#[derive(Debug, Clone, Default)]
pub struct MouseState {
    x: i32,
    y: i32,
    /// Last absolute position reported by the device, before clamping.
    last_x: i32,
    last_y: i32,
    xdelta: i32,
    ydelta: i32,
    buttons: MouseButtons,
    pressed: Vec<MouseButton>,
    relative_mode: bool,
    clicks: HashMap<MouseButton, ClickState>,
}

impl MouseState {
    fn is_down(&self, button: MouseButton) -> bool {
        self.pressed.contains(&button)
    }

    fn set_down(&mut self, button: MouseButton, pressed: bool) {
        if pressed {
            self.pressed.push(button);
        } else {
            self.pressed.retain(|b| *b != button);
        }
        self.buttons.set(button.mask(), pressed);
    }
}

/// All attached mice.
pub struct MouseSubsystem {
    devices: DeviceRegistry<MouseState>,
    ids: InstanceIdAllocator,
    backend: Arc<dyn PlatformBackend>,
    double_click_time: Duration,
    double_click_radius: i32,
    cursor_visible: bool,
}

impl MouseSubsystem {
    pub fn new(backend: Arc<dyn PlatformBackend>, double_click_time: Duration, double_click_radius: i32) -> Self {
        Self {
            devices: DeviceRegistry::new(),
            ids: InstanceIdAllocator::new(),
            backend,
            double_click_time,
            double_click_radius,
            cursor_visible: true,
        }
    }

    fn handle(&self, index: usize) -> Option<DeviceHandle> {
        self.devices.nth(index)
    }

    fn device_state(&self, index: usize) -> Option<&MouseState> {
        self.handle(index)
            .and_then(|h| self.devices.get(h))
            .map(|record| &record.state)
    }

    fn state_mut(&mut self, index: usize) -> Option<&mut MouseState> {
        let handle = self.handle(index)?;
        self.devices.get_mut(handle).map(|record| &mut record.state)
    }

    // ── Devices ──────────────────────────────────────────────────────────────

    /// Attaches a mouse and returns its device index.
    pub fn add_mouse(&mut self, name: &str) -> usize {
        let id = self.ids.allocate();
        self.devices
            .insert(DeviceRecord::new(id, name, MouseState::default()));
        info!(instance = %id, name, "mouse added");
        self.devices.len() - 1
    }

    /// Detaches a mouse, leaving its window first.
    pub fn remove_mouse(&mut self, index: usize) -> Vec<InputEvent> {
        let Some(handle) = self.handle(index) else {
            return Vec::new();
        };
        let events = self.set_focus(index, None);
        if let Some(record) = self.devices.remove(handle) {
            info!(instance = %record.instance_id, name = %record.name, "mouse removed");
        }
        events
    }

    pub fn mouse_count(&self) -> usize {
        self.devices.len()
    }

    /// Index of the first mouse called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.devices.iter().position(|(_, record)| record.name == name)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.handle(index)
            .and_then(|h| self.devices.get(h))
            .map(|record| record.name.as_str())
    }

    // ── Focus ────────────────────────────────────────────────────────────────

    pub fn focus(&self, index: usize) -> Option<WindowId> {
        self.handle(index).and_then(|h| self.devices.focus(h))
    }

    /// Moves a mouse into `window` (or out of every window with `None`).
    ///
    /// `Leave` and `Enter` are only produced when no sibling mouse is over the
    /// window in question.
    pub fn set_focus(&mut self, index: usize, window: Option<WindowId>) -> Vec<InputEvent> {
        let Some(handle) = self.handle(index) else {
            return Vec::new();
        };
        let old = self.devices.set_focus(handle, window);
        if old == window {
            return Vec::new();
        }
        let mut events = Vec::new();
        if let Some(old) = old {
            if !self.devices.any_other_focused(old, handle) {
                events.push(InputEvent::window(old, WindowEventKind::Leave));
            }
        }
        if let Some(new) = window {
            if !self.devices.any_other_focused(new, handle) {
                events.push(InputEvent::window(new, WindowEventKind::Enter));
            }
        }
        events
    }

    fn follow(&mut self, index: usize, window: Option<WindowId>) -> Vec<InputEvent> {
        match window {
            Some(w) if self.focus(index) != Some(w) => self.set_focus(index, Some(w)),
            _ => Vec::new(),
        }
    }

    // ── Reports from producers ───────────────────────────────────────────────

    /// Records pointer motion.
    ///
    /// With `relative` the coordinates are deltas; otherwise they are an
    /// absolute position inside `window`.  Motion that changes nothing is
    /// dropped.
    pub fn send_motion(
        &mut self,
        index: usize,
        window: Option<WindowId>,
        relative: bool,
        x: i32,
        y: i32,
    ) -> Vec<InputEvent> {
        let mut events = self.follow(index, window);
        let focus = self.focus(index);
        let bounds = focus.and_then(|w| self.backend.window_size(w));
        let Some(state) = self.state_mut(index) else {
            return events;
        };

        // Absolute deltas are taken against the unclamped position, so a
        // pointer parked outside the window stops producing motion.
        let (xrel, yrel) = if relative {
            (x, y)
        } else {
            (x.saturating_sub(state.last_x), y.saturating_sub(state.last_y))
        };
        if xrel == 0 && yrel == 0 {
            return events;
        }

        let (mut nx, mut ny) = if relative {
            (state.x.saturating_add(xrel), state.y.saturating_add(yrel))
        } else {
            (x, y)
        };
        if let Some((width, height)) = bounds {
            nx = clamp_to(nx, width);
            ny = clamp_to(ny, height);
        }
        if relative {
            state.last_x = nx;
            state.last_y = ny;
        } else {
            state.last_x = x;
            state.last_y = y;
        }
        state.x = nx;
        state.y = ny;
        state.xdelta = state.xdelta.saturating_add(xrel);
        state.ydelta = state.ydelta.saturating_add(yrel);

        events.push(InputEvent::new(EventPayload::MouseMotion(MouseMotionEvent {
            window: focus,
            device: index,
            buttons: state.buttons,
            x: nx,
            y: ny,
            xrel,
            yrel,
        })));
        events
    }

    /// Records a button transition.  A repeated state is dropped.
    pub fn send_button(
        &mut self,
        index: usize,
        window: Option<WindowId>,
        button: MouseButton,
        pressed: bool,
    ) -> Vec<InputEvent> {
        let mut events = self.follow(index, window);
        let focus = self.focus(index);
        let (time, radius) = (self.double_click_time, self.double_click_radius);
        let Some(state) = self.state_mut(index) else {
            return events;
        };
        if state.is_down(button) == pressed {
            return events;
        }
        state.set_down(button, pressed);

        let (x, y) = (state.x, state.y);
        let now = Instant::now();
        let click = state.clicks.entry(button).or_insert(ClickState {
            last_press: now,
            x,
            y,
            count: 0,
        });
        if pressed {
            let expired = now.duration_since(click.last_press) >= time && click.count > 0;
            let moved = (x - click.x).abs() > radius || (y - click.y).abs() > radius;
            if expired || moved {
                click.count = 0;
            }
            click.last_press = now;
            click.x = x;
            click.y = y;
            click.count = click.count.saturating_add(1);
        }

        let event = MouseButtonEvent {
            window: focus,
            device: index,
            button,
            clicks: click.count.max(1),
            x,
            y,
        };
        events.push(InputEvent::new(if pressed {
            EventPayload::MouseButtonDown(event)
        } else {
            EventPayload::MouseButtonUp(event)
        }));
        events
    }

    /// Records wheel motion.  A zero wheel is dropped.
    pub fn send_wheel(&mut self, index: usize, window: Option<WindowId>, dx: i32, dy: i32) -> Vec<InputEvent> {
        if dx == 0 && dy == 0 {
            return Vec::new();
        }
        let mut events = self.follow(index, window);
        if self.handle(index).is_none() {
            return events;
        }
        events.push(InputEvent::new(EventPayload::MouseWheel(MouseWheelEvent {
            window: self.focus(index),
            device: index,
            x: dx,
            y: dy,
        })));
        events
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Pressed buttons and position.
    pub fn state(&self, index: usize) -> (MouseButtons, i32, i32) {
        self.device_state(index)
            .map(|s| (s.buttons, s.x, s.y))
            .unwrap_or_default()
    }

    /// Pressed buttons and the motion accumulated since the previous call.
    pub fn relative_state(&mut self, index: usize) -> (MouseButtons, i32, i32) {
        self.state_mut(index)
            .map(|s| {
                let delta = (s.buttons, s.xdelta, s.ydelta);
                s.xdelta = 0;
                s.ydelta = 0;
                delta
            })
            .unwrap_or_default()
    }

    // ── Pointer control ──────────────────────────────────────────────────────

    /// Moves the pointer to `(x, y)` inside `window`.
    ///
    /// If the platform will not report the move itself, the motion is
    /// synthesized and returned.
    pub fn warp(&mut self, index: usize, window: WindowId, x: i32, y: i32) -> Vec<InputEvent> {
        if self.backend.warp_mouse(window, x, y) {
            return Vec::new();
        }
        self.send_motion(index, Some(window), false, x, y)
    }

    pub fn show_cursor(&mut self, visible: bool) {
        self.cursor_visible = visible;
        self.backend.show_cursor(visible);
    }

    pub fn is_cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    pub fn relative_mode(&self, index: usize) -> bool {
        self.device_state(index).map_or(false, |s| s.relative_mode)
    }

    /// Switches relative mode for one mouse.
    ///
    /// Motion already queued for the device is flushed first, so a consumer
    /// never sees absolute and relative motion mixed.  Leaving relative mode
    /// warps the pointer back to the last known position.
    pub fn set_relative_mode(&mut self, index: usize, enabled: bool, events: &EventSystem) -> Result<(), MouseError> {
        if self.handle(index).is_none() || self.relative_mode(index) == enabled {
            return Ok(());
        }

        let flushed = events.flush_where(|event| {
            event.kind() == EventKind::MouseMotion && event.payload.mouse_device() == Some(index)
        })?;
        debug!(index, flushed, "queued motion flushed for relative mode change");

        if !self.backend.set_relative_mouse_mode(enabled) {
            if enabled {
                return Err(MouseError::RelativeModeUnsupported);
            }
            warn!(index, "platform refused to leave relative mouse mode");
        }

        let focus = self.focus(index);
        let Some(state) = self.state_mut(index) else {
            return Ok(());
        };
        state.relative_mode = enabled;
        let (x, y) = (state.x, state.y);

        self.backend.show_cursor(!enabled && self.cursor_visible);
        if !enabled {
            if let Some(window) = focus {
                self.backend.warp_mouse(window, x, y);
            }
        }
        info!(index, enabled, "relative mouse mode changed");
        Ok(())
    }
}

fn clamp_to(value: i32, extent: u32) -> i32 {
    let max = i32::try_from(extent).unwrap_or(i32::MAX).saturating_sub(1).max(0);
    value.clamp(0, max)
}

impl std::fmt::Debug for MouseSubsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MouseSubsystem")
            .field("devices", &self.devices.len())
            .field("double_click_time", &self.double_click_time)
            .field("double_click_radius", &self.double_click_radius)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockPlatformBackend;
    use mockall::predicate::eq;

    const WIN: WindowId = WindowId(7);

    fn sized_backend(width: u32, height: u32) -> MockPlatformBackend {
        let mut backend = MockPlatformBackend::new();
        backend
            .expect_window_size()
            .returning(move |_| Some((width, height)));
        backend
    }

    fn mouse(backend: MockPlatformBackend) -> MouseSubsystem {
        MouseSubsystem::new(Arc::new(backend), Duration::from_millis(500), 1)
    }

    fn motion(event: &InputEvent) -> MouseMotionEvent {
        match &event.payload {
            EventPayload::MouseMotion(m) => *m,
            other => panic!("expected motion, got {other:?}"),
        }
    }

    fn clicks(events: &[InputEvent]) -> u8 {
        events
            .iter()
            .find_map(|e| match &e.payload {
                EventPayload::MouseButtonDown(b) | EventPayload::MouseButtonUp(b) => Some(b.clicks),
                _ => None,
            })
            .unwrap_or(0)
    }

    #[test]
    fn test_first_motion_into_window_enters_it() {
        // Arrange
        let mut mice = mouse(sized_backend(100, 50));
        let idx = mice.add_mouse("mouse");

        // Act
        let events = mice.send_motion(idx, Some(WIN), false, 10, 20);

        // Assert
        assert_eq!(events[0], InputEvent::window(WIN, WindowEventKind::Enter));
        let m = motion(&events[1]);
        assert_eq!((m.x, m.y, m.xrel, m.yrel), (10, 20, 10, 20));
        assert_eq!(m.window, Some(WIN));
    }

    #[test]
    fn test_absolute_motion_is_clamped_to_window() {
        let mut mice = mouse(sized_backend(100, 50));
        let idx = mice.add_mouse("mouse");

        let events = mice.send_motion(idx, Some(WIN), false, 500, -5);

        let m = motion(events.last().unwrap());
        assert_eq!((m.x, m.y), (99, 0));
        assert_eq!(mice.state(idx), (MouseButtons::empty(), 99, 0));
    }

    #[test]
    fn test_zero_motion_is_dropped() {
        let mut mice = mouse(sized_backend(100, 50));
        let idx = mice.add_mouse("mouse");
        mice.send_motion(idx, Some(WIN), false, 10, 10);

        assert!(mice.send_motion(idx, Some(WIN), false, 10, 10).is_empty());
        assert!(mice.send_motion(idx, None, true, 0, 0).is_empty());
    }

    #[test]
    fn test_pointer_parked_outside_window_reports_motion_once() {
        // Arrange
        let mut mice = mouse(sized_backend(100, 50));
        let idx = mice.add_mouse("mouse");

        // Act
        let motions: Vec<MouseMotionEvent> = (0..3)
            .flat_map(|_| mice.send_motion(idx, Some(WIN), false, 500, 10))
            .filter(|e| e.kind() == EventKind::MouseMotion)
            .map(|e| motion(&e))
            .collect();

        // Assert
        assert_eq!(motions.len(), 1);
        assert_eq!((motions[0].x, motions[0].xrel), (99, 500));
        assert_eq!(mice.relative_state(idx), (MouseButtons::empty(), 500, 10));
    }

    #[test]
    fn test_return_from_outside_window_is_measured_from_reported_position() {
        let mut mice = mouse(sized_backend(100, 50));
        let idx = mice.add_mouse("mouse");
        mice.send_motion(idx, Some(WIN), false, 500, 10);
        mice.relative_state(idx);

        let m = motion(mice.send_motion(idx, Some(WIN), false, 50, 10).last().unwrap());

        assert_eq!((m.x, m.xrel, m.yrel), (50, -450, 0));
        assert_eq!(mice.relative_state(idx), (MouseButtons::empty(), -450, 0));
    }

    #[test]
    fn test_relative_state_accumulates_and_resets() {
        let mut mice = mouse(sized_backend(1000, 1000));
        let idx = mice.add_mouse("mouse");
        mice.send_motion(idx, Some(WIN), true, 3, 4);
        mice.send_motion(idx, Some(WIN), true, -1, 6);

        assert_eq!(mice.relative_state(idx), (MouseButtons::empty(), 2, 10));
        assert_eq!(mice.relative_state(idx), (MouseButtons::empty(), 0, 0));
        assert_eq!(mice.state(idx), (MouseButtons::empty(), 2, 10));
    }

    #[test]
    fn test_quick_second_press_is_a_double_click() {
        // Arrange
        let mut mice = mouse(sized_backend(100, 100));
        let idx = mice.add_mouse("mouse");

        // Act
        let first = mice.send_button(idx, Some(WIN), MouseButton::LEFT, true);
        let release = mice.send_button(idx, Some(WIN), MouseButton::LEFT, false);
        let second = mice.send_button(idx, Some(WIN), MouseButton::LEFT, true);

        // Assert
        assert_eq!(clicks(&first), 1);
        assert_eq!(clicks(&release), 1);
        assert_eq!(clicks(&second), 2);
        assert_eq!(mice.state(idx).0, MouseButtons::LEFT);
    }

    #[test]
    fn test_click_count_resets_after_moving_away() {
        let mut mice = mouse(sized_backend(100, 100));
        let idx = mice.add_mouse("mouse");
        mice.send_button(idx, Some(WIN), MouseButton::RIGHT, true);
        mice.send_button(idx, Some(WIN), MouseButton::RIGHT, false);
        mice.send_motion(idx, Some(WIN), false, 40, 40);

        let again = mice.send_button(idx, Some(WIN), MouseButton::RIGHT, true);
        assert_eq!(clicks(&again), 1);
    }

    #[test]
    fn test_click_count_resets_after_timeout() {
        let mut mice = MouseSubsystem::new(Arc::new(sized_backend(100, 100)), Duration::ZERO, 1);
        let idx = mice.add_mouse("mouse");
        mice.send_button(idx, None, MouseButton::LEFT, true);
        mice.send_button(idx, None, MouseButton::LEFT, false);

        let again = mice.send_button(idx, None, MouseButton::LEFT, true);
        assert_eq!(clicks(&again), 1);
    }

    #[test]
    fn test_duplicate_button_state_and_zero_wheel_are_dropped() {
        let mut mice = mouse(sized_backend(100, 100));
        let idx = mice.add_mouse("mouse");
        assert!(mice.send_button(idx, None, MouseButton::MIDDLE, false).is_empty());
        assert!(mice.send_wheel(idx, None, 0, 0).is_empty());
        assert_eq!(mice.send_wheel(idx, None, 0, -1).len(), 1);
    }

    #[test]
    fn test_sibling_mouse_keeps_window_entered() {
        let mut mice = mouse(sized_backend(100, 100));
        let a = mice.add_mouse("a");
        let b = mice.add_mouse("b");
        mice.set_focus(a, Some(WIN));

        assert!(mice.set_focus(b, Some(WIN)).is_empty());
        assert!(mice.set_focus(a, None).is_empty());
        assert_eq!(mice.set_focus(b, None), vec![InputEvent::window(WIN, WindowEventKind::Leave)]);
    }

    #[test]
    fn test_warp_synthesizes_motion_when_platform_does_not() {
        // Arrange
        let mut backend = sized_backend(100, 100);
        backend
            .expect_warp_mouse()
            .with(eq(WIN), eq(30), eq(40))
            .times(1)
            .return_const(false);
        let mut mice = mouse(backend);
        let idx = mice.add_mouse("mouse");

        // Act
        let events = mice.warp(idx, WIN, 30, 40);

        // Assert
        let m = motion(events.last().unwrap());
        assert_eq!((m.x, m.y), (30, 40));
    }

    #[test]
    fn test_relative_mode_flushes_queued_motion_of_that_device() {
        // Arrange
        let mut backend = sized_backend(100, 100);
        backend.expect_set_relative_mouse_mode().return_const(true);
        backend.expect_show_cursor().return_const(());
        backend.expect_warp_mouse().times(1).return_const(true);
        let mut mice = mouse(backend);
        let first = mice.add_mouse("first");
        let second = mice.add_mouse("second");
        let events = EventSystem::new(64);
        events.start().unwrap();
        for event in mice.send_motion(first, Some(WIN), false, 5, 5) {
            events.push(event).unwrap();
        }
        for event in mice.send_motion(second, Some(WIN), false, 6, 6) {
            events.push(event).unwrap();
        }

        // Act
        mice.set_relative_mode(first, true, &events).unwrap();

        // Assert
        let left = events.peek(usize::MAX, EventKind::MouseMotion.only()).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(motion(&left[0]).device, second);
        assert!(mice.relative_mode(first));

        mice.set_relative_mode(first, false, &events).unwrap();
        assert!(!mice.relative_mode(first));
    }

    #[test]
    fn test_unsupported_relative_mode_is_an_error() {
        let mut backend = sized_backend(100, 100);
        backend.expect_set_relative_mouse_mode().return_const(false);
        let mut mice = mouse(backend);
        let idx = mice.add_mouse("mouse");
        let events = EventSystem::new(8);
        events.start().unwrap();

        let err = mice.set_relative_mode(idx, true, &events).unwrap_err();

        assert!(matches!(err, MouseError::RelativeModeUnsupported));
        assert!(!mice.relative_mode(idx));
    }

    #[test]
    fn test_button_masks_match_bit_layout() {
        assert_eq!(MouseButton::LEFT.mask(), MouseButtons::LEFT);
        assert_eq!(MouseButton::RIGHT.mask(), MouseButtons::RIGHT);
        assert_eq!(MouseButton::X2.mask(), MouseButtons::X2);
        assert!(MouseButton(0).mask().is_empty());
    }
}
