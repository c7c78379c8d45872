//! Joystick hotplug, state caching and event generation.
//!
//! # Device lifecycle (for beginners)
//!
//! ```text
//!   add_device ──► attached, closed ──open──► attached, open ──close──┐
//!                       ▲                         │                  │
//!                       └─────────────────────────┼──────────────────┘
//!                                                 │ remove_device
//!                                                 ▼
//!                                       removed, still referenced
//!                                                 │ last close
//!                                                 ▼
//!                                               freed
//! ```
//!
//! A device is identified two ways:
//!
//! - **device index** – its position among the currently *attached* devices.
//!   Indices shift when an earlier device is unplugged, which is why they are
//!   only used by producers and for opening.
//! - **instance id** – assigned once when the device is added and never reused.
//!   Everything after `open` is addressed by instance id.
//!
//! When a device is unplugged while the application still holds it open, the
//! record is not destroyed: it is marked removed, reset to a neutral state,
//! and keeps answering queries with neutral values until the last handle is
//! closed.
//!
//! # Who pushes events?
//!
//! This type never touches the event queue.  Every mutating method returns the
//! events it generated and the caller pushes them after releasing whatever lock
//! guards the subsystem.  That way a queue watcher reacting to a joystick event
//! may read joystick state without deadlocking.

pub mod hat;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::device::{
    BusIdentity, DeviceGuid, DeviceHandle, DeviceRecord, DeviceRegistry, InstanceId,
    InstanceIdAllocator,
};
use crate::events::{
    DeviceEvent, EventPayload, InputEvent, JoyAxisEvent, JoyBallEvent, JoyButtonEvent, JoyHatEvent,
};

pub use hat::{HatEncoding, HatPosition, HatState};

/// What a producer knows about a joystick when announcing it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub name: String,
    /// Explicit GUID.  Derived from `bus` and `name` when absent.
    #[serde(default)]
    pub guid: Option<DeviceGuid>,
    #[serde(default)]
    pub bus: Option<BusIdentity>,
    #[serde(default)]
    pub axes: u8,
    #[serde(default)]
    pub buttons: u8,
    #[serde(default)]
    pub hats: u8,
    #[serde(default)]
    pub balls: u8,
    /// How raw hat reports from this device are encoded.
    #[serde(default)]
    pub hat_encoding: HatEncoding,
    /// Platform device path, used to tell identical models apart on removal.
    #[serde(default)]
    pub path: Option<String>,
}

impl DeviceIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_guid(mut self, guid: DeviceGuid) -> Self {
        self.guid = Some(guid);
        self
    }

    pub fn with_bus(mut self, bus: BusIdentity) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_counts(mut self, axes: u8, buttons: u8, hats: u8, balls: u8) -> Self {
        self.axes = axes;
        self.buttons = buttons;
        self.hats = hats;
        self.balls = balls;
        self
    }

    pub fn with_hat_encoding(mut self, encoding: HatEncoding) -> Self {
        self.hat_encoding = encoding;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// The GUID this identity resolves to.
    pub fn resolved_guid(&self) -> DeviceGuid {
        self.guid
            .unwrap_or_else(|| DeviceGuid::derive(self.bus, &self.name))
    }

    /// Whether a removal announcement for `self` refers to `other`.
    ///
    /// Paths are compared when both sides carry one, otherwise GUID and name.
    fn matches(&self, other: &DeviceIdentity) -> bool {
        match (&self.path, &other.path) {
            (Some(a), Some(b)) => a == b,
            _ => self.resolved_guid() == other.resolved_guid() && self.name == other.name,
        }
    }
}

/// Cached state of one joystick.
#[derive(Debug, Clone)]
pub struct Joystick {
    identity: DeviceIdentity,
    guid: DeviceGuid,
    axes: Vec<i16>,
    buttons: Vec<bool>,
    hats: Vec<HatPosition>,
    /// Quantized axis pairs, used by [`HatEncoding::Axes`] devices.
    hat_axes: Vec<HatState>,
    balls: Vec<(i32, i32)>,
    ref_count: u32,
    removed: bool,
}

impl Joystick {
    fn new(identity: DeviceIdentity) -> Self {
        Self {
            guid: identity.resolved_guid(),
            axes: vec![0; usize::from(identity.axes)],
            buttons: vec![false; usize::from(identity.buttons)],
            hats: vec![HatPosition::CENTERED; usize::from(identity.hats)],
            hat_axes: vec![HatState::default(); usize::from(identity.hats)],
            balls: vec![(0, 0); usize::from(identity.balls)],
            identity,
            ref_count: 0,
            removed: false,
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn guid(&self) -> DeviceGuid {
        self.guid
    }

    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Returns every control to neutral, producing the events that announce it.
    fn recenter(&mut self, which: InstanceId) -> Vec<InputEvent> {
        let mut events = Vec::new();
        for (axis, value) in self.axes.iter_mut().enumerate() {
            if *value != 0 {
                *value = 0;
                events.push(axis_event(which, axis as u8, 0));
            }
        }
        for (button, pressed) in self.buttons.iter_mut().enumerate() {
            if *pressed {
                *pressed = false;
                events.push(button_event(which, button as u8, false));
            }
        }
        for (hat, value) in self.hats.iter_mut().enumerate() {
            if !value.is_centered() {
                *value = HatPosition::CENTERED;
                events.push(hat_event(which, hat as u8, HatPosition::CENTERED));
            }
        }
        self.hat_axes.iter_mut().for_each(|state| *state = HatState::default());
        self.balls.iter_mut().for_each(|ball| *ball = (0, 0));
        events
    }
}

fn axis_event(which: InstanceId, axis: u8, value: i16) -> InputEvent {
    InputEvent::new(EventPayload::JoyAxisMotion(JoyAxisEvent { which, axis, value }))
}

fn button_event(which: InstanceId, button: u8, pressed: bool) -> InputEvent {
    let event = JoyButtonEvent { which, button };
    InputEvent::new(if pressed {
        EventPayload::JoyButtonDown(event)
    } else {
        EventPayload::JoyButtonUp(event)
    })
}

fn hat_event(which: InstanceId, hat: u8, value: HatPosition) -> InputEvent {
    InputEvent::new(EventPayload::JoyHatMotion(JoyHatEvent { which, hat, value }))
}

fn store_hat(which: InstanceId, joystick: &mut Joystick, hat: u8, value: HatPosition) -> Option<InputEvent> {
    let slot = joystick.hats.get_mut(usize::from(hat))?;
    if *slot == value {
        return None;
    }
    *slot = value;
    Some(hat_event(which, hat, value))
}

/// All joysticks known to one context.
#[derive(Debug)]
pub struct JoystickSubsystem {
    devices: DeviceRegistry<Joystick>,
    ids: InstanceIdAllocator,
    allow_background: bool,
    focus_present: bool,
}

impl JoystickSubsystem {
    /// `allow_background` lets events through while no window has keyboard focus.
    pub fn new(allow_background: bool) -> Self {
        Self {
            devices: DeviceRegistry::new(),
            ids: InstanceIdAllocator::new(),
            allow_background,
            focus_present: false,
        }
    }

    pub fn set_allow_background(&mut self, allow: bool) {
        self.allow_background = allow;
    }

    /// Tells the subsystem whether any window currently has keyboard focus.
    pub fn set_focus_present(&mut self, present: bool) {
        self.focus_present = present;
    }

    fn suppressed(&self) -> bool {
        !self.allow_background && !self.focus_present
    }

    // ── Hotplug ──────────────────────────────────────────────────────────────

    /// Registers a newly attached device and returns its fresh instance id.
    pub fn add_device(&mut self, identity: DeviceIdentity) -> (InstanceId, InputEvent) {
        let id = self.ids.allocate();
        info!(
            instance = %id,
            name = %identity.name,
            guid = %identity.resolved_guid(),
            "joystick added"
        );
        let name = identity.name.clone();
        self.devices
            .insert(DeviceRecord::new(id, name, Joystick::new(identity)));
        let event = InputEvent::new(EventPayload::JoyDeviceAdded(DeviceEvent { which: id }));
        (id, event)
    }

    /// Handles a removal announcement.  Unknown identities are ignored.
    pub fn remove_device(&mut self, identity: &DeviceIdentity) -> Vec<InputEvent> {
        let found = self
            .devices
            .iter()
            .find(|(_, record)| !record.state.removed && record.state.identity.matches(identity))
            .map(|(_, record)| record.instance_id);
        match found {
            Some(id) => self.remove_instance(id),
            None => {
                debug!(name = %identity.name, "removal announced for unknown joystick");
                Vec::new()
            }
        }
    }

    /// Marks a device removed, recentring it and freeing it if nobody holds it.
    pub fn remove_instance(&mut self, id: InstanceId) -> Vec<InputEvent> {
        let Some(handle) = self.devices.find_by_instance(id) else {
            return Vec::new();
        };
        let Some(record) = self.devices.get_mut(handle) else {
            return Vec::new();
        };
        if record.state.removed {
            return Vec::new();
        }
        record.state.removed = true;
        let mut events = record.state.recenter(id);
        events.push(InputEvent::new(EventPayload::JoyDeviceRemoved(DeviceEvent {
            which: id,
        })));
        let still_open = record.state.ref_count > 0;
        if !still_open {
            self.devices.remove(handle);
        }
        info!(instance = %id, still_open, "joystick removed");
        events
    }

    // ── Enumeration ──────────────────────────────────────────────────────────

    fn attached(&self, device_index: usize) -> Option<DeviceHandle> {
        self.devices
            .iter()
            .filter(|(_, record)| !record.state.removed)
            .nth(device_index)
            .map(|(handle, _)| handle)
    }

    fn record(&self, id: InstanceId) -> Option<&DeviceRecord<Joystick>> {
        self.devices
            .find_by_instance(id)
            .and_then(|handle| self.devices.get(handle))
    }

    /// Number of attached devices.
    pub fn device_count(&self) -> usize {
        self.devices
            .iter()
            .filter(|(_, record)| !record.state.removed)
            .count()
    }

    pub fn instance_id_for_index(&self, device_index: usize) -> Option<InstanceId> {
        self.attached(device_index)
            .and_then(|handle| self.devices.get(handle))
            .map(|record| record.instance_id)
    }

    pub fn guid_for_index(&self, device_index: usize) -> Option<DeviceGuid> {
        self.attached(device_index)
            .and_then(|handle| self.devices.get(handle))
            .map(|record| record.state.guid)
    }

    pub fn name_for_index(&self, device_index: usize) -> Option<String> {
        self.attached(device_index)
            .and_then(|handle| self.devices.get(handle))
            .map(|record| record.name.clone())
    }

    /// Instance ids of every attached device, in device-index order.
    pub fn attached_ids(&self) -> Vec<InstanceId> {
        self.devices
            .iter()
            .filter(|(_, record)| !record.state.removed)
            .map(|(_, record)| record.instance_id)
            .collect()
    }

    // ── Open / close ─────────────────────────────────────────────────────────

    /// Opens the device at `device_index` and returns its instance id.
    pub fn open(&mut self, device_index: usize) -> Option<InstanceId> {
        let handle = self.attached(device_index)?;
        let record = self.devices.get_mut(handle)?;
        record.state.ref_count += 1;
        debug!(instance = %record.instance_id, refs = record.state.ref_count, "joystick opened");
        Some(record.instance_id)
    }

    /// Takes another reference to an attached device.
    pub fn open_instance(&mut self, id: InstanceId) -> bool {
        let Some(handle) = self.devices.find_by_instance(id) else {
            return false;
        };
        match self.devices.get_mut(handle) {
            Some(record) if !record.state.removed => {
                record.state.ref_count += 1;
                true
            }
            _ => false,
        }
    }

    /// Releases one reference.
    ///
    /// When the last reference goes, any non-neutral control is reset and the
    /// returned events report it.  A removed device is freed at that point.
    pub fn close(&mut self, id: InstanceId) -> Vec<InputEvent> {
        let Some(handle) = self.devices.find_by_instance(id) else {
            return Vec::new();
        };
        let Some(record) = self.devices.get_mut(handle) else {
            return Vec::new();
        };
        if record.state.ref_count == 0 {
            return Vec::new();
        }
        record.state.ref_count -= 1;
        if record.state.ref_count > 0 {
            return Vec::new();
        }
        let events = record.state.recenter(id);
        if record.state.removed {
            self.devices.remove(handle);
            debug!(instance = %id, "removed joystick freed on last close");
        }
        events
    }

    pub fn is_open(&self, id: InstanceId) -> bool {
        self.record(id).map_or(false, |r| r.state.ref_count > 0)
    }

    /// `true` while the device is plugged in.
    pub fn is_attached(&self, id: InstanceId) -> bool {
        self.record(id).map_or(false, |r| !r.state.removed)
    }

    pub fn ref_count(&self, id: InstanceId) -> u32 {
        self.record(id).map_or(0, |r| r.state.ref_count)
    }

    // ── Reports from producers ───────────────────────────────────────────────

    /// Resolves `device_index` to an open device that may receive the report.
    fn reportable(&mut self, device_index: usize) -> Option<(InstanceId, &mut Joystick)> {
        let suppressed = self.suppressed();
        let handle = self.attached(device_index)?;
        let record = self.devices.get_mut(handle)?;
        if record.state.ref_count == 0 {
            trace!(device_index, "report for unopened joystick ignored");
            return None;
        }
        if suppressed {
            trace!(device_index, "joystick report suppressed without focus");
            return None;
        }
        Some((record.instance_id, &mut record.state))
    }

    pub fn report_axis(&mut self, device_index: usize, axis: u8, value: i16) -> Option<InputEvent> {
        let (id, joystick) = self.reportable(device_index)?;
        let slot = joystick.axes.get_mut(usize::from(axis))?;
        if *slot == value {
            return None;
        }
        *slot = value;
        Some(axis_event(id, axis, value))
    }

    pub fn report_button(&mut self, device_index: usize, button: u8, pressed: bool) -> Option<InputEvent> {
        let (id, joystick) = self.reportable(device_index)?;
        let slot = joystick.buttons.get_mut(usize::from(button))?;
        if *slot == pressed {
            return None;
        }
        *slot = pressed;
        Some(button_event(id, button, pressed))
    }

    /// Decodes a raw hat value with the device's [`HatEncoding`].
    ///
    /// Values that decode to none of the nine states are dropped.
    pub fn report_hat(&mut self, device_index: usize, hat: u8, raw: i32) -> Option<InputEvent> {
        let (id, joystick) = self.reportable(device_index)?;
        let encoding = joystick.identity.hat_encoding;
        let Some(value) = encoding.decode(raw) else {
            debug!(device_index, hat, raw, ?encoding, "undecodable hat value dropped");
            return None;
        };
        store_hat(id, joystick, hat, value)
    }

    /// Feeds one axis of a two-axis hat.
    pub fn report_hat_axis(
        &mut self,
        device_index: usize,
        hat: u8,
        horizontal: bool,
        raw: i32,
    ) -> Option<InputEvent> {
        let (id, joystick) = self.reportable(device_index)?;
        let HatEncoding::Axes { min, max } = joystick.identity.hat_encoding else {
            debug!(device_index, hat, "hat axis report for a device without axis hats");
            return None;
        };
        let value = joystick
            .hat_axes
            .get_mut(usize::from(hat))?
            .update_axis(horizontal, raw, min, max);
        store_hat(id, joystick, hat, value)
    }

    /// Trackball motion is relative: zero motion is dropped, the rest accumulates.
    pub fn report_ball(&mut self, device_index: usize, ball: u8, dx: i16, dy: i16) -> Option<InputEvent> {
        if dx == 0 && dy == 0 {
            return None;
        }
        let (id, joystick) = self.reportable(device_index)?;
        let slot = joystick.balls.get_mut(usize::from(ball))?;
        slot.0 = slot.0.saturating_add(i32::from(dx));
        slot.1 = slot.1.saturating_add(i32::from(dy));
        Some(InputEvent::new(EventPayload::JoyBallMotion(JoyBallEvent {
            which: id,
            ball,
            xrel: dx,
            yrel: dy,
        })))
    }

    // ── Queries (neutral defaults on unknown ids) ────────────────────────────

    pub fn axis(&self, id: InstanceId, axis: u8) -> i16 {
        self.record(id)
            .and_then(|r| r.state.axes.get(usize::from(axis)).copied())
            .unwrap_or(0)
    }

    pub fn button(&self, id: InstanceId, button: u8) -> bool {
        self.record(id)
            .and_then(|r| r.state.buttons.get(usize::from(button)).copied())
            .unwrap_or(false)
    }

    pub fn hat(&self, id: InstanceId, hat: u8) -> HatPosition {
        self.record(id)
            .and_then(|r| r.state.hats.get(usize::from(hat)).copied())
            .unwrap_or(HatPosition::CENTERED)
    }

    /// Accumulated ball motion since the previous call.
    pub fn ball(&mut self, id: InstanceId, ball: u8) -> (i32, i32) {
        let Some(handle) = self.devices.find_by_instance(id) else {
            return (0, 0);
        };
        self.devices
            .get_mut(handle)
            .and_then(|r| r.state.balls.get_mut(usize::from(ball)))
            .map(std::mem::take)
            .unwrap_or((0, 0))
    }

    pub fn name(&self, id: InstanceId) -> Option<String> {
        self.record(id).map(|r| r.name.clone())
    }

    pub fn guid(&self, id: InstanceId) -> DeviceGuid {
        self.record(id).map_or(DeviceGuid::ZERO, |r| r.state.guid)
    }

    pub fn axis_count(&self, id: InstanceId) -> usize {
        self.record(id).map_or(0, |r| r.state.axes.len())
    }

    pub fn button_count(&self, id: InstanceId) -> usize {
        self.record(id).map_or(0, |r| r.state.buttons.len())
    }

    pub fn hat_count(&self, id: InstanceId) -> usize {
        self.record(id).map_or(0, |r| r.state.hats.len())
    }

    pub fn ball_count(&self, id: InstanceId) -> usize {
        self.record(id).map_or(0, |r| r.state.balls.len())
    }

    pub fn joystick(&self, id: InstanceId) -> Option<&Joystick> {
        self.record(id).map(|r| &r.state)
    }
}

impl Default for JoystickSubsystem {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    fn pad(name: &str) -> DeviceIdentity {
        DeviceIdentity::new(name).with_counts(4, 8, 1, 1)
    }

    fn raw(pos: HatPosition) -> i32 {
        i32::from(pos.bits())
    }

    fn focused() -> JoystickSubsystem {
        let mut joysticks = JoystickSubsystem::new(false);
        joysticks.set_focus_present(true);
        joysticks
    }

    #[test]
    fn test_add_assigns_increasing_instance_ids() {
        let mut joysticks = focused();
        let (a, event) = joysticks.add_device(pad("one"));
        let (b, _) = joysticks.add_device(pad("two"));

        assert!(b > a);
        assert_eq!(event.kind(), EventKind::JoyDeviceAdded);
        assert_eq!(joysticks.device_count(), 2);
        assert_eq!(joysticks.instance_id_for_index(1), Some(b));
    }

    #[test]
    fn test_duplicate_axis_value_is_dropped() {
        // Arrange
        let mut joysticks = focused();
        joysticks.add_device(pad("pad"));
        let id = joysticks.open(0).unwrap();

        // Act
        let first = joysticks.report_axis(0, 1, 1200);
        let second = joysticks.report_axis(0, 1, 1200);

        // Assert
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(joysticks.axis(id, 1), 1200);
    }

    #[test]
    fn test_out_of_range_controls_are_ignored() {
        let mut joysticks = focused();
        joysticks.add_device(pad("pad"));
        joysticks.open(0);

        assert!(joysticks.report_axis(0, 4, 10).is_none());
        assert!(joysticks.report_button(0, 8, true).is_none());
        assert!(joysticks.report_hat(1, 0, raw(HatPosition::UP)).is_none());
    }

    #[test]
    fn test_reports_without_focus_are_suppressed() {
        let mut joysticks = JoystickSubsystem::new(false);
        joysticks.add_device(pad("pad"));
        let id = joysticks.open(0).unwrap();

        assert!(joysticks.report_button(0, 0, true).is_none());
        assert!(!joysticks.button(id, 0));

        joysticks.set_allow_background(true);
        assert!(joysticks.report_button(0, 0, true).is_some());
    }

    #[test]
    fn test_reports_for_unopened_devices_are_ignored() {
        let mut joysticks = focused();
        let (id, _) = joysticks.add_device(pad("pad"));

        assert!(joysticks.report_axis(0, 0, 500).is_none());
        assert_eq!(joysticks.axis(id, 0), 0);
    }

    #[test]
    fn test_closing_last_handle_recenters_with_events() {
        // Arrange
        let mut joysticks = focused();
        joysticks.add_device(pad("pad"));
        let id = joysticks.open(0).unwrap();
        joysticks.report_axis(0, 0, -3000);
        joysticks.report_button(0, 2, true);
        joysticks.report_hat(0, 0, raw(HatPosition::LEFT));

        // Act: forced neutral events are produced even without focus.
        joysticks.set_focus_present(false);
        let events = joysticks.close(id);

        // Assert
        let kinds: Vec<EventKind> = events.iter().map(InputEvent::kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::JoyAxisMotion, EventKind::JoyButtonUp, EventKind::JoyHatMotion]
        );
        assert_eq!(joysticks.axis(id, 0), 0);
        assert!(joysticks.is_attached(id));
    }

    #[test]
    fn test_close_with_other_references_keeps_state() {
        let mut joysticks = focused();
        joysticks.add_device(pad("pad"));
        let id = joysticks.open(0).unwrap();
        joysticks.open(0);
        joysticks.report_axis(0, 0, 99);

        assert!(joysticks.close(id).is_empty());
        assert_eq!(joysticks.axis(id, 0), 99);
        assert_eq!(joysticks.ref_count(id), 1);
    }

    #[test]
    fn test_removed_but_referenced_device_reports_neutral() {
        // Arrange
        let mut joysticks = focused();
        let identity = pad("pad").with_path("/dev/input/js0");
        joysticks.add_device(identity.clone());
        let id = joysticks.open(0).unwrap();
        joysticks.report_button(0, 1, true);

        // Act
        let events = joysticks.remove_device(&identity);

        // Assert
        assert_eq!(events.last().map(InputEvent::kind), Some(EventKind::JoyDeviceRemoved));
        assert!(events.iter().any(|e| e.kind() == EventKind::JoyButtonUp));
        assert!(!joysticks.is_attached(id));
        assert!(!joysticks.button(id, 1));
        assert_eq!(joysticks.name(id).as_deref(), Some("pad"));
        assert_eq!(joysticks.device_count(), 0);

        joysticks.close(id);
        assert!(joysticks.name(id).is_none(), "freed after the last close");
    }

    #[test]
    fn test_removal_of_unopened_device_frees_immediately() {
        let mut joysticks = focused();
        let (id, _) = joysticks.add_device(pad("pad"));

        let events = joysticks.remove_instance(id);

        assert_eq!(events.len(), 1);
        assert!(joysticks.joystick(id).is_none());
    }

    #[test]
    fn test_removal_by_path_picks_the_right_twin() {
        let mut joysticks = focused();
        let (a, _) = joysticks.add_device(pad("twin").with_path("a"));
        let (b, _) = joysticks.add_device(pad("twin").with_path("b"));

        joysticks.remove_device(&pad("twin").with_path("b"));

        assert!(joysticks.is_attached(a));
        assert!(!joysticks.is_attached(b));
    }

    #[test]
    fn test_ball_motion_accumulates_until_read() {
        let mut joysticks = focused();
        joysticks.add_device(pad("pad"));
        let id = joysticks.open(0).unwrap();

        assert!(joysticks.report_ball(0, 0, 0, 0).is_none());
        joysticks.report_ball(0, 0, 3, -1);
        joysticks.report_ball(0, 0, 2, -1);

        assert_eq!(joysticks.ball(id, 0), (5, -2));
        assert_eq!(joysticks.ball(id, 0), (0, 0));
    }

    #[test]
    fn test_impossible_hat_bitset_is_dropped() {
        // Arrange
        let mut joysticks = focused();
        joysticks.add_device(pad("pad"));
        let id = joysticks.open(0).unwrap();
        joysticks.report_hat(0, 0, raw(HatPosition::UP));

        // Act
        let event = joysticks.report_hat(0, 0, raw(HatPosition::UP | HatPosition::DOWN));

        // Assert
        assert!(event.is_none());
        assert_eq!(joysticks.hat(id, 0), HatPosition::UP);
    }

    #[test]
    fn test_logical_hat_is_quantized_against_its_range() {
        let mut joysticks = focused();
        joysticks.add_device(pad("pov").with_hat_encoding(HatEncoding::Logical { min: 1, max: 8 }));
        let id = joysticks.open(0).unwrap();

        let event = joysticks.report_hat(0, 0, 4).unwrap();
        assert_eq!(event, hat_event(id, 0, HatPosition::RIGHT_DOWN));

        // The null state past the range recentres.
        assert!(joysticks.report_hat(0, 0, 0).is_some());
        assert_eq!(joysticks.hat(id, 0), HatPosition::CENTERED);
    }

    #[test]
    fn test_axis_pair_hat_combines_both_axes() {
        // Arrange
        let mut joysticks = focused();
        joysticks.add_device(pad("dpad").with_hat_encoding(HatEncoding::Axes { min: -1, max: 1 }));
        let id = joysticks.open(0).unwrap();

        // Act
        let up = joysticks.report_hat_axis(0, 0, false, -1);
        let diagonal = joysticks.report_hat_axis(0, 0, true, 1);
        let repeat = joysticks.report_hat_axis(0, 0, true, 1);

        // Assert
        assert!(up.is_some() && diagonal.is_some());
        assert!(repeat.is_none());
        assert_eq!(joysticks.hat(id, 0), HatPosition::RIGHT_UP);
        assert!(joysticks.report_hat(0, 0, raw(HatPosition::DOWN)).is_none());
    }

    #[test]
    fn test_ball_accumulator_saturates() {
        let mut joysticks = focused();
        joysticks.add_device(pad("ball"));
        let id = joysticks.open(0).unwrap();

        for _ in 0..70_000 {
            joysticks.report_ball(0, 0, i16::MAX, i16::MIN);
        }

        assert_eq!(joysticks.ball(id, 0), (i32::MAX, i32::MIN));
    }

    #[test]
    fn test_unknown_instance_returns_neutral_defaults() {
        let mut joysticks = focused();
        let ghost = InstanceId(1234);

        assert_eq!(joysticks.axis(ghost, 0), 0);
        assert!(!joysticks.button(ghost, 0));
        assert_eq!(joysticks.hat(ghost, 0), HatPosition::CENTERED);
        assert_eq!(joysticks.ball(ghost, 0), (0, 0));
        assert_eq!(joysticks.guid(ghost), DeviceGuid::ZERO);
        assert!(joysticks.close(ghost).is_empty());
    }
}
