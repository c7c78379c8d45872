//! Game controllers: joysticks seen through a mapping.
//!
//! [`ControllerSubsystem`] owns the [`MappingDatabase`] and the list of open
//! controllers.  It does not receive reports from producers directly.  It
//! installs a watcher on the event system and rebuilds controller events from
//! the joystick events that pass by:
//!
//! ```text
//!  JoyAxisMotion(axis 1 = 20000)
//!      │  watcher: reverse_axis(1) == Button(B), |20000| > 16384
//!      ▼
//!  ControllerButtonDown(B)   pushed back into the same event system
//! ```
//!
//! # Locking
//!
//! Two mutexes are involved: the shared joystick subsystem and this type's
//! own state.  No method holds both at once, and neither is held while
//! pushing events, so the watcher can run from inside any push.

pub mod database;
pub mod mapping;

use std::sync::{Arc, Mutex, MutexGuard};

use enum_map::EnumMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::device::{DeviceGuid, InstanceId};
use crate::events::{
    ControllerAxisEvent, ControllerButtonEvent, DeviceEvent, EventPayload, EventSystem,
    EventWatcher, InputEvent,
};
use crate::joystick::hat::HatPosition;
use crate::joystick::JoystickSubsystem;

pub use database::{current_platform, MappingDatabase, MappingUpdate, DEFAULT_MAPPINGS};
pub use mapping::{
    rescale_trigger, ControllerAxis, ControllerButton, ControllerInput, ControllerMapping,
    MappingError, RawBinding, MAX_HATS, MAX_REVERSE_ENTRIES,
};

/// Raw axis magnitude above which an axis bound to a button counts as pressed.
pub const AXIS_BUTTON_THRESHOLD: i32 = 32768 / 2;

/// Errors returned by [`ControllerSubsystem`].
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("no controller mapping for GUID {0}")]
    NoMapping(DeviceGuid),

    #[error("no joystick at device index {0}")]
    UnknownDevice(usize),

    #[error("controller state lock is unavailable")]
    LockFailure,

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

/// Direction bits in the order hat changes are reported.
const HAT_ORDER: [HatPosition; 4] = [
    HatPosition::DOWN,
    HatPosition::UP,
    HatPosition::LEFT,
    HatPosition::RIGHT,
];

#[derive(Debug)]
struct OpenController {
    instance_id: InstanceId,
    guid: DeviceGuid,
    mapping: ControllerMapping,
    hats: [HatPosition; MAX_HATS],
    buttons: EnumMap<ControllerButton, bool>,
    ref_count: u32,
}

impl OpenController {
    /// Records a button transition.  Returns the event unless nothing changed.
    fn button(&mut self, button: ControllerButton, pressed: bool) -> Option<InputEvent> {
        if std::mem::replace(&mut self.buttons[button], pressed) == pressed {
            return None;
        }
        let event = ControllerButtonEvent {
            which: self.instance_id,
            button,
        };
        Some(InputEvent::new(if pressed {
            EventPayload::ControllerButtonDown(event)
        } else {
            EventPayload::ControllerButtonUp(event)
        }))
    }

    fn axis(&self, axis: ControllerAxis, value: i16) -> InputEvent {
        InputEvent::new(EventPayload::ControllerAxisMotion(ControllerAxisEvent {
            which: self.instance_id,
            axis,
            value,
        }))
    }

    fn translate(&mut self, payload: &EventPayload) -> Vec<InputEvent> {
        let mut out = Vec::new();
        match payload {
            EventPayload::JoyAxisMotion(e) => match self.mapping.reverse_axis(e.axis) {
                Some(ControllerInput::Axis(axis)) => {
                    let value = if axis.is_trigger() {
                        rescale_trigger(e.value)
                    } else {
                        e.value
                    };
                    out.push(self.axis(axis, value));
                }
                Some(ControllerInput::Button(button)) => {
                    let pressed = i32::from(e.value).abs() > AXIS_BUTTON_THRESHOLD;
                    out.extend(self.button(button, pressed));
                }
                None => {}
            },
            EventPayload::JoyButtonDown(e) | EventPayload::JoyButtonUp(e) => {
                let pressed = matches!(payload, EventPayload::JoyButtonDown(_));
                match self.mapping.reverse_button(e.button) {
                    Some(ControllerInput::Button(button)) => out.extend(self.button(button, pressed)),
                    Some(ControllerInput::Axis(axis)) => {
                        out.push(self.axis(axis, if pressed { i16::MAX } else { 0 }));
                    }
                    None => {}
                }
            }
            EventPayload::JoyHatMotion(e) => {
                let Some(slot) = self.hats.get(usize::from(e.hat)).copied() else {
                    return out;
                };
                let same = slot & e.value;
                let released = slot ^ same;
                let pressed = e.value ^ same;
                for (changes, state) in [(released, false), (pressed, true)] {
                    for bit in HAT_ORDER {
                        if !changes.contains(bit) {
                            continue;
                        }
                        if let Some(button) = self.mapping.reverse_hat(e.hat, bit) {
                            out.extend(self.button(button, state));
                        }
                    }
                }
                self.hats[usize::from(e.hat)] = e.value;
            }
            _ => {}
        }
        out
    }
}

#[derive(Debug, Default)]
struct ControllerState {
    database: MappingDatabase,
    open: Vec<OpenController>,
}

impl ControllerState {
    fn find_mut(&mut self, id: InstanceId) -> Option<&mut OpenController> {
        self.open.iter_mut().find(|c| c.instance_id == id)
    }

    fn find(&self, id: InstanceId) -> Option<&OpenController> {
        self.open.iter().find(|c| c.instance_id == id)
    }
}

/// Open controllers and the mapping database.
pub struct ControllerSubsystem {
    joysticks: Arc<Mutex<JoystickSubsystem>>,
    state: Mutex<ControllerState>,
}

impl ControllerSubsystem {
    pub fn new(joysticks: Arc<Mutex<JoystickSubsystem>>, database: MappingDatabase) -> Self {
        Self {
            joysticks,
            state: Mutex::new(ControllerState {
                database,
                open: Vec::new(),
            }),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, ControllerState>, ControllerError> {
        self.state.lock().map_err(|_| ControllerError::LockFailure)
    }

    fn joysticks(&self) -> Result<MutexGuard<'_, JoystickSubsystem>, ControllerError> {
        self.joysticks.lock().map_err(|_| ControllerError::LockFailure)
    }

    // ── Mappings ─────────────────────────────────────────────────────────────

    /// Adds or replaces a mapping record.
    ///
    /// Every open controller sharing the record's GUID switches to the new
    /// tables immediately and receives a `ControllerDeviceRemapped` event.
    pub fn add_mapping(&self, record: &str, events: &EventSystem) -> Result<MappingUpdate, ControllerError> {
        let mapping = ControllerMapping::parse(record)?;
        self.install(mapping, events)
    }

    /// Adds every applicable record from a multi-line source.  Returns how many were stored.
    pub fn add_mappings_from_str(&self, text: &str, events: &EventSystem) -> Result<usize, ControllerError> {
        let mut stored = 0;
        for mapping in database::parse_records(text) {
            self.install(mapping, events)?;
            stored += 1;
        }
        Ok(stored)
    }

    fn install(&self, mapping: ControllerMapping, events: &EventSystem) -> Result<MappingUpdate, ControllerError> {
        let guid = mapping.guid();
        let (update, remapped) = {
            let mut state = self.state()?;
            let mut ids = Vec::new();
            for controller in state.open.iter_mut().filter(|c| c.guid == guid) {
                controller.mapping = mapping.clone();
                ids.push(controller.instance_id);
            }
            (state.database.insert(mapping), ids)
        };
        debug!(%guid, ?update, live = remapped.len(), "controller mapping installed");
        for which in remapped {
            info!(instance = %which, %guid, "controller remapped");
            let event = InputEvent::new(EventPayload::ControllerDeviceRemapped(DeviceEvent { which }));
            if let Err(err) = events.push(event) {
                warn!(error = %err, "remap notification not delivered");
            }
        }
        Ok(update)
    }

    /// Direct access to the database, for loading files and inspection.
    pub fn with_database<R>(&self, f: impl FnOnce(&mut MappingDatabase) -> R) -> Result<R, ControllerError> {
        Ok(f(&mut self.state()?.database))
    }

    pub fn mapping_for_guid(&self, guid: &DeviceGuid) -> Option<String> {
        self.state().ok()?.database.mapping_string(guid)
    }

    // ── Enumeration ──────────────────────────────────────────────────────────

    fn guid_for_index(&self, device_index: usize) -> Result<DeviceGuid, ControllerError> {
        self.joysticks()?
            .guid_for_index(device_index)
            .ok_or(ControllerError::UnknownDevice(device_index))
    }

    /// `true` if the joystick at `device_index` has a mapping.
    pub fn is_game_controller(&self, device_index: usize) -> bool {
        let Ok(guid) = self.guid_for_index(device_index) else {
            return false;
        };
        self.state()
            .map(|state| state.database.contains(&guid))
            .unwrap_or(false)
    }

    /// Mapping name of the joystick at `device_index`.
    pub fn name_for_index(&self, device_index: usize) -> Option<String> {
        let guid = self.guid_for_index(device_index).ok()?;
        let state = self.state().ok()?;
        state.database.get(&guid).map(|m| m.name().to_owned())
    }

    // ── Open / close ─────────────────────────────────────────────────────────

    /// Opens the joystick at `device_index` as a controller.
    ///
    /// Opening an already open controller takes another reference to it.
    pub fn open(&self, device_index: usize) -> Result<InstanceId, ControllerError> {
        let (id, guid) = {
            let joysticks = self.joysticks()?;
            let id = joysticks
                .instance_id_for_index(device_index)
                .ok_or(ControllerError::UnknownDevice(device_index))?;
            (id, joysticks.guid(id))
        };

        let mapping = {
            let mut state = self.state()?;
            if let Some(open) = state.find_mut(id) {
                open.ref_count += 1;
                return Ok(id);
            }
            state
                .database
                .get(&guid)
                .cloned()
                .ok_or(ControllerError::NoMapping(guid))?
        };

        if !self.joysticks()?.open_instance(id) {
            return Err(ControllerError::UnknownDevice(device_index));
        }

        self.state()?.open.push(OpenController {
            instance_id: id,
            guid,
            mapping,
            hats: [HatPosition::CENTERED; MAX_HATS],
            buttons: EnumMap::default(),
            ref_count: 1,
        });
        info!(instance = %id, %guid, "controller opened");
        Ok(id)
    }

    /// Releases one reference.  The last one closes the underlying joystick.
    ///
    /// Neutral joystick events produced by the close are pushed while the
    /// controller is still registered, so they are translated into neutral
    /// controller events too.
    pub fn close(&self, id: InstanceId, events: &EventSystem) -> Result<(), ControllerError> {
        {
            let mut state = self.state()?;
            let Some(open) = state.find_mut(id) else {
                return Ok(());
            };
            open.ref_count -= 1;
            if open.ref_count > 0 {
                return Ok(());
            }
        }

        let neutral = self.joysticks()?.close(id);
        for event in neutral {
            if let Err(err) = events.push(event) {
                debug!(error = %err, "neutral event not delivered on close");
            }
        }

        self.state()?.open.retain(|c| c.instance_id != id);
        info!(instance = %id, "controller closed");
        Ok(())
    }

    /// Instance ids of every open controller.
    pub fn open_ids(&self) -> Vec<InstanceId> {
        self.state()
            .map(|state| state.open.iter().map(|c| c.instance_id).collect())
            .unwrap_or_default()
    }

    pub fn is_open(&self, id: InstanceId) -> bool {
        self.state().map(|s| s.find(id).is_some()).unwrap_or(false)
    }

    /// `true` while the underlying joystick is plugged in.
    pub fn attached(&self, id: InstanceId) -> bool {
        self.is_open(id) && self.joysticks().map(|j| j.is_attached(id)).unwrap_or(false)
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    fn mapping_of<R>(&self, id: InstanceId, f: impl FnOnce(&ControllerMapping) -> R) -> Option<R> {
        let state = self.state().ok()?;
        state.find(id).map(|c| f(&c.mapping))
    }

    pub fn bind_for_axis(&self, id: InstanceId, axis: ControllerAxis) -> Option<RawBinding> {
        self.mapping_of(id, |m| m.axis_binding(axis)).flatten()
    }

    pub fn bind_for_button(&self, id: InstanceId, button: ControllerButton) -> Option<RawBinding> {
        self.mapping_of(id, |m| m.button_binding(button)).flatten()
    }

    /// Record string of the mapping an open controller uses.
    pub fn mapping_for(&self, id: InstanceId) -> Option<String> {
        self.mapping_of(id, ControllerMapping::to_record_string)
    }

    pub fn name(&self, id: InstanceId) -> Option<String> {
        self.mapping_of(id, |m| m.name().to_owned())
    }

    /// Current value of an abstract axis.  Zero for unknown ids or unbound axes.
    pub fn axis(&self, id: InstanceId, axis: ControllerAxis) -> i16 {
        let Some(binding) = self.bind_for_axis(id, axis) else {
            return 0;
        };
        let Ok(joysticks) = self.joysticks() else {
            return 0;
        };
        match binding {
            RawBinding::Axis(n) => {
                let raw = joysticks.axis(id, n);
                if axis.is_trigger() {
                    rescale_trigger(raw)
                } else {
                    raw
                }
            }
            RawBinding::Button(n) => {
                if joysticks.button(id, n) {
                    i16::MAX
                } else {
                    0
                }
            }
            RawBinding::Hat { .. } => 0,
        }
    }

    /// Current state of an abstract button.  `false` for unknown ids or unbound buttons.
    pub fn button(&self, id: InstanceId, button: ControllerButton) -> bool {
        let Some(binding) = self.bind_for_button(id, button) else {
            return false;
        };
        let Ok(joysticks) = self.joysticks() else {
            return false;
        };
        match binding {
            RawBinding::Axis(n) => i32::from(joysticks.axis(id, n)).abs() > AXIS_BUTTON_THRESHOLD,
            RawBinding::Button(n) => joysticks.button(id, n),
            RawBinding::Hat { hat, mask } => joysticks.hat(id, hat).intersects(mask),
        }
    }

    // ── Event translation ────────────────────────────────────────────────────

    /// The watcher to register on the event system.
    pub fn watcher(self: &Arc<Self>) -> EventWatcher {
        let this = Arc::clone(self);
        Arc::new(move |events: &EventSystem, event: &InputEvent| this.translate(events, event))
    }

    /// Produces controller events for one joystick event and pushes them.
    pub fn translate(&self, events: &EventSystem, event: &InputEvent) {
        for derived in self.derive(&event.payload) {
            if let Err(err) = events.push(derived) {
                debug!(error = %err, "derived controller event not delivered");
            }
        }
    }

    fn derive(&self, payload: &EventPayload) -> Vec<InputEvent> {
        match payload {
            EventPayload::JoyDeviceAdded(e) => {
                let guid = match self.joysticks() {
                    Ok(joysticks) => joysticks.guid(e.which),
                    Err(_) => return Vec::new(),
                };
                let mapped = self
                    .state()
                    .map(|state| state.database.contains(&guid))
                    .unwrap_or(false);
                if mapped {
                    vec![InputEvent::new(EventPayload::ControllerDeviceAdded(*e))]
                } else {
                    Vec::new()
                }
            }
            EventPayload::JoyDeviceRemoved(e) => {
                if self.is_open(e.which) {
                    vec![InputEvent::new(EventPayload::ControllerDeviceRemoved(*e))]
                } else {
                    Vec::new()
                }
            }
            EventPayload::JoyAxisMotion(_)
            | EventPayload::JoyButtonDown(_)
            | EventPayload::JoyButtonUp(_)
            | EventPayload::JoyHatMotion(_) => {
                let Some(which) = payload.instance_id() else {
                    return Vec::new();
                };
                let Ok(mut state) = self.state() else {
                    return Vec::new();
                };
                state
                    .find_mut(which)
                    .map(|controller| controller.translate(payload))
                    .unwrap_or_default()
            }
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Debug for ControllerSubsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerSubsystem")
            .field("open", &self.open_ids())
            .finish()
    }
}
