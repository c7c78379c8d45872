//! Keyboard normalization: pressed-key state, modifiers, text and focus.
//!
//! Producers report raw key transitions per keyboard device.  The
//! [`KeyboardSubsystem`] turns them into well-formed events:
//!
//! - a press of a key that is already down becomes a *repeat* `KeyDown`,
//! - a release of a key that is not down is dropped,
//! - modifier keys update the device's [`Modifiers`] bitset,
//! - text is only delivered to a device that has window focus.
//!
//! # Focus across several keyboards (for beginners)
//!
//! Two keyboards can be focused on the same window.  The window only *loses*
//! keyboard focus when the last of them moves away, and only *gains* it when
//! the first one arrives.  That is why [`KeyboardSubsystem::set_focus`] asks
//! the registry whether a sibling keyboard still holds the old window before
//! emitting `FocusLost`.
//!
//! The subsystem is a plain `&mut self` state machine that returns the
//! events it produced; the caller pushes them into the event system.

pub mod modifiers;
pub mod scancode;

use tracing::{debug, info};

use crate::device::{DeviceHandle, DeviceRecord, DeviceRegistry, InstanceId, InstanceIdAllocator};
use crate::events::{
    EventPayload, InputEvent, KeyboardEvent, TextBuffer, TextEditingEvent, TextInputEvent,
    WindowEventKind, WindowId,
};

pub use modifiers::{ModifierBehavior, Modifiers};
pub use scancode::{Keycode, Scancode, SCANCODE_SLOTS};

const WORDS: usize = SCANCODE_SLOTS / 64;

/// Per-device key state.
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    pressed: [u64; WORDS],
    modifiers: Modifiers,
}

impl KeyboardState {
    fn slot(scancode: Scancode) -> (usize, u64) {
        let raw = usize::from(scancode.as_u16());
        (raw / 64, 1u64 << (raw % 64))
    }

    pub fn is_pressed(&self, scancode: Scancode) -> bool {
        let (word, bit) = Self::slot(scancode);
        self.pressed.get(word).map_or(false, |w| w & bit != 0)
    }

    fn set_pressed(&mut self, scancode: Scancode, pressed: bool) {
        let (word, bit) = Self::slot(scancode);
        if let Some(w) = self.pressed.get_mut(word) {
            if pressed {
                *w |= bit;
            } else {
                *w &= !bit;
            }
        }
    }

    /// Pressed scancodes in ascending usage order.
    pub fn pressed_keys(&self) -> Vec<Scancode> {
        let mut keys = Vec::new();
        for (word, bits) in self.pressed.iter().enumerate() {
            for bit in 0..64 {
                if bits & (1u64 << bit) != 0 {
                    // The slot range is bounded by SCANCODE_SLOTS, which fits in u16.
                    keys.push(Scancode::from_u16((word * 64 + bit) as u16));
                }
            }
        }
        keys
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }
}

/// All attached keyboards.
#[derive(Debug, Default)]
pub struct KeyboardSubsystem {
    devices: DeviceRegistry<KeyboardState>,
    ids: InstanceIdAllocator,
}

impl KeyboardSubsystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, index: usize) -> Option<DeviceHandle> {
        self.devices.nth(index)
    }

    fn state(&self, index: usize) -> Option<&KeyboardState> {
        self.handle(index)
            .and_then(|h| self.devices.get(h))
            .map(|record| &record.state)
    }

    // ── Devices ──────────────────────────────────────────────────────────────

    /// Attaches a keyboard and returns its device index.
    pub fn add_keyboard(&mut self, name: &str) -> usize {
        let id = self.ids.allocate();
        self.devices
            .insert(DeviceRecord::new(id, name, KeyboardState::default()));
        info!(instance = %id, name, "keyboard added");
        self.devices.len() - 1
    }

    /// Detaches a keyboard, releasing its keys and focus first.
    pub fn remove_keyboard(&mut self, index: usize) -> Vec<InputEvent> {
        let Some(handle) = self.handle(index) else {
            return Vec::new();
        };
        let events = self.set_focus(index, None);
        if let Some(record) = self.devices.remove(handle) {
            info!(instance = %record.instance_id, name = %record.name, "keyboard removed");
        }
        events
    }

    pub fn keyboard_count(&self) -> usize {
        self.devices.len()
    }

    /// Index of the first keyboard called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.devices.iter().position(|(_, record)| record.name == name)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.handle(index)
            .and_then(|h| self.devices.get(h))
            .map(|record| record.name.as_str())
    }

    pub fn instance_id(&self, index: usize) -> Option<InstanceId> {
        self.handle(index)
            .and_then(|h| self.devices.get(h))
            .map(|record| record.instance_id)
    }

    // ── Keys ─────────────────────────────────────────────────────────────────

    /// Records a key transition reported by a producer.
    pub fn send_key(&mut self, index: usize, scancode: Scancode, pressed: bool) -> Vec<InputEvent> {
        if scancode == Scancode::Unknown {
            debug!(index, "unknown scancode dropped");
            return Vec::new();
        }
        let Some(handle) = self.handle(index) else {
            return Vec::new();
        };
        let Some(record) = self.devices.get_mut(handle) else {
            return Vec::new();
        };

        let was_pressed = record.state.is_pressed(scancode);
        if !pressed && !was_pressed {
            return Vec::new();
        }
        let repeat = pressed && was_pressed;
        if !repeat {
            record.state.set_pressed(scancode, pressed);
            record.state.modifiers.apply(scancode, pressed);
        }

        vec![key_event(index, record, scancode, pressed, repeat)]
    }

    /// Releases every pressed key of a device.
    pub fn reset(&mut self, index: usize) -> Vec<InputEvent> {
        let Some(handle) = self.handle(index) else {
            return Vec::new();
        };
        let Some(record) = self.devices.get_mut(handle) else {
            return Vec::new();
        };
        let keys = record.state.pressed_keys();
        keys.into_iter()
            .map(|scancode| {
                record.state.set_pressed(scancode, false);
                record.state.modifiers.apply(scancode, false);
                key_event(index, record, scancode, false, false)
            })
            .collect()
    }

    pub fn is_pressed(&self, index: usize, scancode: Scancode) -> bool {
        self.state(index).map_or(false, |s| s.is_pressed(scancode))
    }

    pub fn pressed_keys(&self, index: usize) -> Vec<Scancode> {
        self.state(index).map(KeyboardState::pressed_keys).unwrap_or_default()
    }

    pub fn modifiers(&self, index: usize) -> Modifiers {
        self.state(index).map(KeyboardState::modifiers).unwrap_or_default()
    }

    /// Overrides the modifier bitset, for example to sync lock-key LEDs.
    pub fn set_modifiers(&mut self, index: usize, modifiers: Modifiers) {
        if let Some(record) = self.handle(index).and_then(|h| self.devices.get_mut(h)) {
            record.state.modifiers = modifiers;
        }
    }

    // ── Text ─────────────────────────────────────────────────────────────────

    /// Delivers committed text to the focused window.
    ///
    /// Dropped when the device has no focus, the text is empty, or it starts
    /// with a control character (those arrive as key events instead).
    pub fn send_text(&mut self, index: usize, text: &str) -> Vec<InputEvent> {
        let Some(window) = self.focus(index) else {
            return Vec::new();
        };
        match text.chars().next() {
            Some(first) if !first.is_control() => {}
            _ => return Vec::new(),
        }
        vec![InputEvent::new(EventPayload::TextInput(TextInputEvent {
            window: Some(window),
            text: TextBuffer::new(text),
        }))]
    }

    /// Delivers in-progress composition text to the focused window.
    pub fn send_editing(&mut self, index: usize, text: &str, start: i32, length: i32) -> Vec<InputEvent> {
        let Some(window) = self.focus(index) else {
            return Vec::new();
        };
        vec![InputEvent::new(EventPayload::TextEditing(TextEditingEvent {
            window: Some(window),
            text: TextBuffer::new(text),
            start,
            length,
        }))]
    }

    // ── Focus ────────────────────────────────────────────────────────────────

    pub fn focus(&self, index: usize) -> Option<WindowId> {
        self.handle(index).and_then(|h| self.devices.focus(h))
    }

    /// Window focused by any keyboard.
    pub fn any_focus(&self) -> Option<WindowId> {
        self.devices.any_focus()
    }

    /// Moves a keyboard's focus.
    ///
    /// Pressed keys are released against the old window first.  `FocusLost`
    /// and `FocusGained` are only produced when no sibling keyboard is
    /// focused on the window in question.
    pub fn set_focus(&mut self, index: usize, window: Option<WindowId>) -> Vec<InputEvent> {
        let Some(handle) = self.handle(index) else {
            return Vec::new();
        };
        let old = self.devices.focus(handle);
        if old == window {
            return Vec::new();
        }

        let mut events = if old.is_some() { self.reset(index) } else { Vec::new() };
        self.devices.set_focus(handle, window);

        if let Some(old) = old {
            if !self.devices.any_other_focused(old, handle) {
                events.push(InputEvent::window(old, WindowEventKind::FocusLost));
            }
        }
        if let Some(new) = window {
            if !self.devices.any_other_focused(new, handle) {
                events.push(InputEvent::window(new, WindowEventKind::FocusGained));
            }
        }
        debug!(index, ?old, ?window, "keyboard focus changed");
        events
    }
}

fn key_event(
    index: usize,
    record: &DeviceRecord<KeyboardState>,
    scancode: Scancode,
    pressed: bool,
    repeat: bool,
) -> InputEvent {
    let event = KeyboardEvent {
        window: record.focus,
        device: index,
        scancode,
        keycode: scancode.default_keycode(),
        modifiers: record.state.modifiers,
        repeat,
    };
    InputEvent::new(if pressed {
        EventPayload::KeyDown(event)
    } else {
        EventPayload::KeyUp(event)
    })
}
