//! Typed input events.
//!
//! Every event that travels through the queue is an [`InputEvent`]: a
//! millisecond timestamp plus an [`EventPayload`].  The payload is a Rust enum
//! with one variant per event kind, so a consumer `match`es on it and the
//! compiler guarantees every field it reads exists for that kind.
//!
//! # Event kinds and ranges (for beginners)
//!
//! [`EventKind`] is the payload's bare tag.  Kinds are declared in a fixed
//! order and derive `Ord`, which lets queue operations address a contiguous
//! *range* of kinds:
//!
//! ```rust
//! use input_core::events::EventKind;
//!
//! let joystick = EventKind::JoyAxisMotion..=EventKind::JoyDeviceRemoved;
//! assert!(joystick.contains(&EventKind::JoyHatMotion));
//! assert!(!joystick.contains(&EventKind::ControllerAxisMotion));
//! ```
//!
//! The same ordering drives the per-kind enable table, an
//! `enum_map::EnumMap<EventKind, bool>`.

use std::fmt;
use std::ops::RangeInclusive;

use enum_map::Enum;
use serde::{Deserialize, Serialize};

use crate::controller::mapping::{ControllerAxis, ControllerButton};
use crate::device::InstanceId;
use crate::joystick::hat::HatPosition;
use crate::keyboard::modifiers::Modifiers;
use crate::keyboard::scancode::{Keycode, Scancode};
use crate::mouse::{MouseButton, MouseButtons};

/// Maximum number of UTF-8 bytes carried by a text event.
pub const TEXT_CAPACITY: usize = 31;

/// Opaque identifier of an application window, assigned by the windowing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window {}", self.0)
    }
}

// ── Kinds ─────────────────────────────────────────────────────────────────────

/// Tag of an [`EventPayload`], ordered so that related kinds form ranges.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Enum, Serialize, Deserialize,
)]
pub enum EventKind {
    Quit,
    Window,
    SysWm,
    KeyDown,
    KeyUp,
    TextEditing,
    TextInput,
    MouseMotion,
    MouseButtonDown,
    MouseButtonUp,
    MouseWheel,
    JoyAxisMotion,
    JoyBallMotion,
    JoyHatMotion,
    JoyButtonDown,
    JoyButtonUp,
    JoyDeviceAdded,
    JoyDeviceRemoved,
    ControllerAxisMotion,
    ControllerButtonDown,
    ControllerButtonUp,
    ControllerDeviceAdded,
    ControllerDeviceRemoved,
    ControllerDeviceRemapped,
    User,
}

impl EventKind {
    /// Range matching every kind.
    pub const ALL: RangeInclusive<EventKind> = EventKind::Quit..=EventKind::User;
    pub const KEYBOARD: RangeInclusive<EventKind> = EventKind::KeyDown..=EventKind::TextInput;
    pub const MOUSE: RangeInclusive<EventKind> = EventKind::MouseMotion..=EventKind::MouseWheel;
    pub const JOYSTICK: RangeInclusive<EventKind> =
        EventKind::JoyAxisMotion..=EventKind::JoyDeviceRemoved;
    pub const CONTROLLER: RangeInclusive<EventKind> =
        EventKind::ControllerAxisMotion..=EventKind::ControllerDeviceRemapped;

    /// Range matching exactly one kind.
    pub fn only(self) -> RangeInclusive<EventKind> {
        self..=self
    }
}

// ── Payloads ──────────────────────────────────────────────────────────────────

/// Window state changes reported by the windowing layer or synthesized by the
/// keyboard and mouse focus logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowEventKind {
    Shown,
    Hidden,
    Exposed,
    Moved { x: i32, y: i32 },
    Resized { width: u32, height: u32 },
    Minimized,
    Maximized,
    Restored,
    /// The mouse entered the window.
    Enter,
    /// The mouse left the window.
    Leave,
    FocusGained,
    FocusLost,
    Close,
}

/// Platform window-system message carried out of band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysWmMessage {
    /// Name of the windowing system that produced the message (e.g. `"x11"`).
    pub subsystem: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyboardEvent {
    pub window: Option<WindowId>,
    /// Index of the keyboard that produced the key.
    pub device: usize,
    pub scancode: Scancode,
    pub keycode: Keycode,
    pub modifiers: Modifiers,
    /// `true` when the key was already held (auto-repeat).
    pub repeat: bool,
}

/// Short UTF-8 string, never longer than [`TEXT_CAPACITY`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextBuffer(String);

impl TextBuffer {
    /// Copies `text`, truncating at the last character boundary that fits.
    pub fn new(text: &str) -> Self {
        let mut end = text.len().min(TEXT_CAPACITY);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        TextBuffer(text[..end].to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextInputEvent {
    pub window: Option<WindowId>,
    pub text: TextBuffer,
}

/// In-progress composition text from an input method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEditingEvent {
    pub window: Option<WindowId>,
    pub text: TextBuffer,
    pub start: i32,
    pub length: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseMotionEvent {
    pub window: Option<WindowId>,
    /// Index of the mouse that moved.
    pub device: usize,
    pub buttons: MouseButtons,
    pub x: i32,
    pub y: i32,
    pub xrel: i32,
    pub yrel: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseButtonEvent {
    pub window: Option<WindowId>,
    pub device: usize,
    pub button: MouseButton,
    /// 1 for a single click, 2 for a double click, and so on.
    pub clicks: u8,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseWheelEvent {
    pub window: Option<WindowId>,
    pub device: usize,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoyAxisEvent {
    pub which: InstanceId,
    pub axis: u8,
    pub value: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoyBallEvent {
    pub which: InstanceId,
    pub ball: u8,
    pub xrel: i16,
    pub yrel: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoyHatEvent {
    pub which: InstanceId,
    pub hat: u8,
    pub value: HatPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoyButtonEvent {
    pub which: InstanceId,
    pub button: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub which: InstanceId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerAxisEvent {
    pub which: InstanceId,
    pub axis: ControllerAxis,
    pub value: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerButtonEvent {
    pub which: InstanceId,
    pub button: ControllerButton,
}

/// Application-defined event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEvent {
    pub code: i32,
    pub data1: i64,
    pub data2: i64,
}

/// Kind-specific content of an [`InputEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    Quit,
    Window {
        window: WindowId,
        event: WindowEventKind,
    },
    SysWm {
        window: Option<WindowId>,
        message: SysWmMessage,
    },
    KeyDown(KeyboardEvent),
    KeyUp(KeyboardEvent),
    TextEditing(TextEditingEvent),
    TextInput(TextInputEvent),
    MouseMotion(MouseMotionEvent),
    MouseButtonDown(MouseButtonEvent),
    MouseButtonUp(MouseButtonEvent),
    MouseWheel(MouseWheelEvent),
    JoyAxisMotion(JoyAxisEvent),
    JoyBallMotion(JoyBallEvent),
    JoyHatMotion(JoyHatEvent),
    JoyButtonDown(JoyButtonEvent),
    JoyButtonUp(JoyButtonEvent),
    JoyDeviceAdded(DeviceEvent),
    JoyDeviceRemoved(DeviceEvent),
    ControllerAxisMotion(ControllerAxisEvent),
    ControllerButtonDown(ControllerButtonEvent),
    ControllerButtonUp(ControllerButtonEvent),
    ControllerDeviceAdded(DeviceEvent),
    ControllerDeviceRemoved(DeviceEvent),
    ControllerDeviceRemapped(DeviceEvent),
    User(UserEvent),
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Quit => EventKind::Quit,
            EventPayload::Window { .. } => EventKind::Window,
            EventPayload::SysWm { .. } => EventKind::SysWm,
            EventPayload::KeyDown(_) => EventKind::KeyDown,
            EventPayload::KeyUp(_) => EventKind::KeyUp,
            EventPayload::TextEditing(_) => EventKind::TextEditing,
            EventPayload::TextInput(_) => EventKind::TextInput,
            EventPayload::MouseMotion(_) => EventKind::MouseMotion,
            EventPayload::MouseButtonDown(_) => EventKind::MouseButtonDown,
            EventPayload::MouseButtonUp(_) => EventKind::MouseButtonUp,
            EventPayload::MouseWheel(_) => EventKind::MouseWheel,
            EventPayload::JoyAxisMotion(_) => EventKind::JoyAxisMotion,
            EventPayload::JoyBallMotion(_) => EventKind::JoyBallMotion,
            EventPayload::JoyHatMotion(_) => EventKind::JoyHatMotion,
            EventPayload::JoyButtonDown(_) => EventKind::JoyButtonDown,
            EventPayload::JoyButtonUp(_) => EventKind::JoyButtonUp,
            EventPayload::JoyDeviceAdded(_) => EventKind::JoyDeviceAdded,
            EventPayload::JoyDeviceRemoved(_) => EventKind::JoyDeviceRemoved,
            EventPayload::ControllerAxisMotion(_) => EventKind::ControllerAxisMotion,
            EventPayload::ControllerButtonDown(_) => EventKind::ControllerButtonDown,
            EventPayload::ControllerButtonUp(_) => EventKind::ControllerButtonUp,
            EventPayload::ControllerDeviceAdded(_) => EventKind::ControllerDeviceAdded,
            EventPayload::ControllerDeviceRemoved(_) => EventKind::ControllerDeviceRemoved,
            EventPayload::ControllerDeviceRemapped(_) => EventKind::ControllerDeviceRemapped,
            EventPayload::User(_) => EventKind::User,
        }
    }

    /// Joystick or controller instance the event refers to, if any.
    pub fn instance_id(&self) -> Option<InstanceId> {
        match self {
            EventPayload::JoyAxisMotion(e) => Some(e.which),
            EventPayload::JoyBallMotion(e) => Some(e.which),
            EventPayload::JoyHatMotion(e) => Some(e.which),
            EventPayload::JoyButtonDown(e) | EventPayload::JoyButtonUp(e) => Some(e.which),
            EventPayload::ControllerAxisMotion(e) => Some(e.which),
            EventPayload::ControllerButtonDown(e) | EventPayload::ControllerButtonUp(e) => {
                Some(e.which)
            }
            EventPayload::JoyDeviceAdded(e)
            | EventPayload::JoyDeviceRemoved(e)
            | EventPayload::ControllerDeviceAdded(e)
            | EventPayload::ControllerDeviceRemoved(e)
            | EventPayload::ControllerDeviceRemapped(e) => Some(e.which),
            _ => None,
        }
    }

    /// Index of the mouse that produced the event, if it is a mouse event.
    pub fn mouse_device(&self) -> Option<usize> {
        match self {
            EventPayload::MouseMotion(e) => Some(e.device),
            EventPayload::MouseButtonDown(e) | EventPayload::MouseButtonUp(e) => Some(e.device),
            EventPayload::MouseWheel(e) => Some(e.device),
            _ => None,
        }
    }
}

/// One queued event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    /// Milliseconds since the owning event system was created, stamped on push.
    pub timestamp_ms: u32,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl InputEvent {
    /// Wraps a payload with a zero timestamp; [`EventSystem::push`] stamps it.
    ///
    /// [`EventSystem::push`]: crate::events::EventSystem::push
    pub fn new(payload: EventPayload) -> Self {
        Self {
            timestamp_ms: 0,
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn quit() -> Self {
        Self::new(EventPayload::Quit)
    }

    pub fn user(code: i32, data1: i64, data2: i64) -> Self {
        Self::new(EventPayload::User(UserEvent { code, data1, data2 }))
    }

    pub fn window(window: WindowId, event: WindowEventKind) -> Self {
        Self::new(EventPayload::Window { window, event })
    }
}

impl From<EventPayload> for InputEvent {
    fn from(payload: EventPayload) -> Self {
        InputEvent::new(payload)
    }
}
