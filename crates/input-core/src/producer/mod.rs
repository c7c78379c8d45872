//! Device producers: the platform-facing side of the core.
//!
//! A producer is whatever knows about real hardware (an evdev reader, a HID
//! enumerator, a script in a test).  It never touches the event queue.  Each
//! time it is polled it returns [`DeviceReport`]s describing what changed,
//! and the context feeds them to the matching subsystem:
//!
//! ```text
//!  DeviceProducer::poll_once ──► Vec<DeviceReport> ──► InputContext::dispatch
//!                                                         │
//!                      ┌──────────────┬───────────────────┼────────────┐
//!                      ▼              ▼                   ▼            ▼
//!                  joysticks      keyboards             mice     event system
//! ```
//!
//! Producers are polled either by the consumer (from `pump`, `poll` and
//! `wait`) or, when enabled, by a dedicated [`ProducerThread`].

pub mod mock;
pub mod thread;

use serde::{Deserialize, Serialize};

use crate::events::{SysWmMessage, WindowEventKind, WindowId};
use crate::joystick::DeviceIdentity;
use crate::keyboard::Scancode;
use crate::mouse::MouseButton;

pub use mock::{MockProducer, MockProducerHandle};
pub use thread::{PauseGuard, ProducerState, ProducerThread};

/// The kind of device a hotplug announcement is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Keyboard,
    Mouse,
    Joystick,
    /// A class the core does not handle.  Logged and ignored.
    Other(String),
}

/// A device appearing or disappearing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAnnouncement {
    pub class: DeviceClass,
    pub identity: DeviceIdentity,
}

impl DeviceAnnouncement {
    pub fn joystick(identity: DeviceIdentity) -> Self {
        Self {
            class: DeviceClass::Joystick,
            identity,
        }
    }

    pub fn keyboard(name: &str) -> Self {
        Self {
            class: DeviceClass::Keyboard,
            identity: DeviceIdentity::new(name),
        }
    }

    pub fn mouse(name: &str) -> Self {
        Self {
            class: DeviceClass::Mouse,
            identity: DeviceIdentity::new(name),
        }
    }
}

/// One observation reported by a producer.
///
/// Joysticks, keyboards and mice are addressed by device index: the position
/// of the device among the attached devices of its class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "report", rename_all = "snake_case")]
pub enum DeviceReport {
    Added(DeviceAnnouncement),
    Removed(DeviceAnnouncement),

    JoyAxis { device: usize, axis: u8, value: i16 },
    JoyButton { device: usize, button: u8, pressed: bool },
    /// Raw hat value, decoded with the device's `hat_encoding`.
    JoyHat { device: usize, hat: u8, value: i32 },
    /// One axis of a two-axis hat.
    JoyHatAxis { device: usize, hat: u8, horizontal: bool, value: i32 },
    JoyBall { device: usize, ball: u8, dx: i16, dy: i16 },

    Key { keyboard: usize, scancode: Scancode, pressed: bool },
    Text { keyboard: usize, text: String },
    Editing { keyboard: usize, text: String, start: i32, length: i32 },
    KeyboardFocus { keyboard: usize, window: Option<WindowId> },

    MouseMotion {
        mouse: usize,
        window: Option<WindowId>,
        relative: bool,
        x: i32,
        y: i32,
    },
    MouseButton {
        mouse: usize,
        window: Option<WindowId>,
        button: MouseButton,
        pressed: bool,
    },
    MouseWheel { mouse: usize, window: Option<WindowId>, dx: i32, dy: i32 },
    MouseFocus { mouse: usize, window: Option<WindowId> },

    Window { window: WindowId, event: WindowEventKind },
    SysWm { window: Option<WindowId>, message: SysWmMessage },
    Quit,
}

/// Source of [`DeviceReport`]s.
///
/// `poll_once` must not block; return an empty `Vec` when nothing happened.
pub trait DeviceProducer: Send {
    fn name(&self) -> &str {
        "producer"
    }

    fn poll_once(&mut self) -> Vec<DeviceReport>;
}
