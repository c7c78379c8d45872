//! # input-core
//!
//! Input event core: a bounded, thread-safe event queue plus the device
//! subsystems that feed it (joysticks with hotplug, game controllers with a
//! mapping database, keyboards and mice).
//!
//! The crate has no OS dependencies.  Real hardware enters through
//! [`DeviceProducer`]s and window-system services through a
//! [`PlatformBackend`]; both are traits, so tests and headless hosts plug in
//! their own.
//!
//! # Architecture overview (for beginners)
//!
//! ```text
//!   DeviceProducer ──reports──► InputContext ──► subsystems ──events──► EventSystem ──► consumer
//!                                                                         │   ▲
//!                                                            watchers ◄───┘   │
//!                                        (controller translation pushes more) ┘
//! ```
//!
//! - **`events`** – The queue itself: fixed capacity, FIFO with
//!   type-range queries, a filter, watchers and a per-kind enable set.
//!
//! - **`device`** – Building blocks shared by every subsystem: monotonic
//!   instance ids, 16-byte device GUIDs and an ordered device registry.
//!
//! - **`joystick`** – Attached joysticks, their cached control state and
//!   reference-counted opening.  Removal keeps an open device readable.
//!
//! - **`controller`** – The mapping-record parser, the mapping database and
//!   live translation of raw joystick events into controller events.
//!
//! - **`keyboard`** / **`mouse`** – Per-device state, focus tracking,
//!   modifiers and multi-click detection.
//!
//! - **`producer`** – The report vocabulary producers speak, a mock producer
//!   for tests and the optional dedicated producer thread.
//!
//! - **`context`** – [`InputContext`], which owns all of the above and
//!   defines the initialization and shutdown order.

pub mod backend;
pub mod config;
pub mod context;
pub mod controller;
pub mod device;
pub mod events;
pub mod joystick;
pub mod keyboard;
pub mod mouse;
pub mod producer;

// Re-export the most-used types at the crate root so callers can write
// `input_core::InputEvent` instead of `input_core::events::types::InputEvent`.
pub use backend::{HeadlessBackend, PlatformBackend};
pub use config::CoreConfig;
pub use context::{CoreError, InputContext};
pub use controller::{ControllerAxis, ControllerButton, ControllerSubsystem, MappingDatabase};
pub use device::{DeviceGuid, InstanceId};
pub use events::{EventError, EventKind, EventPayload, EventSystem, InputEvent, WindowId};
pub use joystick::{DeviceIdentity, HatEncoding, HatPosition, JoystickSubsystem};
pub use keyboard::{Keycode, Modifiers, Scancode};
pub use mouse::{MouseButton, MouseButtons};
pub use producer::{DeviceAnnouncement, DeviceClass, DeviceProducer, DeviceReport, MockProducer};
