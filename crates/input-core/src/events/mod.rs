//! Event types, the bounded queue, and the thread-safe event system.
//!
//! - [`types`]  – [`InputEvent`] and its payloads.
//! - [`queue`]  – [`EventQueue`], the unsynchronized core data structure.
//! - [`system`] – [`EventSystem`], the mutex-guarded queue with filter,
//!   watchers and per-kind enable set.

pub mod queue;
pub mod system;
pub mod types;

pub use queue::{EntryHandle, EventQueue, DEFAULT_CAPACITY};
pub use system::{EventError, EventFilter, EventSystem, EventWatcher, WatcherId};
pub use types::{
    ControllerAxisEvent, ControllerButtonEvent, DeviceEvent, EventKind, EventPayload, InputEvent,
    JoyAxisEvent, JoyBallEvent, JoyButtonEvent, JoyHatEvent, KeyboardEvent, MouseButtonEvent,
    MouseMotionEvent, MouseWheelEvent, SysWmMessage, TextBuffer, TextEditingEvent, TextInputEvent,
    UserEvent, WindowEventKind, WindowId, TEXT_CAPACITY,
};
