//! Platform capabilities the core needs but cannot provide itself.
//!
//! The core never talks to a window system.  When the mouse layer has to
//! clamp a position, move the pointer or switch relative mode, it asks a
//! [`PlatformBackend`] injected at construction time.  Real applications wire
//! this to their windowing layer; tests and the monitor use
//! [`HeadlessBackend`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::debug;

use crate::events::WindowId;

/// Window-system operations used by the mouse layer.
#[cfg_attr(test, mockall::automock)]
pub trait PlatformBackend: Send + Sync {
    /// Client-area size of `window` in pixels, if the window exists.
    fn window_size(&self, window: WindowId) -> Option<(u32, u32)>;

    /// Moves the pointer inside `window`.
    ///
    /// Returns `true` if the platform will report the resulting motion
    /// itself; `false` asks the caller to synthesize it.
    fn warp_mouse(&self, window: WindowId, x: i32, y: i32) -> bool;

    /// Enables or disables relative pointer mode.  Returns `false` if unsupported.
    fn set_relative_mouse_mode(&self, enabled: bool) -> bool;

    fn show_cursor(&self, visible: bool);
}

/// A backend with no real windows: sizes are whatever the host registered.
#[derive(Debug)]
pub struct HeadlessBackend {
    windows: Mutex<HashMap<WindowId, (u32, u32)>>,
    relative_supported: bool,
    cursor_visible: AtomicBool,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            relative_supported: true,
            cursor_visible: AtomicBool::new(true),
        }
    }

    /// A backend that refuses relative mouse mode.
    pub fn without_relative_mode() -> Self {
        Self {
            relative_supported: false,
            ..Self::new()
        }
    }

    /// Registers or resizes a window.
    pub fn set_window_size(&self, window: WindowId, width: u32, height: u32) {
        if let Ok(mut windows) = self.windows.lock() {
            windows.insert(window, (width, height));
        }
    }

    pub fn remove_window(&self, window: WindowId) {
        if let Ok(mut windows) = self.windows.lock() {
            windows.remove(&window);
        }
    }

    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible.load(Ordering::Relaxed)
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformBackend for HeadlessBackend {
    fn window_size(&self, window: WindowId) -> Option<(u32, u32)> {
        self.windows.lock().ok()?.get(&window).copied()
    }

    fn warp_mouse(&self, window: WindowId, x: i32, y: i32) -> bool {
        debug!(%window, x, y, "headless warp");
        false
    }

    fn set_relative_mouse_mode(&self, enabled: bool) -> bool {
        !enabled || self.relative_supported
    }

    fn show_cursor(&self, visible: bool) {
        self.cursor_visible.store(visible, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registered_window_reports_its_size() {
        let backend = HeadlessBackend::new();
        backend.set_window_size(WindowId(3), 640, 480);

        assert_eq!(backend.window_size(WindowId(3)), Some((640, 480)));
        assert_eq!(backend.window_size(WindowId(4)), None);

        backend.remove_window(WindowId(3));
        assert_eq!(backend.window_size(WindowId(3)), None);
    }

    #[test]
    fn test_relative_mode_refusal_only_applies_to_enabling() {
        let backend = HeadlessBackend::without_relative_mode();
        assert!(!backend.set_relative_mouse_mode(true));
        assert!(backend.set_relative_mouse_mode(false));
        assert!(HeadlessBackend::new().set_relative_mouse_mode(true));
    }

    #[test]
    fn test_headless_warp_asks_for_synthesized_motion() {
        let backend = HeadlessBackend::new();
        assert!(!backend.warp_mouse(WindowId(1), 5, 5));
        backend.show_cursor(false);
        assert!(!backend.cursor_visible());
    }
}
