//! Keyboard modifier bitset.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::scancode::Scancode;

bitflags! {
    /// Modifier keys currently held (or toggled on, for lock keys).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Modifiers: u16 {
        const LSHIFT = 0x0001;
        const RSHIFT = 0x0002;
        const LCTRL = 0x0040;
        const RCTRL = 0x0080;
        const LALT = 0x0100;
        const RALT = 0x0200;
        const LGUI = 0x0400;
        const RGUI = 0x0800;
        const NUM = 0x1000;
        const CAPS = 0x2000;
        const MODE = 0x4000;
        const SCROLL = 0x8000;

        const SHIFT = Self::LSHIFT.bits() | Self::RSHIFT.bits();
        const CTRL = Self::LCTRL.bits() | Self::RCTRL.bits();
        const ALT = Self::LALT.bits() | Self::RALT.bits();
        const GUI = Self::LGUI.bits() | Self::RGUI.bits();
    }
}

/// How a modifier key changes the bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierBehavior {
    /// Set while held, cleared on release.
    Held,
    /// Flipped on every press, release has no effect.
    Lock,
}

impl Modifiers {
    /// Returns the modifier bit a scancode controls and how it behaves.
    pub fn for_scancode(scancode: Scancode) -> Option<(Modifiers, ModifierBehavior)> {
        use ModifierBehavior::{Held, Lock};
        let entry = match scancode {
            Scancode::LeftShift => (Modifiers::LSHIFT, Held),
            Scancode::RightShift => (Modifiers::RSHIFT, Held),
            Scancode::LeftCtrl => (Modifiers::LCTRL, Held),
            Scancode::RightCtrl => (Modifiers::RCTRL, Held),
            Scancode::LeftAlt => (Modifiers::LALT, Held),
            Scancode::RightAlt => (Modifiers::RALT, Held),
            Scancode::LeftGui => (Modifiers::LGUI, Held),
            Scancode::RightGui => (Modifiers::RGUI, Held),
            Scancode::Mode => (Modifiers::MODE, Held),
            Scancode::NumLock => (Modifiers::NUM, Lock),
            Scancode::CapsLock => (Modifiers::CAPS, Lock),
            Scancode::ScrollLock => (Modifiers::SCROLL, Lock),
            _ => return None,
        };
        Some(entry)
    }

    /// Applies one key transition to the bitset.
    pub fn apply(&mut self, scancode: Scancode, pressed: bool) {
        match Self::for_scancode(scancode) {
            Some((bit, ModifierBehavior::Held)) => self.set(bit, pressed),
            Some((bit, ModifierBehavior::Lock)) if pressed => self.toggle(bit),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_held_modifier_sets_and_clears() {
        let mut mods = Modifiers::empty();
        mods.apply(Scancode::LeftShift, true);
        assert!(mods.contains(Modifiers::LSHIFT));
        assert!(mods.intersects(Modifiers::SHIFT));
        mods.apply(Scancode::LeftShift, false);
        assert!(mods.is_empty());
    }

    #[test]
    fn test_lock_modifier_toggles_on_press_only() {
        let mut mods = Modifiers::empty();
        mods.apply(Scancode::CapsLock, true);
        mods.apply(Scancode::CapsLock, false);
        assert!(mods.contains(Modifiers::CAPS), "release must not clear a lock key");
        mods.apply(Scancode::CapsLock, true);
        assert!(!mods.contains(Modifiers::CAPS));
    }

    #[test]
    fn test_non_modifier_keys_leave_state_untouched() {
        let mut mods = Modifiers::RCTRL;
        mods.apply(Scancode::KeyA, true);
        assert_eq!(mods, Modifiers::RCTRL);
    }
}
