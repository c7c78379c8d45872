//! Physical key positions (scancodes) and layout-dependent key symbols (keycodes).
//!
//! The canonical key representation is the USB HID Usage ID from the
//! Keyboard/Keypad page (0x07).  Device producers translate their native codes
//! (evdev key codes, Win32 scan codes, IOKit usages) into [`Scancode`] before
//! reporting; the core never sees platform codes.
//!
//! # Scancode vs. keycode (for beginners)
//!
//! A *scancode* names a physical position on the keyboard: the key to the
//! right of Tab is `Scancode::KeyQ` on every keyboard, even an AZERTY one
//! where the cap says "A".  A *keycode* names the symbol the current layout
//! produces for that position.  The core ships one default (US QWERTY)
//! layout; printable keys map to their lowercase character, everything else
//! maps to the scancode value tagged with [`Keycode::SCANCODE_MASK`].
//!
//! | Key          | Scancode | Default keycode |
//! |--------------|----------|-----------------|
//! | Letter A     | 0x04     | `'a'`           |
//! | Enter        | 0x28     | `'\r'`          |
//! | F1           | 0x3A     | `0x4000_003A`   |
//! | Left Ctrl    | 0xE0     | `0x4000_00E0`   |

use serde::{Deserialize, Serialize};

/// Number of distinct scancode slots tracked per keyboard.
pub const SCANCODE_SLOTS: usize = 512;

/// A layout-dependent key symbol.
///
/// Printable keys carry their Unicode scalar value; non-printable keys carry
/// `scancode | SCANCODE_MASK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Keycode(pub u32);

impl Keycode {
    /// Bit set on keycodes that are derived from a scancode rather than a character.
    pub const SCANCODE_MASK: u32 = 1 << 30;
    /// The keycode reported for [`Scancode::Unknown`].
    pub const UNKNOWN: Keycode = Keycode(0);

    const fn ch(c: char) -> Self {
        Keycode(c as u32)
    }

    const fn sc(code: u16) -> Self {
        Keycode(code as u32 | Self::SCANCODE_MASK)
    }

    /// Returns the character this keycode produces, if it is printable.
    pub fn as_char(self) -> Option<char> {
        if self.0 & Self::SCANCODE_MASK != 0 {
            return None;
        }
        char::from_u32(self.0).filter(|c| !c.is_control())
    }
}

macro_rules! scancode_table {
    ($( $variant:ident = $code:literal, $name:literal, $key:expr; )*) => {
        /// USB HID Usage ID of a physical key (page 0x07).
        ///
        /// [`Scancode::Unknown`] stands in for any usage the table does not know.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u16)]
        pub enum Scancode {
            /// Sentinel for usages with no entry in the table.
            Unknown = 0x0000,
            $( $variant = $code, )*
        }

        impl Scancode {
            /// Converts a raw usage id into a [`Scancode`].
            ///
            /// Returns [`Scancode::Unknown`] for unassigned values.
            pub fn from_u16(value: u16) -> Self {
                match value {
                    $( $code => Scancode::$variant, )*
                    _ => Scancode::Unknown,
                }
            }

            /// Human-readable key name, empty for [`Scancode::Unknown`].
            pub fn name(self) -> &'static str {
                match self {
                    Scancode::Unknown => "",
                    $( Scancode::$variant => $name, )*
                }
            }

            /// Keycode produced by the built-in US layout.
            pub fn default_keycode(self) -> Keycode {
                match self {
                    Scancode::Unknown => Keycode::UNKNOWN,
                    $( Scancode::$variant => $key, )*
                }
            }
        }
    };
}

scancode_table! {
    KeyA = 0x04, "A", Keycode::ch('a');
    KeyB = 0x05, "B", Keycode::ch('b');
    KeyC = 0x06, "C", Keycode::ch('c');
    KeyD = 0x07, "D", Keycode::ch('d');
    KeyE = 0x08, "E", Keycode::ch('e');
    KeyF = 0x09, "F", Keycode::ch('f');
    KeyG = 0x0A, "G", Keycode::ch('g');
    KeyH = 0x0B, "H", Keycode::ch('h');
    KeyI = 0x0C, "I", Keycode::ch('i');
    KeyJ = 0x0D, "J", Keycode::ch('j');
    KeyK = 0x0E, "K", Keycode::ch('k');
    KeyL = 0x0F, "L", Keycode::ch('l');
    KeyM = 0x10, "M", Keycode::ch('m');
    KeyN = 0x11, "N", Keycode::ch('n');
    KeyO = 0x12, "O", Keycode::ch('o');
    KeyP = 0x13, "P", Keycode::ch('p');
    KeyQ = 0x14, "Q", Keycode::ch('q');
    KeyR = 0x15, "R", Keycode::ch('r');
    KeyS = 0x16, "S", Keycode::ch('s');
    KeyT = 0x17, "T", Keycode::ch('t');
    KeyU = 0x18, "U", Keycode::ch('u');
    KeyV = 0x19, "V", Keycode::ch('v');
    KeyW = 0x1A, "W", Keycode::ch('w');
    KeyX = 0x1B, "X", Keycode::ch('x');
    KeyY = 0x1C, "Y", Keycode::ch('y');
    KeyZ = 0x1D, "Z", Keycode::ch('z');
    Digit1 = 0x1E, "1", Keycode::ch('1');
    Digit2 = 0x1F, "2", Keycode::ch('2');
    Digit3 = 0x20, "3", Keycode::ch('3');
    Digit4 = 0x21, "4", Keycode::ch('4');
    Digit5 = 0x22, "5", Keycode::ch('5');
    Digit6 = 0x23, "6", Keycode::ch('6');
    Digit7 = 0x24, "7", Keycode::ch('7');
    Digit8 = 0x25, "8", Keycode::ch('8');
    Digit9 = 0x26, "9", Keycode::ch('9');
    Digit0 = 0x27, "0", Keycode::ch('0');
    Return = 0x28, "Return", Keycode::ch('\r');
    Escape = 0x29, "Escape", Keycode::ch('\u{1b}');
    Backspace = 0x2A, "Backspace", Keycode::ch('\u{8}');
    Tab = 0x2B, "Tab", Keycode::ch('\t');
    Space = 0x2C, "Space", Keycode::ch(' ');
    Minus = 0x2D, "-", Keycode::ch('-');
    Equals = 0x2E, "=", Keycode::ch('=');
    LeftBracket = 0x2F, "[", Keycode::ch('[');
    RightBracket = 0x30, "]", Keycode::ch(']');
    Backslash = 0x31, "\\", Keycode::ch('\\');
    NonUsHash = 0x32, "#", Keycode::ch('#');
    Semicolon = 0x33, ";", Keycode::ch(';');
    Apostrophe = 0x34, "'", Keycode::ch('\'');
    Grave = 0x35, "`", Keycode::ch('`');
    Comma = 0x36, ",", Keycode::ch(',');
    Period = 0x37, ".", Keycode::ch('.');
    Slash = 0x38, "/", Keycode::ch('/');
    CapsLock = 0x39, "CapsLock", Keycode::sc(0x39);
    F1 = 0x3A, "F1", Keycode::sc(0x3A);
    F2 = 0x3B, "F2", Keycode::sc(0x3B);
    F3 = 0x3C, "F3", Keycode::sc(0x3C);
    F4 = 0x3D, "F4", Keycode::sc(0x3D);
    F5 = 0x3E, "F5", Keycode::sc(0x3E);
    F6 = 0x3F, "F6", Keycode::sc(0x3F);
    F7 = 0x40, "F7", Keycode::sc(0x40);
    F8 = 0x41, "F8", Keycode::sc(0x41);
    F9 = 0x42, "F9", Keycode::sc(0x42);
    F10 = 0x43, "F10", Keycode::sc(0x43);
    F11 = 0x44, "F11", Keycode::sc(0x44);
    F12 = 0x45, "F12", Keycode::sc(0x45);
    PrintScreen = 0x46, "PrintScreen", Keycode::sc(0x46);
    ScrollLock = 0x47, "ScrollLock", Keycode::sc(0x47);
    Pause = 0x48, "Pause", Keycode::sc(0x48);
    Insert = 0x49, "Insert", Keycode::sc(0x49);
    Home = 0x4A, "Home", Keycode::sc(0x4A);
    PageUp = 0x4B, "PageUp", Keycode::sc(0x4B);
    Delete = 0x4C, "Delete", Keycode::ch('\u{7f}');
    End = 0x4D, "End", Keycode::sc(0x4D);
    PageDown = 0x4E, "PageDown", Keycode::sc(0x4E);
    Right = 0x4F, "Right", Keycode::sc(0x4F);
    Left = 0x50, "Left", Keycode::sc(0x50);
    Down = 0x51, "Down", Keycode::sc(0x51);
    Up = 0x52, "Up", Keycode::sc(0x52);
    NumLock = 0x53, "Numlock", Keycode::sc(0x53);
    KpDivide = 0x54, "Keypad /", Keycode::sc(0x54);
    KpMultiply = 0x55, "Keypad *", Keycode::sc(0x55);
    KpMinus = 0x56, "Keypad -", Keycode::sc(0x56);
    KpPlus = 0x57, "Keypad +", Keycode::sc(0x57);
    KpEnter = 0x58, "Keypad Enter", Keycode::sc(0x58);
    Kp1 = 0x59, "Keypad 1", Keycode::sc(0x59);
    Kp2 = 0x5A, "Keypad 2", Keycode::sc(0x5A);
    Kp3 = 0x5B, "Keypad 3", Keycode::sc(0x5B);
    Kp4 = 0x5C, "Keypad 4", Keycode::sc(0x5C);
    Kp5 = 0x5D, "Keypad 5", Keycode::sc(0x5D);
    Kp6 = 0x5E, "Keypad 6", Keycode::sc(0x5E);
    Kp7 = 0x5F, "Keypad 7", Keycode::sc(0x5F);
    Kp8 = 0x60, "Keypad 8", Keycode::sc(0x60);
    Kp9 = 0x61, "Keypad 9", Keycode::sc(0x61);
    Kp0 = 0x62, "Keypad 0", Keycode::sc(0x62);
    KpPeriod = 0x63, "Keypad .", Keycode::sc(0x63);
    NonUsBackslash = 0x64, "NonUsBackslash", Keycode::sc(0x64);
    Application = 0x65, "Application", Keycode::sc(0x65);
    Mute = 0x7F, "Mute", Keycode::sc(0x7F);
    VolumeUp = 0x80, "VolumeUp", Keycode::sc(0x80);
    VolumeDown = 0x81, "VolumeDown", Keycode::sc(0x81);
    LeftCtrl = 0xE0, "Left Ctrl", Keycode::sc(0xE0);
    LeftShift = 0xE1, "Left Shift", Keycode::sc(0xE1);
    LeftAlt = 0xE2, "Left Alt", Keycode::sc(0xE2);
    LeftGui = 0xE3, "Left GUI", Keycode::sc(0xE3);
    RightCtrl = 0xE4, "Right Ctrl", Keycode::sc(0xE4);
    RightShift = 0xE5, "Right Shift", Keycode::sc(0xE5);
    RightAlt = 0xE6, "Right Alt", Keycode::sc(0xE6);
    RightGui = 0xE7, "Right GUI", Keycode::sc(0xE7);
    Mode = 0x101, "ModeSwitch", Keycode::sc(0x101);
}

impl Scancode {
    /// Returns the raw usage id.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Looks a scancode up by its [`name`](Self::name), ignoring ASCII case.
    pub fn from_name(name: &str) -> Self {
        if name.is_empty() {
            return Scancode::Unknown;
        }
        (0..SCANCODE_SLOTS as u16)
            .map(Scancode::from_u16)
            .find(|sc| *sc != Scancode::Unknown && sc.name().eq_ignore_ascii_case(name))
            .unwrap_or(Scancode::Unknown)
    }

    /// Returns `true` for keys that contribute to the modifier state.
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            Scancode::LeftCtrl
                | Scancode::RightCtrl
                | Scancode::LeftShift
                | Scancode::RightShift
                | Scancode::LeftAlt
                | Scancode::RightAlt
                | Scancode::LeftGui
                | Scancode::RightGui
                | Scancode::Mode
                | Scancode::CapsLock
                | Scancode::NumLock
                | Scancode::ScrollLock
        )
    }
}
