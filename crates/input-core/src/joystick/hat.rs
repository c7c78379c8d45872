//! Hat switch positions and the quantizers that produce them.
//!
//! # What is a hat? (for beginners)
//!
//! A hat (or POV switch) is the small eight-way rocker found on flight sticks
//! and the d-pad of many gamepads.  It reports one of nine discrete states:
//! centered, the four cardinal directions and the four diagonals.  The core
//! represents those states as a [`HatPosition`] bitset where a diagonal is
//! simply two cardinal bits set together (`UP | RIGHT`).
//!
//! Hardware delivers hats in three different shapes:
//!
//! - **Two axes** – some drivers expose a hat as an X/Y pair of analogue
//!   values.  [`HatState`] quantizes each axis to -1/0/+1 around its midpoint.
//! - **Logical index** – HID hats report `min..=max` where each step is a
//!   direction clockwise from up.  See [`HatPosition::from_logical`].
//! - **Angle** – DirectInput style POVs report hundredths of a degree
//!   clockwise from north.  See [`HatPosition::from_angle`].
//!
//! A producer declares the shape once per device with a [`HatEncoding`] and
//! then reports raw values.  The joystick subsystem does the quantizing.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Hat direction bitset.  An empty set means centered.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct HatPosition: u8 {
        const UP = 0x01;
        const RIGHT = 0x02;
        const DOWN = 0x04;
        const LEFT = 0x08;
    }
}

/// The eight directions in clockwise order, starting at north.
const CLOCKWISE: [HatPosition; 8] = [
    HatPosition::UP,
    HatPosition::RIGHT_UP,
    HatPosition::RIGHT,
    HatPosition::RIGHT_DOWN,
    HatPosition::DOWN,
    HatPosition::LEFT_DOWN,
    HatPosition::LEFT,
    HatPosition::LEFT_UP,
];

/// Raw angle value meaning "no direction pressed".
pub const ANGLE_CENTERED: u32 = 0xFFFF;

impl HatPosition {
    pub const CENTERED: HatPosition = HatPosition::empty();
    pub const RIGHT_UP: HatPosition = HatPosition::RIGHT.union(HatPosition::UP);
    pub const RIGHT_DOWN: HatPosition = HatPosition::RIGHT.union(HatPosition::DOWN);
    pub const LEFT_UP: HatPosition = HatPosition::LEFT.union(HatPosition::UP);
    pub const LEFT_DOWN: HatPosition = HatPosition::LEFT.union(HatPosition::DOWN);

    pub fn is_centered(self) -> bool {
        self.is_empty()
    }

    /// `false` for bitsets no physical hat can produce, such as `UP | DOWN`.
    pub fn is_valid(self) -> bool {
        !self.contains(HatPosition::UP | HatPosition::DOWN)
            && !self.contains(HatPosition::LEFT | HatPosition::RIGHT)
    }

    /// Accepts a raw direction bitset only if it is one of the nine states.
    pub fn from_valid_bits(bits: u8) -> Option<HatPosition> {
        HatPosition::from_bits(bits).filter(|pos| pos.is_valid())
    }

    /// Converts a HID logical hat value in `min..=max` to a position.
    ///
    /// An eight-step range maps one step per direction.  A four-step range
    /// covers only the cardinals, so each step is doubled.  Any other range
    /// size, and any value outside the range (the "null state" many hats
    /// report when released), yields [`HatPosition::CENTERED`].
    pub fn from_logical(value: i32, min: i32, max: i32) -> HatPosition {
        let range = i64::from(max) - i64::from(min) + 1;
        let mut step = i64::from(value) - i64::from(min);
        match range {
            4 => step *= 2,
            8 => {}
            _ => return HatPosition::CENTERED,
        }
        usize::try_from(step)
            .ok()
            .and_then(|i| CLOCKWISE.get(i).copied())
            .unwrap_or(HatPosition::CENTERED)
    }

    /// Converts a POV angle in hundredths of a degree to a position.
    ///
    /// The angle is rounded to the nearest 45° sector.  A low word of
    /// `0xFFFF` means centered.
    pub fn from_angle(hundredths: u32) -> HatPosition {
        if hundredths & 0xFFFF == ANGLE_CENTERED {
            return HatPosition::CENTERED;
        }
        let sector = (hundredths.wrapping_add(4500 / 2) % 36000) / 4500;
        CLOCKWISE
            .get(sector as usize)
            .copied()
            .unwrap_or(HatPosition::CENTERED)
    }

    /// Short human-readable label, for logs and the monitor.
    pub fn label(self) -> &'static str {
        match self.bits() {
            0x00 => "centered",
            0x01 => "up",
            0x03 => "right-up",
            0x02 => "right",
            0x06 => "right-down",
            0x04 => "down",
            0x0C => "left-down",
            0x08 => "left",
            0x09 => "left-up",
            _ => "invalid",
        }
    }
}

/// How a device's raw hat reports are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HatEncoding {
    /// The raw value is a [`HatPosition`] bitset.
    #[default]
    Bitmask,
    /// HID logical index in `min..=max`, clockwise from up.
    Logical { min: i32, max: i32 },
    /// Hundredths of a degree clockwise from north.
    Angle,
    /// Two analogue axes per hat, reported one axis at a time.
    Axes { min: i32, max: i32 },
}

impl HatEncoding {
    /// Decodes a single raw hat value.
    ///
    /// Returns `None` when the value cannot be one of the nine states, and
    /// always for [`HatEncoding::Axes`], whose hats are fed per axis through
    /// [`HatState::update_axis`].
    pub fn decode(self, raw: i32) -> Option<HatPosition> {
        match self {
            HatEncoding::Bitmask => u8::try_from(raw).ok().and_then(HatPosition::from_valid_bits),
            HatEncoding::Logical { min, max } => Some(HatPosition::from_logical(raw, min, max)),
            // Negative raw values wrap onto the 0xFFFF.. sentinel.
            HatEncoding::Angle => Some(HatPosition::from_angle(raw as u32)),
            HatEncoding::Axes { .. } => None,
        }
    }
}

/// Two-axis quantized hat, each axis in `{-1, 0, +1}`.
///
/// `x` is negative for left, `y` is negative for up (screen orientation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HatState {
    pub x: i8,
    pub y: i8,
}

impl HatState {
    /// Quantizes one raw axis against the device's reported `min`/`max`.
    ///
    /// Values within a quarter of the range around the midpoint are neutral.
    pub fn quantize(value: i32, min: i32, max: i32) -> i8 {
        let (min, max) = (i64::from(min.min(max)), i64::from(min.max(max)));
        let value = i64::from(value);
        let center = (min + max) / 2;
        let threshold = (max - min) / 4;
        if value < center - threshold {
            -1
        } else if value > center + threshold {
            1
        } else {
            0
        }
    }

    /// Builds a state from a raw X/Y pair sharing one range.
    pub fn from_axes(x: i32, y: i32, min: i32, max: i32) -> Self {
        Self {
            x: Self::quantize(x, min, max),
            y: Self::quantize(y, min, max),
        }
    }

    /// Updates one axis in place and returns the recomputed position.
    pub fn update_axis(&mut self, horizontal: bool, value: i32, min: i32, max: i32) -> HatPosition {
        let q = Self::quantize(value, min, max);
        if horizontal {
            self.x = q;
        } else {
            self.y = q;
        }
        self.position()
    }

    pub fn position(self) -> HatPosition {
        let mut pos = HatPosition::CENTERED;
        match self.x {
            x if x < 0 => pos |= HatPosition::LEFT,
            x if x > 0 => pos |= HatPosition::RIGHT,
            _ => {}
        }
        match self.y {
            y if y < 0 => pos |= HatPosition::UP,
            y if y > 0 => pos |= HatPosition::DOWN,
            _ => {}
        }
        pos
    }
}
