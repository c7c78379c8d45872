//! Controller mapping records and their forward/reverse lookup tables.
//!
//! # The mapping record format (for beginners)
//!
//! A joystick only knows "axis 2" or "button 7".  A *game controller* is a
//! joystick whose raw controls have been given standard names, so a game can
//! ask for "the A button" regardless of which pad is plugged in.  The naming is
//! described by one line of text per controller model:
//!
//! ```text
//! 030000005e0400008e02000014010000,X360 Controller,a:b0,b:b1,leftx:a0,dpup:h0.1
//! └──────────── GUID ────────────┘ └─── name ───┘ └─────── bindings ──────────┘
//! ```
//!
//! Each binding is `abstract:raw` where `raw` is one of:
//!
//! | Raw      | Meaning                                  |
//! |----------|------------------------------------------|
//! | `a<N>`   | joystick axis N                          |
//! | `b<N>`   | joystick button N                        |
//! | `h<N>.<M>` | hat N, direction bit M (1, 2, 4 or 8)  |
//!
//! An abstract axis may be bound to a raw button (pressed = full deflection)
//! and an abstract button may be bound to a raw axis (pressed past half
//! deflection) or to one direction of a hat.  Hats cannot drive axes.
//!
//! # Forward and reverse tables
//!
//! [`ControllerMapping`] keeps two views of the same bindings: *forward*
//! answers "which raw control is the A button?" and is used by the getters;
//! *reverse* answers "raw button 0 just changed, which abstract control is
//! that?" and is used when translating events.  Both are written by the single
//! private `bind` method, so they can never disagree.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use enum_map::{Enum, EnumMap};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::{DeviceGuid, GuidParseError};
use crate::joystick::hat::HatPosition;

/// Raw axes and buttons at or above this index cannot be mapped.
pub const MAX_REVERSE_ENTRIES: usize = 20;
/// Number of hats that can carry button bindings.
pub const MAX_HATS: usize = 4;

/// Field name that carries a platform qualifier rather than a binding.
pub const PLATFORM_FIELD: &str = "platform";

const HAT_BITS: [HatPosition; 4] = [
    HatPosition::UP,
    HatPosition::RIGHT,
    HatPosition::DOWN,
    HatPosition::LEFT,
];

/// Errors produced while parsing a mapping record.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("mapping record has no GUID field")]
    MissingGuid,

    #[error("invalid GUID in mapping record: {0}")]
    InvalidGuid(#[from] GuidParseError),

    #[error("mapping record has no name field")]
    MissingName,

    #[error("binding {0:?} is not of the form name:binding")]
    MalformedField(String),

    #[error("unknown controller axis or button {0:?}")]
    UnknownName(String),

    #[error("unrecognised binding {0:?}")]
    InvalidBinding(String),

    #[error("raw {kind} index {index} exceeds the mapping limit of {MAX_REVERSE_ENTRIES}")]
    IndexOutOfRange { kind: &'static str, index: u32 },

    #[error("hat index {0} exceeds the mapping limit of {MAX_HATS}")]
    HatOutOfRange(u32),

    #[error("hat mask {0} is not a single direction bit")]
    InvalidHatMask(u32),

    #[error("hat binding cannot drive controller axis {0}")]
    HatAsAxis(ControllerAxis),

    #[error("cannot read mapping file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ── Abstract controls ─────────────────────────────────────────────────────────

macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $( $variant:ident => $text:literal, )* }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Enum, Serialize, Deserialize)]
        pub enum $name {
            $( $variant, )*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[ $( $name::$variant, )* ];

            /// Name used in mapping records.
            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => $text, )*
                }
            }

            /// Case-insensitive lookup by record name.
            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.name().eq_ignore_ascii_case(name))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

named_enum! {
    /// Standard controller axis.
    pub enum ControllerAxis {
        LeftX => "leftx",
        LeftY => "lefty",
        RightX => "rightx",
        RightY => "righty",
        TriggerLeft => "lefttrigger",
        TriggerRight => "righttrigger",
    }
}

named_enum! {
    /// Standard controller button.
    pub enum ControllerButton {
        A => "a",
        B => "b",
        X => "x",
        Y => "y",
        Back => "back",
        Guide => "guide",
        Start => "start",
        LeftStick => "leftstick",
        RightStick => "rightstick",
        LeftShoulder => "leftshoulder",
        RightShoulder => "rightshoulder",
        DpadUp => "dpup",
        DpadDown => "dpdown",
        DpadLeft => "dpleft",
        DpadRight => "dpright",
    }
}

impl ControllerAxis {
    /// Triggers report `0..=32767` instead of the full signed range.
    pub fn is_trigger(self) -> bool {
        matches!(self, ControllerAxis::TriggerLeft | ControllerAxis::TriggerRight)
    }
}

/// Rescales a raw `[-32768, 32767]` trigger reading to `[0, 32767]`.
pub fn rescale_trigger(raw: i16) -> i16 {
    ((i32::from(raw) + 32768) / 2) as i16
}

/// Either kind of abstract control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerInput {
    Axis(ControllerAxis),
    Button(ControllerButton),
}

impl ControllerInput {
    pub fn from_name(name: &str) -> Option<Self> {
        ControllerAxis::from_name(name)
            .map(ControllerInput::Axis)
            .or_else(|| ControllerButton::from_name(name).map(ControllerInput::Button))
    }

    pub fn name(self) -> &'static str {
        match self {
            ControllerInput::Axis(axis) => axis.name(),
            ControllerInput::Button(button) => button.name(),
        }
    }
}

// ── Raw bindings ──────────────────────────────────────────────────────────────

/// A raw joystick control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RawBinding {
    Axis(u8),
    Button(u8),
    Hat { hat: u8, mask: HatPosition },
}

impl fmt::Display for RawBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawBinding::Axis(n) => write!(f, "a{n}"),
            RawBinding::Button(n) => write!(f, "b{n}"),
            RawBinding::Hat { hat, mask } => write!(f, "h{hat}.{}", mask.bits()),
        }
    }
}

impl FromStr for RawBinding {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MappingError::InvalidBinding(s.to_owned());
        let mut chars = s.chars();
        let prefix = chars.next().ok_or_else(invalid)?;
        let rest = chars.as_str();
        let index = |digits: &str| digits.parse::<u32>().map_err(|_| invalid());
        let bounded = |kind: &'static str, n: u32| {
            if n as usize >= MAX_REVERSE_ENTRIES {
                Err(MappingError::IndexOutOfRange { kind, index: n })
            } else {
                Ok(n as u8)
            }
        };
        match prefix {
            'a' => Ok(RawBinding::Axis(bounded("axis", index(rest)?)?)),
            'b' => Ok(RawBinding::Button(bounded("button", index(rest)?)?)),
            'h' => {
                let (hat, mask) = rest.split_once('.').ok_or_else(invalid)?;
                let hat = index(hat)?;
                let mask = index(mask)?;
                if hat as usize >= MAX_HATS {
                    return Err(MappingError::HatOutOfRange(hat));
                }
                if mask > 0x0F || mask.count_ones() != 1 {
                    return Err(MappingError::InvalidHatMask(mask));
                }
                Ok(RawBinding::Hat {
                    hat: hat as u8,
                    mask: HatPosition::from_bits_retain(mask as u8),
                })
            }
            _ => Err(invalid()),
        }
    }
}

fn hat_bit_index(mask: HatPosition) -> Option<usize> {
    HAT_BITS.iter().position(|bit| *bit == mask)
}

// ── The mapping ───────────────────────────────────────────────────────────────

/// Forward and reverse binding tables for one controller model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerMapping {
    guid: DeviceGuid,
    name: String,
    platform: Option<String>,
    axes: EnumMap<ControllerAxis, Option<RawBinding>>,
    buttons: EnumMap<ControllerButton, Option<RawBinding>>,
    reverse_axes: [Option<ControllerInput>; MAX_REVERSE_ENTRIES],
    reverse_buttons: [Option<ControllerInput>; MAX_REVERSE_ENTRIES],
    reverse_hats: [[Option<ControllerButton>; 4]; MAX_HATS],
}

impl ControllerMapping {
    /// Creates a mapping with no bindings.
    pub fn empty(guid: DeviceGuid, name: impl Into<String>) -> Self {
        Self {
            guid,
            name: name.into(),
            platform: None,
            axes: EnumMap::default(),
            buttons: EnumMap::default(),
            reverse_axes: [None; MAX_REVERSE_ENTRIES],
            reverse_buttons: [None; MAX_REVERSE_ENTRIES],
            reverse_hats: [[None; 4]; MAX_HATS],
        }
    }

    /// Parses a full `guid,name,bindings...` record.
    pub fn parse(record: &str) -> Result<Self, MappingError> {
        let record = record.trim();
        let mut fields = record.splitn(3, ',');
        let guid = match fields.next().map(str::trim) {
            Some(g) if !g.is_empty() => g.parse::<DeviceGuid>()?,
            _ => return Err(MappingError::MissingGuid),
        };
        let name = fields.next().ok_or(MappingError::MissingName)?.trim();
        let bindings = fields.next().unwrap_or("");
        Self::from_parts(guid, name, bindings)
    }

    /// Builds a mapping from an already separated GUID, name and binding list.
    ///
    /// Either every binding is accepted or the whole record is rejected.
    pub fn from_parts(guid: DeviceGuid, name: &str, bindings: &str) -> Result<Self, MappingError> {
        let mut mapping = Self::empty(guid, name);
        for field in bindings.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            let (key, value) = field
                .split_once(':')
                .ok_or_else(|| MappingError::MalformedField(field.to_owned()))?;
            let (key, value) = (key.trim(), value.trim());
            if key.eq_ignore_ascii_case(PLATFORM_FIELD) {
                mapping.platform = Some(value.to_owned());
                continue;
            }
            let input =
                ControllerInput::from_name(key).ok_or_else(|| MappingError::UnknownName(key.to_owned()))?;
            let binding: RawBinding = value.parse()?;
            mapping.bind(input, binding)?;
        }
        Ok(mapping)
    }

    /// Binds `input` to `binding`, keeping both tables in step.
    fn bind(&mut self, input: ControllerInput, binding: RawBinding) -> Result<(), MappingError> {
        if let (ControllerInput::Axis(axis), RawBinding::Hat { .. }) = (input, binding) {
            return Err(MappingError::HatAsAxis(axis));
        }

        // Drop whatever `input` was bound to before.
        if let Some(stale) = self.forward(input) {
            self.clear_reverse(stale);
        }
        // Drop whichever input previously owned `binding`.
        if let Some(owner) = self.reverse(binding) {
            self.set_forward(owner, None);
        }

        self.set_forward(input, Some(binding));
        match binding {
            RawBinding::Axis(n) => self.reverse_axes[usize::from(n)] = Some(input),
            RawBinding::Button(n) => self.reverse_buttons[usize::from(n)] = Some(input),
            RawBinding::Hat { hat, mask } => {
                if let (ControllerInput::Button(button), Some(bit)) = (input, hat_bit_index(mask)) {
                    self.reverse_hats[usize::from(hat)][bit] = Some(button);
                }
            }
        }
        Ok(())
    }

    fn forward(&self, input: ControllerInput) -> Option<RawBinding> {
        match input {
            ControllerInput::Axis(axis) => self.axes[axis],
            ControllerInput::Button(button) => self.buttons[button],
        }
    }

    fn set_forward(&mut self, input: ControllerInput, binding: Option<RawBinding>) {
        match input {
            ControllerInput::Axis(axis) => self.axes[axis] = binding,
            ControllerInput::Button(button) => self.buttons[button] = binding,
        }
    }

    fn reverse(&self, binding: RawBinding) -> Option<ControllerInput> {
        match binding {
            RawBinding::Axis(n) => self.reverse_axis(n),
            RawBinding::Button(n) => self.reverse_button(n),
            RawBinding::Hat { hat, mask } => self.reverse_hat(hat, mask).map(ControllerInput::Button),
        }
    }

    fn clear_reverse(&mut self, binding: RawBinding) {
        match binding {
            RawBinding::Axis(n) => self.reverse_axes[usize::from(n)] = None,
            RawBinding::Button(n) => self.reverse_buttons[usize::from(n)] = None,
            RawBinding::Hat { hat, mask } => {
                if let Some(bit) = hat_bit_index(mask) {
                    self.reverse_hats[usize::from(hat)][bit] = None;
                }
            }
        }
    }

    // ── Lookups ──────────────────────────────────────────────────────────────

    pub fn guid(&self) -> DeviceGuid {
        self.guid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Platform qualifier carried by the record, if any.
    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    pub fn axis_binding(&self, axis: ControllerAxis) -> Option<RawBinding> {
        self.axes[axis]
    }

    pub fn button_binding(&self, button: ControllerButton) -> Option<RawBinding> {
        self.buttons[button]
    }

    /// Abstract control driven by raw axis `raw`.
    pub fn reverse_axis(&self, raw: u8) -> Option<ControllerInput> {
        self.reverse_axes.get(usize::from(raw)).copied().flatten()
    }

    /// Abstract control driven by raw button `raw`.
    pub fn reverse_button(&self, raw: u8) -> Option<ControllerInput> {
        self.reverse_buttons.get(usize::from(raw)).copied().flatten()
    }

    /// Abstract button driven by one direction bit of a hat.
    pub fn reverse_hat(&self, hat: u8, bit: HatPosition) -> Option<ControllerButton> {
        let bit = hat_bit_index(bit)?;
        self.reverse_hats.get(usize::from(hat))?[bit]
    }

    /// Serialises the mapping back to record form.
    pub fn to_record_string(&self) -> String {
        let mut out = format!("{},{}", self.guid, self.name);
        for (button, binding) in self.buttons.iter() {
            if let Some(binding) = binding {
                out.push_str(&format!(",{button}:{binding}"));
            }
        }
        for (axis, binding) in self.axes.iter() {
            if let Some(binding) = binding {
                out.push_str(&format!(",{axis}:{binding}"));
            }
        }
        if let Some(platform) = &self.platform {
            out.push_str(&format!(",{PLATFORM_FIELD}:{platform}"));
        }
        out
    }
}

impl FromStr for ControllerMapping {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
