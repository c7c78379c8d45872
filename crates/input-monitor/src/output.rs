//! Rendering of events for the terminal.
//!
//! `text` prints one aligned human-readable line per event; `json` prints the
//! serde representation of the event, one object per line, for piping into
//! other tools.

use input_core::{EventPayload, InputEvent};
use serde::{Deserialize, Serialize};

/// How each event is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Renders one event as a single line without the trailing newline.
pub fn render(event: &InputEvent, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(format!(
            "{:>8}ms  {:<26} {}",
            event.timestamp_ms,
            format!("{:?}", event.kind()),
            describe(&event.payload)
        )),
        OutputFormat::Json => serde_json::to_string(event),
    }
}

/// Short field summary of a payload.
pub fn describe(payload: &EventPayload) -> String {
    match payload {
        EventPayload::Quit => String::new(),
        EventPayload::Window { window, event } => format!("window={} {event:?}", window.0),
        EventPayload::SysWm { message, .. } => {
            format!("subsystem={} bytes={}", message.subsystem, message.data.len())
        }
        EventPayload::KeyDown(e) | EventPayload::KeyUp(e) => format!(
            "kbd={} key={} mods={:?}{}",
            e.device,
            e.scancode.name(),
            e.modifiers,
            if e.repeat { " repeat" } else { "" }
        ),
        EventPayload::TextInput(e) => format!("text={:?}", e.text.as_str()),
        EventPayload::TextEditing(e) => {
            format!("text={:?} start={} length={}", e.text.as_str(), e.start, e.length)
        }
        EventPayload::MouseMotion(e) => {
            format!("mouse={} pos=({}, {}) rel=({}, {})", e.device, e.x, e.y, e.xrel, e.yrel)
        }
        EventPayload::MouseButtonDown(e) | EventPayload::MouseButtonUp(e) => format!(
            "mouse={} button={} clicks={} pos=({}, {})",
            e.device, e.button.0, e.clicks, e.x, e.y
        ),
        EventPayload::MouseWheel(e) => format!("mouse={} wheel=({}, {})", e.device, e.x, e.y),
        EventPayload::JoyAxisMotion(e) => format!("joy={} axis={} value={}", e.which, e.axis, e.value),
        EventPayload::JoyBallMotion(e) => {
            format!("joy={} ball={} rel=({}, {})", e.which, e.ball, e.xrel, e.yrel)
        }
        EventPayload::JoyHatMotion(e) => format!("joy={} hat={} {}", e.which, e.hat, e.value.label()),
        EventPayload::JoyButtonDown(e) | EventPayload::JoyButtonUp(e) => {
            format!("joy={} button={}", e.which, e.button)
        }
        EventPayload::ControllerAxisMotion(e) => {
            format!("pad={} {}={}", e.which, e.axis.name(), e.value)
        }
        EventPayload::ControllerButtonDown(e) | EventPayload::ControllerButtonUp(e) => {
            format!("pad={} {}", e.which, e.button.name())
        }
        EventPayload::JoyDeviceAdded(e)
        | EventPayload::JoyDeviceRemoved(e)
        | EventPayload::ControllerDeviceAdded(e)
        | EventPayload::ControllerDeviceRemoved(e)
        | EventPayload::ControllerDeviceRemapped(e) => format!("instance={}", e.which),
        EventPayload::User(e) => format!("code={} data=({}, {})", e.code, e.data1, e.data2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use input_core::events::{ControllerButtonEvent, JoyHatEvent};
    use input_core::{ControllerButton, HatPosition, InstanceId};

    #[test]
    fn test_text_line_names_kind_and_fields() {
        // Arrange
        let mut event = InputEvent::new(EventPayload::ControllerButtonDown(ControllerButtonEvent {
            which: InstanceId(3),
            button: ControllerButton::A,
        }));
        event.timestamp_ms = 42;

        // Act
        let line = render(&event, OutputFormat::Text).unwrap();

        // Assert
        assert!(line.starts_with("      42ms  ControllerButtonDown"));
        assert!(line.ends_with("pad=#3 a"));
    }

    #[test]
    fn test_json_line_is_parseable_event() {
        let event = InputEvent::new(EventPayload::JoyHatMotion(JoyHatEvent {
            which: InstanceId(1),
            hat: 0,
            value: HatPosition::LEFT_UP,
        }));

        let line = render(&event, OutputFormat::Json).unwrap();
        let back: InputEvent = serde_json::from_str(&line).unwrap();

        assert_eq!(back, event);
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_user_event_description() {
        assert_eq!(describe(&InputEvent::user(7, 1, -1).payload), "code=7 data=(1, -1)");
    }
}
