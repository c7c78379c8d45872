//! Scripted device producer.
//!
//! Replays a fixed list of [`DeviceReport`]s, one every `interval`, as if a
//! platform producer were observing real hardware.  The clock starts at the
//! first poll, so registering the producer early does not skip steps.
//!
//! Scripts come either from [`demo_session`] or from a JSON-lines file where
//! each line is one serialized `DeviceReport`:
//!
//! ```text
//! {"report":"added","class":"keyboard","identity":{"name":"kbd"}}
//! {"report":"keyboard_focus","keyboard":0,"window":1}
//! {"report":"quit"}
//! ```

use std::path::Path;
use std::time::{Duration, Instant};

use input_core::{
    DeviceAnnouncement, DeviceGuid, DeviceIdentity, DeviceProducer, DeviceReport, HatEncoding, Scancode,
    WindowId,
};
use thiserror::Error;
use tracing::debug;

/// GUID of the pad used by the demo.  A built-in mapping exists for it.
pub const DEMO_PAD_GUID: &str = "030000005e0400008e02000014010000";

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("script line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// A [`DeviceProducer`] that replays a list of reports on a timer.
#[derive(Debug)]
pub struct ScriptedProducer {
    reports: Vec<DeviceReport>,
    interval: Duration,
    started: Option<Instant>,
    next: usize,
}

impl ScriptedProducer {
    pub fn new(reports: Vec<DeviceReport>, interval: Duration) -> Self {
        Self {
            reports,
            interval,
            started: None,
            next: 0,
        }
    }

    /// Parses a JSON-lines script.  Blank lines and lines starting with `#` are skipped.
    pub fn from_json_lines(text: &str, interval: Duration) -> Result<Self, ScriptError> {
        let mut reports = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let report = serde_json::from_str(line).map_err(|source| ScriptError::Parse {
                line: index + 1,
                source,
            })?;
            reports.push(report);
        }
        Ok(Self::new(reports, interval))
    }

    pub fn from_file(path: &Path, interval: Duration) -> Result<Self, ScriptError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_lines(&text, interval)
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// `true` once every report has been handed out.
    pub fn is_finished(&self) -> bool {
        self.next >= self.reports.len()
    }

    /// Reports due at `now`, given the clock started at `started`.
    fn due(&mut self, started: Instant, now: Instant) -> Vec<DeviceReport> {
        let elapsed = now.saturating_duration_since(started);
        let due = if self.interval.is_zero() {
            self.reports.len()
        } else {
            let steps = elapsed.as_nanos() / self.interval.as_nanos();
            usize::try_from(steps).unwrap_or(usize::MAX).saturating_add(1)
        };
        let end = due.min(self.reports.len());
        if end <= self.next {
            return Vec::new();
        }
        let batch = self.reports[self.next..end].to_vec();
        self.next = end;
        batch
    }
}

impl DeviceProducer for ScriptedProducer {
    fn name(&self) -> &str {
        "script"
    }

    fn poll_once(&mut self) -> Vec<DeviceReport> {
        let now = Instant::now();
        let started = *self.started.get_or_insert(now);
        let batch = self.due(started, now);
        if !batch.is_empty() {
            debug!(count = batch.len(), remaining = self.reports.len() - self.next, "script step");
        }
        batch
    }
}

/// A short controller session: a keyboard focuses window 1, a pad with a
/// logical hat is plugged in, its sticks, trigger, buttons and d-pad are
/// exercised, it is unplugged and the session quits.
pub fn demo_session() -> Vec<DeviceReport> {
    let pad = DeviceIdentity::new("Demo X360 Pad")
        .with_guid(DEMO_PAD_GUID.parse().unwrap_or(DeviceGuid::ZERO))
        .with_counts(6, 11, 1, 0)
        .with_hat_encoding(HatEncoding::Logical { min: 0, max: 7 })
        .with_path("/demo/js0");
    let window = WindowId(1);

    vec![
        DeviceReport::Added(DeviceAnnouncement::keyboard("Demo Keyboard")),
        DeviceReport::KeyboardFocus { keyboard: 0, window: Some(window) },
        DeviceReport::Added(DeviceAnnouncement::joystick(pad.clone())),
        DeviceReport::JoyAxis { device: 0, axis: 0, value: 16000 },
        DeviceReport::JoyAxis { device: 0, axis: 1, value: -12000 },
        DeviceReport::JoyAxis { device: 0, axis: 2, value: 32767 },
        DeviceReport::JoyButton { device: 0, button: 0, pressed: true },
        DeviceReport::JoyButton { device: 0, button: 0, pressed: false },
        // HID logical hat: 0 is up, 2 is right, 8 is the released null state.
        DeviceReport::JoyHat { device: 0, hat: 0, value: 0 },
        DeviceReport::JoyHat { device: 0, hat: 0, value: 2 },
        DeviceReport::JoyHat { device: 0, hat: 0, value: 8 },
        DeviceReport::Key { keyboard: 0, scancode: Scancode::KeyA, pressed: true },
        DeviceReport::Text { keyboard: 0, text: "a".to_string() },
        DeviceReport::Key { keyboard: 0, scancode: Scancode::KeyA, pressed: false },
        DeviceReport::Removed(DeviceAnnouncement::joystick(pad)),
        DeviceReport::Quit,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_poll_releases_first_step_only() {
        // Arrange
        let mut producer = ScriptedProducer::new(demo_session(), Duration::from_secs(60));

        // Act
        let first = producer.poll_once();

        // Assert
        assert_eq!(first.len(), 1);
        assert!(producer.poll_once().is_empty());
        assert!(!producer.is_finished());
    }

    #[test]
    fn test_elapsed_time_releases_due_steps_in_order() {
        let mut producer = ScriptedProducer::new(demo_session(), Duration::from_millis(10));
        let start = Instant::now();

        let batch = producer.due(start, start + Duration::from_millis(25));

        assert_eq!(batch.len(), 3);
        assert_eq!(batch[2], demo_session()[2]);
        assert_eq!(producer.due(start, start + Duration::from_millis(25)), Vec::new());
    }

    #[test]
    fn test_zero_interval_releases_everything() {
        let mut producer = ScriptedProducer::new(demo_session(), Duration::ZERO);
        assert_eq!(producer.poll_once().len(), demo_session().len());
        assert!(producer.is_finished());
    }

    #[test]
    fn test_json_lines_script_parses_reports() {
        // Arrange
        let text = r#"
# comment
{"report":"added","class":"keyboard","identity":{"name":"kbd"}}
{"report":"quit"}
"#;

        // Act
        let producer = ScriptedProducer::from_json_lines(text, Duration::ZERO).unwrap();

        // Assert
        assert_eq!(producer.len(), 2);
    }

    #[test]
    fn test_bad_json_line_reports_line_number() {
        let err = ScriptedProducer::from_json_lines("{\"report\":\"quit\"}\nnot json", Duration::ZERO).unwrap_err();
        assert!(matches!(err, ScriptError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_hat_reports_parse_with_raw_values() {
        let text = r#"{"report":"joy_hat","device":0,"hat":0,"value":4}
{"report":"joy_hat_axis","device":0,"hat":0,"horizontal":true,"value":-1}
{"report":"added","class":"joystick","identity":{"name":"pov","hats":1,"hat_encoding":{"kind":"logical","min":0,"max":7}}}"#;

        let producer = ScriptedProducer::from_json_lines(text, Duration::ZERO).unwrap();

        assert_eq!(producer.reports[0], DeviceReport::JoyHat { device: 0, hat: 0, value: 4 });
        let DeviceReport::Added(announcement) = &producer.reports[2] else {
            panic!("expected an announcement");
        };
        assert_eq!(announcement.identity.hat_encoding, HatEncoding::Logical { min: 0, max: 7 });
    }

    #[test]
    fn test_demo_pad_guid_parses() {
        assert!(DEMO_PAD_GUID.parse::<DeviceGuid>().is_ok());
    }
}
