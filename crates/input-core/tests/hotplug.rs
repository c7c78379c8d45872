//! Integration tests for joystick hotplug through `InputContext`.
//!
//! Devices are announced by a `MockProducer`, exactly as a platform producer
//! would, and the resulting events are read back through the public API.

use std::sync::Arc;

use input_core::events::{DeviceEvent, JoyAxisEvent};
use input_core::producer::MockProducerHandle;
use input_core::{
    CoreConfig, DeviceAnnouncement, DeviceIdentity, DeviceReport, EventKind, EventPayload,
    HeadlessBackend, InputContext, InputEvent, InstanceId, MockProducer,
};

fn setup() -> (InputContext, MockProducerHandle) {
    let config = CoreConfig {
        allow_background_joystick_events: true,
        ..CoreConfig::default()
    };
    let ctx = InputContext::new(config, Arc::new(HeadlessBackend::new())).expect("context must start");
    let (producer, handle) = MockProducer::new("hotplug");
    ctx.add_producer(Box::new(producer)).expect("producer must register");
    (ctx, handle)
}

fn stick(name: &str) -> DeviceIdentity {
    DeviceIdentity::new(name).with_counts(2, 4, 1, 0)
}

fn drain(ctx: &InputContext) -> Vec<InputEvent> {
    ctx.pump();
    ctx.get(usize::MAX, EventKind::ALL).expect("get must succeed")
}

fn added_id(events: &[InputEvent]) -> InstanceId {
    events
        .iter()
        .find_map(|e| match e.payload {
            EventPayload::JoyDeviceAdded(DeviceEvent { which }) => Some(which),
            _ => None,
        })
        .expect("a JoyDeviceAdded event")
}

#[test]
fn test_reannounced_device_gets_strictly_greater_instance_id() {
    // Arrange
    let (ctx, handle) = setup();
    handle.inject(DeviceReport::Added(DeviceAnnouncement::joystick(stick("Stick"))));
    let first = added_id(&drain(&ctx));

    // Act
    handle.inject(DeviceReport::Removed(DeviceAnnouncement::joystick(stick("Stick"))));
    handle.inject(DeviceReport::Added(DeviceAnnouncement::joystick(stick("Stick"))));
    let events = drain(&ctx);

    // Assert
    assert!(events
        .iter()
        .any(|e| e.payload == EventPayload::JoyDeviceRemoved(DeviceEvent { which: first })));
    let second = added_id(&events);
    assert!(second > first, "{second} must be greater than {first}");
}

#[test]
fn test_removed_but_open_device_reads_neutral() {
    // Arrange
    let (ctx, handle) = setup();
    handle.inject(DeviceReport::Added(DeviceAnnouncement::joystick(stick("Stick"))));
    drain(&ctx);
    let id = ctx.open_joystick(0).unwrap().expect("device 0 exists");
    handle.inject(DeviceReport::JoyAxis { device: 0, axis: 1, value: 12000 });
    handle.inject(DeviceReport::JoyButton { device: 0, button: 3, pressed: true });
    drain(&ctx);

    // Act
    handle.inject(DeviceReport::Removed(DeviceAnnouncement::joystick(stick("Stick"))));
    let events = drain(&ctx);

    // Assert: recentring precedes the removal notice
    let kinds: Vec<EventKind> = events.iter().map(InputEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::JoyAxisMotion, EventKind::JoyButtonUp, EventKind::JoyDeviceRemoved]
    );
    assert_eq!(
        events[0].payload,
        EventPayload::JoyAxisMotion(JoyAxisEvent { which: id, axis: 1, value: 0 })
    );
    ctx.joysticks(|j| {
        assert!(j.is_open(id));
        assert!(!j.is_attached(id));
        assert_eq!(j.axis(id, 1), 0);
        assert!(!j.button(id, 3));
        assert_eq!(j.device_count(), 0);
    })
    .unwrap();

    ctx.close_joystick(id).unwrap();
    assert!(!ctx.joysticks(|j| j.is_open(id)).unwrap());
}

#[test]
fn test_duplicate_axis_value_is_emitted_once() {
    let (ctx, handle) = setup();
    handle.inject(DeviceReport::Added(DeviceAnnouncement::joystick(stick("Stick"))));
    drain(&ctx);
    ctx.open_joystick(0).unwrap();

    handle.inject_all([
        DeviceReport::JoyAxis { device: 0, axis: 0, value: 500 },
        DeviceReport::JoyAxis { device: 0, axis: 0, value: 500 },
    ]);
    let events = drain(&ctx);

    assert_eq!(events.len(), 1);
}

#[test]
fn test_identical_models_are_told_apart_by_path() {
    // Arrange
    let (ctx, handle) = setup();
    handle.inject(DeviceReport::Added(DeviceAnnouncement::joystick(stick("Pad").with_path("/dev/input/js0"))));
    handle.inject(DeviceReport::Added(DeviceAnnouncement::joystick(stick("Pad").with_path("/dev/input/js1"))));
    let events = drain(&ctx);
    let ids: Vec<InstanceId> = events
        .iter()
        .filter_map(|e| match e.payload {
            EventPayload::JoyDeviceAdded(DeviceEvent { which }) => Some(which),
            _ => None,
        })
        .collect();

    // Act
    handle.inject(DeviceReport::Removed(DeviceAnnouncement::joystick(stick("Pad").with_path("/dev/input/js1"))));
    let events = drain(&ctx);

    // Assert
    assert_eq!(
        events,
        vec![InputEvent {
            timestamp_ms: events[0].timestamp_ms,
            payload: EventPayload::JoyDeviceRemoved(DeviceEvent { which: ids[1] }),
        }]
    );
    assert_eq!(ctx.joysticks(|j| j.attached_ids()).unwrap(), vec![ids[0]]);
}
