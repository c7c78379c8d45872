//! Generic device list with stable handles and focus tracking.
//!
//! Keyboards, mice and joysticks all keep a list of device records that grows
//! and shrinks as hardware is plugged in and out.  [`DeviceRegistry`] stores
//! those records in an arena: each record lives in a slot addressed by a
//! [`DeviceHandle`], and a removed record's slot is recycled with a bumped
//! generation, so a handle kept across a hotplug can only ever miss, never
//! alias a different device.
//!
//! Records also remember which window, if any, the device is focused on.  The
//! keyboard and mouse layers use [`DeviceRegistry::any_other_focused`] to decide
//! whether a focus change on one device is also a focus change for the window
//! as a whole.

use crate::events::WindowId;

use super::InstanceId;

/// Stable reference to one device record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    index: usize,
    generation: u32,
}

/// One device and its class-specific state.
#[derive(Debug, Clone)]
pub struct DeviceRecord<T> {
    pub instance_id: InstanceId,
    pub name: String,
    pub focus: Option<WindowId>,
    pub state: T,
}

impl<T> DeviceRecord<T> {
    pub fn new(instance_id: InstanceId, name: impl Into<String>, state: T) -> Self {
        Self {
            instance_id,
            name: name.into(),
            focus: None,
            state,
        }
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    record: Option<DeviceRecord<T>>,
}

/// Arena of device records, iterated in insertion order.
#[derive(Debug)]
pub struct DeviceRegistry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    order: Vec<DeviceHandle>,
}

impl<T> DeviceRegistry<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Adds a record at the end of the list.
    pub fn insert(&mut self, record: DeviceRecord<T>) -> DeviceHandle {
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.record = Some(record);
                DeviceHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    record: Some(record),
                });
                DeviceHandle {
                    index: self.slots.len() - 1,
                    generation: 0,
                }
            }
        };
        self.order.push(handle);
        handle
    }

    /// Removes a record.  Later records shift down one position.
    pub fn remove(&mut self, handle: DeviceHandle) -> Option<DeviceRecord<T>> {
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        let record = slot.record.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.order.retain(|h| *h != handle);
        Some(record)
    }

    pub fn get(&self, handle: DeviceHandle) -> Option<&DeviceRecord<T>> {
        self.slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.record.as_ref())
    }

    pub fn get_mut(&mut self, handle: DeviceHandle) -> Option<&mut DeviceRecord<T>> {
        self.slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.record.as_mut())
    }

    /// Handle of the record at `position` in insertion order.
    pub fn nth(&self, position: usize) -> Option<DeviceHandle> {
        self.order.get(position).copied()
    }

    /// Position of `handle` in insertion order.
    pub fn position(&self, handle: DeviceHandle) -> Option<usize> {
        self.order.iter().position(|h| *h == handle)
    }

    pub fn find_by_instance(&self, id: InstanceId) -> Option<DeviceHandle> {
        self.iter()
            .find(|(_, record)| record.instance_id == id)
            .map(|(handle, _)| handle)
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (DeviceHandle, &DeviceRecord<T>)> + '_ {
        self.order
            .iter()
            .filter_map(move |h| self.get(*h).map(|record| (*h, record)))
    }

    pub fn handles(&self) -> Vec<DeviceHandle> {
        self.order.clone()
    }

    // ── Focus ────────────────────────────────────────────────────────────────

    pub fn focus(&self, handle: DeviceHandle) -> Option<WindowId> {
        self.get(handle).and_then(|record| record.focus)
    }

    /// Sets a device's focus and returns the previous value.
    pub fn set_focus(&mut self, handle: DeviceHandle, window: Option<WindowId>) -> Option<WindowId> {
        self.get_mut(handle)
            .and_then(|record| std::mem::replace(&mut record.focus, window))
    }

    /// Returns `true` if some device other than `except` is focused on `window`.
    pub fn any_other_focused(&self, window: WindowId, except: DeviceHandle) -> bool {
        self.iter()
            .any(|(handle, record)| handle != except && record.focus == Some(window))
    }

    /// Focus of the first device that has one.
    pub fn any_focus(&self) -> Option<WindowId> {
        self.iter().find_map(|(_, record)| record.focus)
    }
}

impl<T> Default for DeviceRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
