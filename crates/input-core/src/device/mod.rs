//! Device identity and bookkeeping shared by every device class.
//!
//! - [`guid`]        – [`DeviceGuid`], the 16-byte model identity.
//! - [`instance_id`] – [`InstanceId`] and its monotonic allocator.
//! - [`registry`]    – [`DeviceRegistry`], the arena of device records.

pub mod guid;
pub mod instance_id;
pub mod registry;

pub use guid::{BusIdentity, DeviceGuid, GuidParseError, GUID_HEX_LEN};
pub use instance_id::{InstanceId, InstanceIdAllocator};
pub use registry::{DeviceHandle, DeviceRecord, DeviceRegistry};
