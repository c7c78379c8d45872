//! The set of known controller mappings, keyed by GUID.
//!
//! Mappings come from three places, loaded in this order so later sources
//! override earlier ones:
//!
//! 1. the built-in [`DEFAULT_MAPPINGS`],
//! 2. mapping files named in the configuration,
//! 3. an environment variable holding newline-separated records.
//!
//! Text sources are read line by line.  Blank lines and lines starting with
//! `#` are skipped.  A line whose `platform:` field names a different platform
//! is skipped too; a line without one applies everywhere.  A malformed line is
//! logged and skipped without affecting its neighbours.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::device::DeviceGuid;

use super::mapping::{ControllerMapping, MappingError, PLATFORM_FIELD};

/// Mappings compiled into the library.
pub const DEFAULT_MAPPINGS: &[&str] = &[
    "030000005e0400008e02000014010000,X360 Controller,a:b0,b:b1,back:b6,dpdown:h0.4,dpleft:h0.8,dpright:h0.2,dpup:h0.1,guide:b8,leftshoulder:b4,leftstick:b9,lefttrigger:a2,leftx:a0,lefty:a1,rightshoulder:b5,rightstick:b10,righttrigger:a5,rightx:a3,righty:a4,start:b7,x:b2,y:b3,",
    "030000004c0500006802000011010000,PS3 Controller,a:b14,b:b13,back:b0,dpdown:b6,dpleft:b7,dpright:b5,dpup:b4,guide:b16,leftshoulder:b10,leftstick:b1,lefttrigger:b8,leftx:a0,lefty:a1,rightshoulder:b11,rightstick:b2,righttrigger:b9,rightx:a2,righty:a3,start:b3,x:b15,y:b12,platform:Linux,",
    "030000006d0400001dc2000014400000,Logitech F310 Gamepad (XInput),a:b0,b:b1,back:b6,dpdown:h0.4,dpleft:h0.8,dpright:h0.2,dpup:h0.1,guide:b8,leftshoulder:b4,leftstick:b9,lefttrigger:a2,leftx:a0,lefty:a1,rightshoulder:b5,rightstick:b10,righttrigger:a5,rightx:a3,righty:a4,start:b7,x:b2,y:b3,platform:Linux,",
    "6d0419c2000000000000504944564944,Logitech F710 Gamepad,a:b1,b:b2,back:b8,dpdown:h0.4,dpleft:h0.8,dpright:h0.2,dpup:h0.1,leftshoulder:b4,leftstick:b10,lefttrigger:b6,leftx:a0,lefty:a1,rightshoulder:b5,rightstick:b11,righttrigger:b7,rightx:a2,righty:a3,start:b9,x:b0,y:b3,platform:Windows,",
];

/// Name of the running platform as written in `platform:` fields.
pub fn current_platform() -> &'static str {
    if cfg!(target_os = "windows") {
        "Windows"
    } else if cfg!(target_os = "macos") {
        "Mac OS X"
    } else if cfg!(target_os = "linux") {
        "Linux"
    } else if cfg!(target_os = "ios") {
        "iOS"
    } else if cfg!(target_os = "android") {
        "Android"
    } else {
        "Unknown"
    }
}

/// Outcome of adding a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingUpdate {
    Added,
    /// An existing mapping for the same GUID was replaced.
    Updated,
}

/// GUID-keyed mapping store.
#[derive(Debug, Clone, Default)]
pub struct MappingDatabase {
    mappings: HashMap<DeviceGuid, ControllerMapping>,
}

impl MappingDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// A database preloaded with [`DEFAULT_MAPPINGS`] for the running platform.
    pub fn with_defaults() -> Self {
        let mut db = Self::new();
        db.add_mappings_from_str(&DEFAULT_MAPPINGS.join("\n"));
        db
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Parses and stores one record, regardless of its platform qualifier.
    pub fn add_mapping(&mut self, record: &str) -> Result<MappingUpdate, MappingError> {
        Ok(self.insert(ControllerMapping::parse(record)?))
    }

    pub fn insert(&mut self, mapping: ControllerMapping) -> MappingUpdate {
        match self.mappings.insert(mapping.guid(), mapping) {
            Some(_) => MappingUpdate::Updated,
            None => MappingUpdate::Added,
        }
    }

    /// Stores every applicable record in `text`.  Returns how many were stored.
    pub fn add_mappings_from_str(&mut self, text: &str) -> usize {
        parse_records(text)
            .into_iter()
            .map(|mapping| self.insert(mapping))
            .count()
    }

    /// Reads a mapping file and stores its applicable records.
    pub fn add_mappings_from_file(&mut self, path: &Path) -> Result<usize, MappingError> {
        let text = std::fs::read_to_string(path).map_err(|source| MappingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let stored = self.add_mappings_from_str(&text);
        debug!(path = %path.display(), stored, "mapping file loaded");
        Ok(stored)
    }

    /// Loads records from the environment variable `var`, if it is set.
    pub fn load_env_overrides(&mut self, var: &str) -> usize {
        match std::env::var(var) {
            Ok(text) => {
                let stored = self.add_mappings_from_str(&text);
                debug!(var, stored, "mapping overrides loaded from environment");
                stored
            }
            Err(_) => 0,
        }
    }

    pub fn get(&self, guid: &DeviceGuid) -> Option<&ControllerMapping> {
        self.mappings.get(guid)
    }

    pub fn contains(&self, guid: &DeviceGuid) -> bool {
        self.mappings.contains_key(guid)
    }

    /// The record string for `guid`, as it would appear in a mapping file.
    pub fn mapping_string(&self, guid: &DeviceGuid) -> Option<String> {
        self.get(guid).map(ControllerMapping::to_record_string)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ControllerMapping> {
        self.mappings.values()
    }
}

/// Parses the applicable records of a multi-line text source.
///
/// Lines for other platforms are skipped silently; malformed lines are logged.
pub fn parse_records(text: &str) -> Vec<ControllerMapping> {
    let platform = current_platform();
    text.lines()
        .enumerate()
        .filter_map(|(n, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            if let Some(target) = platform_qualifier(line) {
                if !target.eq_ignore_ascii_case(platform) {
                    debug!(line = n + 1, target, "mapping for another platform skipped");
                    return None;
                }
            }
            match ControllerMapping::parse(line) {
                Ok(mapping) => Some(mapping),
                Err(err) => {
                    warn!(line = n + 1, error = %err, "skipping malformed controller mapping");
                    None
                }
            }
        })
        .collect()
}

/// Value of the `platform:` field of a raw record line, if present.
fn platform_qualifier(line: &str) -> Option<&str> {
    line.split(',').skip(2).find_map(|field| {
        let (key, value) = field.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(PLATFORM_FIELD)
            .then(|| value.trim())
    })
}
