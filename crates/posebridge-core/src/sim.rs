//! In-memory runtime
//!
//! Stands in for the hardware SDK in tests and when the daemon runs without a
//! linked runtime. Devices, action bindings and button states are mutated
//! directly; a scene can also be loaded from a TOML file.

use serde::Deserialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::pose::{
    matrix_from_parts, DeviceIndex, DevicePose, Quat, TrackingResult, Universe, Vec3,
};
use crate::roles::Role;
use crate::runtime::{
    ActionHandle, ActionSetHandle, DeviceProperty, DigitalActionData, OriginHandle,
    PoseActionData, Runtime, RuntimeError, RuntimeEvent, MAX_DEVICE_COUNT,
};

/// Base value for simulated origin handles
const ORIGIN_BASE: u64 = 0x1_0000;

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Device index {0} declared twice")]
    DuplicateDevice(u32),
    #[error("Device index {0} outside the device table")]
    IndexOutOfRange(u32),
}

/// A device in the simulated device table
#[derive(Debug, Clone, Default)]
pub struct SimDevice {
    pub pose: DevicePose,
    pub properties: HashMap<DeviceProperty, String>,
}

impl SimDevice {
    pub fn new(pose: DevicePose) -> Self {
        Self {
            pose,
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, property: DeviceProperty, value: &str) -> Self {
        self.properties.insert(property, value.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct DigitalSnapshot {
    state: bool,
    changed: bool,
}

/// Simulated tracking runtime
#[derive(Debug, Default)]
pub struct SimRuntime {
    devices: HashMap<DeviceIndex, SimDevice>,
    manifest: Option<String>,
    action_sets: HashMap<String, ActionSetHandle>,
    actions: HashMap<String, ActionHandle>,
    action_paths: HashMap<ActionHandle, String>,
    pose_bindings: HashMap<String, DeviceIndex>,
    failing_actions: HashSet<String>,
    buttons: HashMap<String, bool>,
    snapshot: HashMap<String, DigitalSnapshot>,
    events: VecDeque<RuntimeEvent>,
    next_handle: u64,
}

impl SimRuntime {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            ..Self::default()
        }
    }

    /// Origin handle the simulator reports for a device
    pub fn origin_for(index: DeviceIndex) -> OriginHandle {
        OriginHandle(ORIGIN_BASE + index.0 as u64)
    }

    /// Devices beyond the table size are ignored
    pub fn add_device(&mut self, index: DeviceIndex, device: SimDevice) {
        if index.0 as usize >= MAX_DEVICE_COUNT {
            warn!(device = %index, "Device index outside the device table, ignoring");
            return;
        }
        self.devices.insert(index, device);
    }

    /// Drop a device from the table; its origin stops resolving
    pub fn remove_device(&mut self, index: DeviceIndex) -> Option<SimDevice> {
        self.devices.remove(&index)
    }

    pub fn set_pose(&mut self, index: DeviceIndex, pose: DevicePose) {
        if let Some(device) = self.devices.get_mut(&index) {
            device.pose = pose;
        }
    }

    /// Make a pose action report `index` as its active origin
    pub fn bind(&mut self, action_path: &str, index: DeviceIndex) {
        self.pose_bindings.insert(action_path.to_string(), index);
    }

    pub fn unbind(&mut self, action_path: &str) {
        self.pose_bindings.remove(action_path);
    }

    /// Make queries for an action fail until cleared
    pub fn set_action_failing(&mut self, action_path: &str, failing: bool) {
        if failing {
            self.failing_actions.insert(action_path.to_string());
        } else {
            self.failing_actions.remove(action_path);
        }
    }

    /// Set a button's state, visible after the next action-state update
    pub fn set_button(&mut self, action_path: &str, pressed: bool) {
        self.buttons.insert(action_path.to_string(), pressed);
    }

    pub fn push_event(&mut self, event: RuntimeEvent) {
        self.events.push_back(event);
    }

    pub fn manifest(&self) -> Option<&str> {
        self.manifest.as_deref()
    }

    fn allocate(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn path_of(&self, action: ActionHandle) -> Result<&str, RuntimeError> {
        self.action_paths
            .get(&action)
            .map(String::as_str)
            .ok_or(RuntimeError::InvalidHandle)
    }

    /// Load a scene description from a TOML file
    pub fn from_scene_file(path: &Path) -> Result<Self, SceneError> {
        let content = std::fs::read_to_string(path)?;
        let runtime = Self::from_scene_toml(&content)?;
        info!(path = %path.display(), devices = runtime.devices.len(), "Loaded simulated scene");
        Ok(runtime)
    }

    pub fn from_scene_toml(content: &str) -> Result<Self, SceneError> {
        let scene: Scene = toml::from_str(content)?;
        let mut runtime = Self::new();

        for entry in scene.device {
            let index = DeviceIndex(entry.index);
            if entry.index as usize >= MAX_DEVICE_COUNT {
                return Err(SceneError::IndexOutOfRange(entry.index));
            }
            if runtime.devices.contains_key(&index) {
                return Err(SceneError::DuplicateDevice(entry.index));
            }

            let pose = DevicePose {
                device_to_absolute: matrix_from_parts(
                    Vec3::new(entry.position[0], entry.position[1], entry.position[2]),
                    Quat::new(
                        entry.rotation[0],
                        entry.rotation[1],
                        entry.rotation[2],
                        entry.rotation[3],
                    ),
                ),
                tracking_result: entry.tracking_result,
                pose_is_valid: entry.valid,
                device_is_connected: entry.connected,
            };

            let mut device = SimDevice::new(pose);
            let properties = [
                (DeviceProperty::TrackingSystemName, entry.tracking_system),
                (DeviceProperty::ControllerType, entry.controller_type),
                (DeviceProperty::SerialNumber, entry.serial),
            ];
            for (property, value) in properties {
                if let Some(value) = value {
                    device.properties.insert(property, value);
                }
            }

            runtime.add_device(index, device);
            if let Some(role) = entry.role {
                runtime.bind(role.action_path(), index);
            }
        }

        Ok(runtime)
    }
}

#[derive(Debug, Deserialize)]
struct Scene {
    #[serde(default)]
    device: Vec<SceneDevice>,
}

#[derive(Debug, Deserialize)]
struct SceneDevice {
    index: u32,
    role: Option<Role>,
    tracking_system: Option<String>,
    controller_type: Option<String>,
    serial: Option<String>,
    #[serde(default)]
    position: [f32; 3],
    #[serde(default = "identity_rotation")]
    rotation: [f32; 4],
    #[serde(default = "default_true")]
    valid: bool,
    #[serde(default = "default_true")]
    connected: bool,
    #[serde(default)]
    tracking_result: TrackingResult,
}

fn identity_rotation() -> [f32; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

fn default_true() -> bool {
    true
}

impl Runtime for SimRuntime {
    fn set_action_manifest(&mut self, path: &str) -> Result<(), RuntimeError> {
        if path.is_empty() {
            return Err(RuntimeError::ManifestRejected("empty manifest path".to_string()));
        }
        self.manifest = Some(path.to_string());
        Ok(())
    }

    fn action_set_handle(&mut self, path: &str) -> Result<ActionSetHandle, RuntimeError> {
        if self.manifest.is_none() || !path.starts_with("/actions/") {
            return Err(RuntimeError::ActionSetNotFound(path.to_string()));
        }
        if let Some(handle) = self.action_sets.get(path) {
            return Ok(*handle);
        }
        let handle = ActionSetHandle(self.allocate());
        self.action_sets.insert(path.to_string(), handle);
        Ok(handle)
    }

    fn action_handle(&mut self, path: &str) -> Result<ActionHandle, RuntimeError> {
        if self.manifest.is_none() || !path.starts_with("/actions/") || !path.contains("/in/") {
            return Err(RuntimeError::ActionNotFound(path.to_string()));
        }
        if let Some(handle) = self.actions.get(path) {
            return Ok(*handle);
        }
        let handle = ActionHandle(self.allocate());
        self.actions.insert(path.to_string(), handle);
        self.action_paths.insert(handle, path.to_string());
        Ok(handle)
    }

    fn update_action_state(&mut self, set: ActionSetHandle) -> Result<(), RuntimeError> {
        if !self.action_sets.values().any(|&h| h == set) {
            return Err(RuntimeError::InvalidHandle);
        }

        for (path, &pressed) in &self.buttons {
            let previous = self.snapshot.get(path).copied().unwrap_or_default();
            self.snapshot.insert(
                path.clone(),
                DigitalSnapshot {
                    state: pressed,
                    changed: pressed != previous.state,
                },
            );
        }
        Ok(())
    }

    fn pose_action(
        &self,
        action: ActionHandle,
        _universe: Universe,
    ) -> Result<PoseActionData, RuntimeError> {
        let path = self.path_of(action)?;
        if self.failing_actions.contains(path) {
            return Err(RuntimeError::NoData);
        }

        let bound = self
            .pose_bindings
            .get(path)
            .and_then(|index| self.devices.get(index).map(|device| (*index, device)));

        Ok(match bound {
            Some((index, device)) => PoseActionData {
                active: true,
                active_origin: Self::origin_for(index),
                pose: device.pose,
            },
            None => PoseActionData::inactive(),
        })
    }

    fn resolve_origin(&self, origin: OriginHandle) -> Result<DeviceIndex, RuntimeError> {
        let raw = origin
            .0
            .checked_sub(ORIGIN_BASE)
            .and_then(|i| u32::try_from(i).ok())
            .ok_or(RuntimeError::InvalidOrigin(origin))?;
        let index = DeviceIndex(raw);
        if self.devices.contains_key(&index) {
            Ok(index)
        } else {
            Err(RuntimeError::InvalidOrigin(origin))
        }
    }

    fn device_poses(&self, _universe: Universe) -> Vec<DevicePose> {
        let mut poses = vec![DevicePose::disconnected(); MAX_DEVICE_COUNT];
        for (index, device) in &self.devices {
            if let Some(slot) = poses.get_mut(index.0 as usize) {
                *slot = device.pose;
            }
        }
        poses
    }

    fn string_property(
        &self,
        index: DeviceIndex,
        property: DeviceProperty,
    ) -> Result<String, RuntimeError> {
        let device = self
            .devices
            .get(&index)
            .ok_or(RuntimeError::UnknownDevice(index))?;
        device
            .properties
            .get(&property)
            .cloned()
            .ok_or(RuntimeError::PropertyUnavailable { index, property })
    }

    fn digital_action(&self, action: ActionHandle) -> Result<DigitalActionData, RuntimeError> {
        let path = self.path_of(action)?;
        if self.failing_actions.contains(path) {
            return Err(RuntimeError::NoData);
        }
        let snapshot = self.snapshot.get(path).copied().unwrap_or_default();
        Ok(DigitalActionData {
            active: true,
            state: snapshot.state,
            changed: snapshot.changed,
        })
    }

    fn poll_event(&mut self) -> Option<RuntimeEvent> {
        let event = self.events.pop_front();
        if let Some(event) = &event {
            debug!(event = ?event, "Simulated runtime event");
        }
        event
    }
}
