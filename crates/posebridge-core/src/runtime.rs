//! Runtime collaborator: device poses and input actions

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pose::{DeviceIndex, DevicePose, Universe};

/// Handle to an input action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionHandle(pub u64);

/// Handle to an action set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionSetHandle(pub u64);

/// Size of the runtime's device table; valid indices are below this
pub const MAX_DEVICE_COUNT: usize = 64;

/// Opaque token naming the input source currently driving an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginHandle(pub u64);

impl OriginHandle {
    pub const INVALID: OriginHandle = OriginHandle(0);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl std::fmt::Display for OriginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// String properties queried from a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceProperty {
    TrackingSystemName,
    ControllerType,
    SerialNumber,
}

impl std::fmt::Display for DeviceProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::TrackingSystemName => "TrackingSystemName",
            Self::ControllerType => "ControllerType",
            Self::SerialNumber => "SerialNumber",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Action not found: {0}")]
    ActionNotFound(String),
    #[error("Action set not found: {0}")]
    ActionSetNotFound(String),
    #[error("Action manifest rejected: {0}")]
    ManifestRejected(String),
    #[error("Invalid handle")]
    InvalidHandle,
    #[error("No data for action")]
    NoData,
    #[error("Origin {0} does not map to a device")]
    InvalidOrigin(OriginHandle),
    #[error("Unknown device index {0}")]
    UnknownDevice(DeviceIndex),
    #[error("Property {property} unavailable on device {index}")]
    PropertyUnavailable {
        index: DeviceIndex,
        property: DeviceProperty,
    },
    #[error("Runtime error: {0}")]
    Other(String),
}

/// Pose action state relative to now
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseActionData {
    pub active: bool,
    pub active_origin: OriginHandle,
    pub pose: DevicePose,
}

impl PoseActionData {
    pub fn inactive() -> Self {
        Self {
            active: false,
            active_origin: OriginHandle::INVALID,
            pose: DevicePose::disconnected(),
        }
    }
}

/// Digital (button) action state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DigitalActionData {
    pub active: bool,
    pub state: bool,
    /// State differs from the previous action-state update
    pub changed: bool,
}

/// Events surfaced by the runtime's event queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEvent {
    Quit,
    DeviceActivated(DeviceIndex),
    DeviceDeactivated(DeviceIndex),
    DeviceRoleChanged(DeviceIndex),
    DeviceUpdated(DeviceIndex),
    DashboardDeactivated,
    Other(u32),
}

/// Hardware/runtime provider
///
/// Every call returns immediately or fails fast with a [`RuntimeError`].
/// Queries take `&self`; only calls that advance runtime state need `&mut self`.
pub trait Runtime {
    /// Register the action manifest describing the actions below
    fn set_action_manifest(&mut self, path: &str) -> Result<(), RuntimeError>;

    fn action_set_handle(&mut self, path: &str) -> Result<ActionSetHandle, RuntimeError>;

    fn action_handle(&mut self, path: &str) -> Result<ActionHandle, RuntimeError>;

    /// Advance the action-state snapshot for every action in the set
    fn update_action_state(&mut self, set: ActionSetHandle) -> Result<(), RuntimeError>;

    fn pose_action(
        &self,
        action: ActionHandle,
        universe: Universe,
    ) -> Result<PoseActionData, RuntimeError>;

    fn resolve_origin(&self, origin: OriginHandle) -> Result<DeviceIndex, RuntimeError>;

    /// Poses for the whole device table, indexed by [`DeviceIndex`]
    /// ([`MAX_DEVICE_COUNT`] entries)
    fn device_poses(&self, universe: Universe) -> Vec<DevicePose>;

    fn string_property(
        &self,
        index: DeviceIndex,
        property: DeviceProperty,
    ) -> Result<String, RuntimeError>;

    fn digital_action(&self, action: ActionHandle) -> Result<DigitalActionData, RuntimeError>;

    fn poll_event(&mut self) -> Option<RuntimeEvent>;
}
