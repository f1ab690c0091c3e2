//! Slot resolution: which physical device backs each role
//!
//! The resolver follows the runtime's active origin for every role action,
//! resolves it to a device index, filters out this pipeline's own virtual
//! trackers and pushes new bindings into the matching [`TrackerState`].

use tracing::{debug, warn};

use crate::bridge::Bridge;
use crate::pose::{DeviceIndex, DevicePose, Universe};
use crate::roles::{Role, RoleMap};
use crate::runtime::{ActionHandle, ActionSetHandle, DeviceProperty, OriginHandle, Runtime};
use crate::tracker::TrackerState;

/// Driver identity of the trackers this pipeline publishes
pub const DEFAULT_SELF_TRACKING_SYSTEM: &str = "SlimeVR";

/// Currently resolved hardware origin for a role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceBinding {
    pub origin: OriginHandle,
    pub device: Option<DeviceIndex>,
}

impl Default for DeviceBinding {
    fn default() -> Self {
        Self {
            origin: OriginHandle::INVALID,
            device: None,
        }
    }
}

/// Keeps every role's [`DeviceBinding`] current
#[derive(Debug, Clone)]
pub struct SlotResolver {
    action_set: ActionSetHandle,
    actions: RoleMap<ActionHandle>,
    bindings: RoleMap<DeviceBinding>,
    /// Last origin found to be one of our own trackers, per role
    excluded: RoleMap<OriginHandle>,
    universe: Universe,
    self_tracking_system: String,
}

impl SlotResolver {
    pub fn new(
        action_set: ActionSetHandle,
        actions: RoleMap<ActionHandle>,
        universe: Universe,
        self_tracking_system: &str,
    ) -> Self {
        Self {
            action_set,
            actions,
            bindings: RoleMap::default(),
            excluded: RoleMap::from_fn(|_| OriginHandle::INVALID),
            universe,
            self_tracking_system: self_tracking_system.to_string(),
        }
    }

    pub fn binding(&self, role: Role) -> &DeviceBinding {
        &self.bindings[role]
    }

    /// Self-sourced origin currently ignored for `role`
    pub fn excluded_origin(&self, role: Role) -> Option<OriginHandle> {
        Some(self.excluded[role]).filter(|origin| origin.is_valid())
    }

    /// Is this device one of the trackers we publish ourselves?
    fn is_self_sourced(&self, runtime: &dyn Runtime, index: DeviceIndex) -> bool {
        match runtime.string_property(index, DeviceProperty::TrackingSystemName) {
            Ok(system) => system == self.self_tracking_system,
            Err(e) => {
                debug!(device = %index, error = %e, "No tracking system name");
                false
            }
        }
    }

    /// Re-derive bindings from the runtime's active origins
    ///
    /// Returns the number of assignment announcements sent.
    pub fn refresh(
        &mut self,
        runtime: &mut dyn Runtime,
        trackers: &mut RoleMap<TrackerState>,
        bridge: &mut dyn Bridge,
        just_reconnected: bool,
    ) -> usize {
        if let Err(e) = runtime.update_action_state(self.action_set) {
            warn!(error = %e, "Failed to update action state");
            return 0;
        }

        let runtime: &dyn Runtime = runtime;
        let mut announced = 0;

        for role in Role::ALL {
            let data = match runtime.pose_action(self.actions[role], self.universe) {
                Ok(data) => data,
                Err(e) => {
                    warn!(role = %role, error = %e, "Failed to read pose action");
                    continue;
                }
            };

            let origin = data.active_origin;
            if !data.active || !origin.is_valid() {
                continue;
            }

            let known = self.bindings[role].origin == origin || self.excluded[role] == origin;
            if known && !just_reconnected {
                continue;
            }

            let index = match runtime.resolve_origin(origin) {
                Ok(index) => index,
                Err(e) => {
                    warn!(role = %role, origin = %origin, error = %e, "Failed to resolve origin");
                    continue;
                }
            };

            let index = if self.is_self_sourced(runtime, index) {
                debug!(role = %role, device = %index, "Ignoring self-sourced tracker");
                self.excluded[role] = origin;
                // The role keeps whatever real device it had
                match self.bindings[role].device {
                    Some(bound) if just_reconnected => bound,
                    _ => continue,
                }
            } else {
                self.excluded[role] = OriginHandle::INVALID;
                self.bindings[role] = DeviceBinding {
                    origin,
                    device: Some(index),
                };
                index
            };

            let sent = trackers[role].set_index(
                index,
                || device_name(runtime, index),
                || optional_property(runtime, index, DeviceProperty::SerialNumber),
                just_reconnected,
                bridge,
            );
            if sent {
                announced += 1;
            }
        }

        announced
    }

    /// Feed the latest device poses to every bound role
    pub fn pump_poses(
        &mut self,
        runtime: &dyn Runtime,
        trackers: &mut RoleMap<TrackerState>,
        bridge: &mut dyn Bridge,
        just_reconnected: bool,
    ) {
        let poses = runtime.device_poses(self.universe);

        for role in Role::ALL {
            let binding = &mut self.bindings[role];
            if binding.device.is_none() {
                continue;
            }

            let tracker = &mut trackers[role];
            match runtime.resolve_origin(binding.origin) {
                Ok(index) => {
                    let pose = poses
                        .get(index.0 as usize)
                        .copied()
                        .unwrap_or_else(DevicePose::disconnected);
                    tracker.update(&pose, just_reconnected, bridge);
                }
                Err(e) => {
                    debug!(
                        role = %role,
                        origin = %binding.origin,
                        error = %e,
                        "Origin no longer valid, dropping binding"
                    );
                    *binding = DeviceBinding::default();
                    if tracker.is_valid() {
                        tracker.update(&DevicePose::disconnected(), just_reconnected, bridge);
                    }
                }
            }
        }
    }
}

/// Display name: controller type, or a name synthesized from the index
fn device_name(runtime: &dyn Runtime, index: DeviceIndex) -> String {
    optional_property(runtime, index, DeviceProperty::ControllerType)
        .unwrap_or_else(|| format!("Index{}", index))
}

fn optional_property(
    runtime: &dyn Runtime,
    index: DeviceIndex,
    property: DeviceProperty,
) -> Option<String> {
    match runtime.string_property(index, property) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(device = %index, error = %e, "Device property unavailable");
            None
        }
    }
}
