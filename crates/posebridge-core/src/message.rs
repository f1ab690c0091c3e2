//! Typed messages exchanged with the body-tracking server

use serde::{Deserialize, Serialize};

use crate::pose::{DeviceIndex, Quat, Vec3};

/// Tracker status as reported to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrackerStatus {
    Ok,
    Disconnected,
    Occluded,
    Error,
}

impl std::fmt::Display for TrackerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::Disconnected => "DISCONNECTED",
            Self::Occluded => "OCCLUDED",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Which sensors produced a position sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataSource {
    Imu,
    Full,
}

/// A single message on the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    TrackerStatus {
        tracker_id: DeviceIndex,
        status: TrackerStatus,
    },
    Position {
        tracker_id: DeviceIndex,
        x: f32,
        y: f32,
        z: f32,
        qw: f32,
        qx: f32,
        qy: f32,
        qz: f32,
        data_source: DataSource,
    },
    TrackerAdded {
        tracker_id: DeviceIndex,
        /// Server body-part id
        tracker_role: u32,
        tracker_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tracker_serial: Option<String>,
    },
    UserAction {
        name: String,
    },
}

impl Message {
    pub fn position(
        tracker_id: DeviceIndex,
        position: Vec3,
        rotation: Quat,
        data_source: DataSource,
    ) -> Self {
        Self::Position {
            tracker_id,
            x: position.x,
            y: position.y,
            z: position.z,
            qw: rotation.w,
            qx: rotation.x,
            qy: rotation.y,
            qz: rotation.z,
            data_source,
        }
    }

    /// Short kind label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TrackerStatus { .. } => "tracker_status",
            Self::Position { .. } => "position",
            Self::TrackerAdded { .. } => "tracker_added",
            Self::UserAction { .. } => "user_action",
        }
    }
}
