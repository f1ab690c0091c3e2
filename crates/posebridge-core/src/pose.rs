//! Pose types reported by the tracking runtime
//!
//! Only position and rotation are extracted from a device transform; no
//! filtering or coordinate conversion happens here.

use serde::{Deserialize, Serialize};

/// Index into the runtime's hardware device table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceIndex(pub u32);

impl DeviceIndex {
    /// Identity sent for a tracker that has not been announced yet
    pub const INVALID: DeviceIndex = DeviceIndex(u32::MAX);
}

impl std::fmt::Display for DeviceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tracking space the runtime reports poses in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Universe {
    Seated,
    Standing,
    /// Raw space sent by the driver
    #[default]
    #[serde(rename = "raw")]
    RawAndUncalibrated,
}

impl std::str::FromStr for Universe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "seated" => Ok(Self::Seated),
            "standing" => Ok(Self::Standing),
            "raw" => Ok(Self::RawAndUncalibrated),
            other => Err(format!(
                "unknown universe '{}' (expected raw, seated or standing)",
                other
            )),
        }
    }
}

/// Tracking quality reported alongside a device pose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingResult {
    Uninitialized,
    CalibratingInProgress,
    CalibratingOutOfRange,
    #[default]
    RunningOk,
    RunningOutOfRange,
    /// Only the IMU is driving the pose
    FallbackRotationOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quat {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quat {
    pub const ZERO: Quat = Quat { w: 0.0, x: 0.0, y: 0.0, z: 0.0 };
    pub const IDENTITY: Quat = Quat { w: 1.0, x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }
}

/// 3x4 row-major device-to-absolute transform
pub type Matrix34 = [[f32; 4]; 3];

pub const IDENTITY_MATRIX: Matrix34 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
];

/// Translation column of a transform
pub fn position_from_matrix(m: &Matrix34) -> Vec3 {
    Vec3::new(m[0][3], m[1][3], m[2][3])
}

/// Rotation quaternion of the 3x3 part of a transform
pub fn rotation_from_matrix(m: &Matrix34) -> Quat {
    let w = (1.0 + m[0][0] + m[1][1] + m[2][2]).max(0.0).sqrt() / 2.0;
    let x = (1.0 + m[0][0] - m[1][1] - m[2][2]).max(0.0).sqrt() / 2.0;
    let y = (1.0 - m[0][0] + m[1][1] - m[2][2]).max(0.0).sqrt() / 2.0;
    let z = (1.0 - m[0][0] - m[1][1] + m[2][2]).max(0.0).sqrt() / 2.0;
    Quat {
        w,
        x: x.copysign(m[2][1] - m[1][2]),
        y: y.copysign(m[0][2] - m[2][0]),
        z: z.copysign(m[1][0] - m[0][1]),
    }
}

/// Transform with the given rotation and translation
pub fn matrix_from_parts(position: Vec3, rotation: Quat) -> Matrix34 {
    let Quat { w, x, y, z } = rotation;
    [
        [
            1.0 - 2.0 * (y * y + z * z),
            2.0 * (x * y - z * w),
            2.0 * (x * z + y * w),
            position.x,
        ],
        [
            2.0 * (x * y + z * w),
            1.0 - 2.0 * (x * x + z * z),
            2.0 * (y * z - x * w),
            position.y,
        ],
        [
            2.0 * (x * z - y * w),
            2.0 * (y * z + x * w),
            1.0 - 2.0 * (x * x + y * y),
            position.z,
        ],
    ]
}

/// Per-device pose sample from the runtime
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DevicePose {
    pub device_to_absolute: Matrix34,
    pub tracking_result: TrackingResult,
    pub pose_is_valid: bool,
    pub device_is_connected: bool,
}

impl Default for DevicePose {
    fn default() -> Self {
        Self::disconnected()
    }
}

impl DevicePose {
    /// A valid, fully tracked pose
    pub fn tracked(position: Vec3, rotation: Quat) -> Self {
        Self {
            device_to_absolute: matrix_from_parts(position, rotation),
            tracking_result: TrackingResult::RunningOk,
            pose_is_valid: true,
            device_is_connected: true,
        }
    }

    /// Sample for a device that is gone
    pub fn disconnected() -> Self {
        Self {
            device_to_absolute: IDENTITY_MATRIX,
            tracking_result: TrackingResult::Uninitialized,
            pose_is_valid: false,
            device_is_connected: false,
        }
    }

    pub fn position(&self) -> Vec3 {
        position_from_matrix(&self.device_to_absolute)
    }

    pub fn rotation(&self) -> Quat {
        rotation_from_matrix(&self.device_to_absolute)
    }

    pub fn is_rotation_only(&self) -> bool {
        self.tracking_result == TrackingResult::FallbackRotationOnly
    }
}
