//! Per-role delivery state machine
//!
//! A [`TrackerState`] remembers what the server currently believes about one
//! role: the announced device identity, whether the last transmission was a
//! valid pose, and the last pose sent. Only transitions and real value changes
//! produce traffic.

use tracing::{info, trace, warn};

use crate::bridge::Bridge;
use crate::message::{DataSource, Message, TrackerStatus};
use crate::pose::{DeviceIndex, DevicePose, Quat, TrackingResult, Vec3};
use crate::roles::Role;

/// What the last transmission told the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Nothing transmitted yet
    #[default]
    Unassigned,
    Valid,
    Invalid,
}

/// Delivery state for one role
#[derive(Debug, Clone)]
pub struct TrackerState {
    role: Role,
    device_index: Option<DeviceIndex>,
    last_position: Vec3,
    last_rotation: Quat,
    delivery: Delivery,
    reset_on_reassign: bool,
}

impl TrackerState {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            device_index: None,
            last_position: Vec3::ZERO,
            last_rotation: Quat::ZERO,
            delivery: Delivery::Unassigned,
            reset_on_reassign: false,
        }
    }

    /// Clear the delivery state when an announced device index is replaced
    pub fn with_reset_on_reassign(mut self, reset: bool) -> Self {
        self.reset_on_reassign = reset;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn device_index(&self) -> Option<DeviceIndex> {
        self.device_index
    }

    pub fn delivery(&self) -> Delivery {
        self.delivery
    }

    pub fn is_valid(&self) -> bool {
        self.delivery == Delivery::Valid
    }

    pub fn last_position(&self) -> Vec3 {
        self.last_position
    }

    pub fn last_rotation(&self) -> Quat {
        self.last_rotation
    }

    fn tracker_id(&self) -> DeviceIndex {
        self.device_index.unwrap_or(DeviceIndex::INVALID)
    }

    fn send_status(&self, status: TrackerStatus, bridge: &mut dyn Bridge) {
        bridge.send_message(Message::TrackerStatus {
            tracker_id: self.tracker_id(),
            status,
        });
        info!(
            role = %self.role,
            device = %self.tracker_id(),
            status = %status,
            "Tracker status"
        );
    }

    /// Consume the latest pose sample, transmitting only what changed
    pub fn update(&mut self, pose: &DevicePose, just_reconnected: bool, bridge: &mut dyn Bridge) {
        if pose.pose_is_valid {
            if self.delivery != Delivery::Valid {
                self.delivery = Delivery::Valid;
                self.send_status(TrackerStatus::Ok, bridge);
            }

            let position = pose.position();
            let rotation = pose.rotation();

            let changed =
                pose_differs(self.last_position, self.last_rotation, position, rotation);
            if just_reconnected || changed {
                self.last_position = position;
                self.last_rotation = rotation;

                let data_source = if pose.is_rotation_only() {
                    DataSource::Imu
                } else {
                    DataSource::Full
                };
                bridge.send_message(Message::position(
                    self.tracker_id(),
                    position,
                    rotation,
                    data_source,
                ));
                trace!(
                    role = %self.role,
                    x = position.x,
                    y = position.y,
                    z = position.z,
                    "Sent position"
                );
            }
        } else if self.delivery == Delivery::Valid || just_reconnected {
            self.delivery = Delivery::Invalid;
            self.last_position = Vec3::ZERO;
            self.last_rotation = Quat::ZERO;
            self.send_status(invalid_status(pose), bridge);
        }
    }

    /// Record the device backing this role and announce it when it changed
    ///
    /// `name` and `serial` are only evaluated when an announcement is sent.
    /// Returns true if an announcement was sent.
    pub fn set_index<N, S>(
        &mut self,
        index: DeviceIndex,
        name: N,
        serial: S,
        force_announce: bool,
        bridge: &mut dyn Bridge,
    ) -> bool
    where
        N: FnOnce() -> String,
        S: FnOnce() -> Option<String>,
    {
        let changed = self.device_index != Some(index);
        if !changed && !force_announce {
            return false;
        }

        if let Some(previous) = self.device_index.filter(|&p| p != index) {
            warn!(
                role = %self.role,
                from = %previous,
                to = %index,
                "Tracked device index changed without a reassignment"
            );
            if self.reset_on_reassign {
                self.delivery = Delivery::Unassigned;
                self.last_position = Vec3::ZERO;
                self.last_rotation = Quat::ZERO;
            }
        }

        self.device_index = Some(index);

        let name = name();
        let serial = serial();
        let body_part = self.role.body_part();

        bridge.send_message(Message::TrackerAdded {
            tracker_id: index,
            tracker_role: body_part.id(),
            tracker_name: name.clone(),
            tracker_serial: serial,
        });

        info!(
            name = %name,
            role = %self.role,
            body_part = body_part.id(),
            device = %index,
            "Found device"
        );
        true
    }
}

/// Status reported when a pose stops being valid, by priority
fn invalid_status(pose: &DevicePose) -> TrackerStatus {
    if !pose.device_is_connected {
        TrackerStatus::Disconnected
    } else if pose.tracking_result == TrackingResult::RunningOutOfRange {
        TrackerStatus::Occluded
    } else {
        TrackerStatus::Error
    }
}

/// Bit-for-bit comparison over all seven scalars
fn pose_differs(old_pos: Vec3, old_rot: Quat, new_pos: Vec3, new_rot: Quat) -> bool {
    let old = [old_pos.x, old_pos.y, old_pos.z, old_rot.w, old_rot.x, old_rot.y, old_rot.z];
    let new = [new_pos.x, new_pos.y, new_pos.z, new_rot.w, new_rot.x, new_rot.y, new_rot.z];
    old.iter().zip(new.iter()).any(|(a, b)| a.to_bits() != b.to_bits())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MemoryBridge;

    fn tracked(x: f32, y: f32, z: f32) -> DevicePose {
        DevicePose::tracked(Vec3::new(x, y, z), Quat::IDENTITY)
    }

    fn invalid(connected: bool, result: TrackingResult) -> DevicePose {
        DevicePose {
            tracking_result: result,
            pose_is_valid: false,
            device_is_connected: connected,
            ..DevicePose::disconnected()
        }
    }

    fn assigned(bridge: &mut MemoryBridge) -> TrackerState {
        let mut tracker = TrackerState::new(Role::LeftFoot);
        tracker.set_index(DeviceIndex(3), || "ViveTracker".to_string(), || None, false, bridge);
        bridge.drain_sent();
        tracker
    }

    fn statuses(messages: &[Message]) -> Vec<TrackerStatus> {
        messages
            .iter()
            .filter_map(|m| match m {
                Message::TrackerStatus { status, .. } => Some(*status),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_first_valid_pose_sends_ok_then_position() {
        let mut bridge = MemoryBridge::new();
        let mut tracker = assigned(&mut bridge);

        tracker.update(&tracked(1.0, 2.0, 3.0), false, &mut bridge);

        let sent = bridge.drain_sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[0],
            Message::TrackerStatus { tracker_id: DeviceIndex(3), status: TrackerStatus::Ok }
        );
        let position = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(
            sent[1],
            Message::position(DeviceIndex(3), position, Quat::IDENTITY, DataSource::Full)
        );
        assert_eq!(tracker.delivery(), Delivery::Valid);
    }

    #[test]
    fn test_unchanged_pose_is_deduplicated() {
        let mut bridge = MemoryBridge::new();
        let mut tracker = assigned(&mut bridge);

        tracker.update(&tracked(1.0, 2.0, 3.0), false, &mut bridge);
        bridge.drain_sent();

        tracker.update(&tracked(1.0, 2.0, 3.0), false, &mut bridge);
        assert!(bridge.sent().is_empty());
    }

    #[test]
    fn test_single_field_change_sends_one_position() {
        let mut bridge = MemoryBridge::new();
        let mut tracker = assigned(&mut bridge);

        tracker.update(&tracked(1.0, 2.0, 3.0), false, &mut bridge);
        bridge.drain_sent();

        tracker.update(&tracked(1.0, 2.0, 3.5), false, &mut bridge);
        let sent = bridge.drain_sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(sent[0], Message::Position { z, .. } if z == 3.5));
        assert_eq!(tracker.last_position(), Vec3::new(1.0, 2.0, 3.5));
    }

    #[test]
    fn test_each_scalar_change_sends_one_position() {
        let base = [0.5, 1.5, -0.25, 0.8, 0.2, 0.4, 0.4];
        let pose_from = |v: [f32; 7]| {
            let norm = (v[3] * v[3] + v[4] * v[4] + v[5] * v[5] + v[6] * v[6]).sqrt();
            DevicePose::tracked(
                Vec3::new(v[0], v[1], v[2]),
                Quat::new(v[3] / norm, v[4] / norm, v[5] / norm, v[6] / norm),
            )
        };

        for field in 0..7 {
            let mut bridge = MemoryBridge::new();
            let mut tracker = assigned(&mut bridge);
            tracker.update(&pose_from(base), false, &mut bridge);
            bridge.drain_sent();

            let mut changed = base;
            changed[field] += 0.125;
            let pose = pose_from(changed);
            tracker.update(&pose, false, &mut bridge);

            assert_eq!(
                bridge.drain_sent(),
                vec![Message::position(
                    DeviceIndex(3),
                    pose.position(),
                    pose.rotation(),
                    DataSource::Full
                )],
                "field {}",
                field
            );
            assert_eq!(tracker.last_position(), pose.position());
            assert_eq!(tracker.last_rotation(), pose.rotation());
        }
    }

    #[test]
    fn test_rotation_change_detected() {
        let mut bridge = MemoryBridge::new();
        let mut tracker = assigned(&mut bridge);

        tracker.update(&tracked(0.0, 0.0, 0.0), false, &mut bridge);
        bridge.drain_sent();

        let half = std::f32::consts::FRAC_1_SQRT_2;
        let turned = DevicePose::tracked(Vec3::ZERO, Quat::new(half, 0.0, 0.0, half));
        tracker.update(&turned, false, &mut bridge);
        assert_eq!(bridge.drain_sent().len(), 1);
    }

    #[test]
    fn test_reconnect_resends_unchanged_pose() {
        let mut bridge = MemoryBridge::new();
        let mut tracker = assigned(&mut bridge);

        tracker.update(&tracked(1.0, 2.0, 3.0), false, &mut bridge);
        bridge.drain_sent();

        tracker.update(&tracked(1.0, 2.0, 3.0), true, &mut bridge);
        let sent = bridge.drain_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind(), "position");
    }

    #[test]
    fn test_rotation_only_tagged_imu() {
        let mut bridge = MemoryBridge::new();
        let mut tracker = assigned(&mut bridge);

        let mut pose = tracked(1.0, 1.0, 1.0);
        pose.tracking_result = TrackingResult::FallbackRotationOnly;
        tracker.update(&pose, false, &mut bridge);

        let sent = bridge.drain_sent();
        assert!(matches!(sent[1], Message::Position { data_source: DataSource::Imu, .. }));
    }

    #[test]
    fn test_status_priority() {
        let cases = [
            (invalid(false, TrackingResult::RunningOutOfRange), TrackerStatus::Disconnected),
            (invalid(true, TrackingResult::RunningOutOfRange), TrackerStatus::Occluded),
            (invalid(true, TrackingResult::Uninitialized), TrackerStatus::Error),
        ];

        for (pose, expected) in cases {
            let mut bridge = MemoryBridge::new();
            let mut tracker = assigned(&mut bridge);
            tracker.update(&tracked(1.0, 2.0, 3.0), false, &mut bridge);
            bridge.drain_sent();

            tracker.update(&pose, false, &mut bridge);
            assert_eq!(statuses(&bridge.drain_sent()), vec![expected]);
            assert_eq!(tracker.delivery(), Delivery::Invalid);
            assert_eq!(tracker.last_position(), Vec3::ZERO);
            assert_eq!(tracker.last_rotation(), Quat::ZERO);
        }
    }

    #[test]
    fn test_edge_triggered_status() {
        let mut bridge = MemoryBridge::new();
        let mut tracker = assigned(&mut bridge);
        let lost = invalid(true, TrackingResult::RunningOutOfRange);

        // Never valid, no reconnect: silent
        tracker.update(&lost, false, &mut bridge);
        tracker.update(&lost, false, &mut bridge);
        assert!(bridge.drain_sent().is_empty());

        tracker.update(&tracked(1.0, 0.0, 0.0), false, &mut bridge);
        tracker.update(&lost, false, &mut bridge);
        tracker.update(&lost, false, &mut bridge);
        tracker.update(&tracked(1.0, 0.0, 0.0), false, &mut bridge);

        assert_eq!(
            statuses(&bridge.drain_sent()),
            vec![TrackerStatus::Ok, TrackerStatus::Occluded, TrackerStatus::Ok]
        );
    }

    #[test]
    fn test_reconnect_reannounces_invalid_status() {
        let mut bridge = MemoryBridge::new();
        let mut tracker = assigned(&mut bridge);
        let gone = invalid(false, TrackingResult::Uninitialized);

        tracker.update(&gone, false, &mut bridge);
        assert!(bridge.drain_sent().is_empty());

        tracker.update(&gone, true, &mut bridge);
        assert_eq!(statuses(&bridge.drain_sent()), vec![TrackerStatus::Disconnected]);
    }

    #[test]
    fn test_reconnect_with_valid_pose_keeps_valid() {
        let mut bridge = MemoryBridge::new();
        let mut tracker = assigned(&mut bridge);
        tracker.update(&tracked(1.0, 2.0, 3.0), false, &mut bridge);
        bridge.drain_sent();

        tracker.update(&tracked(1.0, 2.0, 3.0), true, &mut bridge);
        assert!(statuses(&bridge.drain_sent()).is_empty());
        assert_eq!(tracker.delivery(), Delivery::Valid);
    }

    #[test]
    fn test_set_index_idempotent() {
        let mut bridge = MemoryBridge::new();
        let mut tracker = TrackerState::new(Role::Waist);

        let name = || "Tracker".to_string();

        assert!(tracker.set_index(DeviceIndex(5), name, || None, false, &mut bridge));
        let unused = || -> String { panic!("name not needed") };
        assert!(!tracker.set_index(DeviceIndex(5), unused, || None, false, &mut bridge));
        assert_eq!(bridge.drain_sent().len(), 1);

        assert!(tracker.set_index(DeviceIndex(5), name, || None, true, &mut bridge));
        assert!(tracker.set_index(DeviceIndex(5), name, || None, true, &mut bridge));
        assert_eq!(bridge.drain_sent().len(), 2);
    }

    #[test]
    fn test_set_index_announcement_contents() {
        let mut bridge = MemoryBridge::new();
        let mut tracker = TrackerState::new(Role::LeftHand);

        tracker.set_index(
            DeviceIndex(2),
            || "knuckles".to_string(),
            || Some("LHR-1234".to_string()),
            false,
            &mut bridge,
        );

        assert_eq!(
            bridge.sent(),
            &[Message::TrackerAdded {
                tracker_id: DeviceIndex(2),
                tracker_role: 13,
                tracker_name: "knuckles".to_string(),
                tracker_serial: Some("LHR-1234".to_string()),
            }]
        );
        assert_eq!(tracker.device_index(), Some(DeviceIndex(2)));
    }

    #[test]
    fn test_reassignment_keeps_delivery_by_default() {
        let mut bridge = MemoryBridge::new();
        let mut tracker = assigned(&mut bridge);
        tracker.update(&tracked(1.0, 2.0, 3.0), false, &mut bridge);

        tracker.set_index(DeviceIndex(7), || "Other".to_string(), || None, false, &mut bridge);
        assert_eq!(tracker.device_index(), Some(DeviceIndex(7)));
        assert_eq!(tracker.delivery(), Delivery::Valid);
        assert_eq!(tracker.last_position(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_reassignment_reset_when_enabled() {
        let mut bridge = MemoryBridge::new();
        let mut tracker = TrackerState::new(Role::Chest).with_reset_on_reassign(true);
        tracker.set_index(DeviceIndex(1), || "A".to_string(), || None, false, &mut bridge);
        tracker.update(&tracked(1.0, 2.0, 3.0), false, &mut bridge);

        tracker.set_index(DeviceIndex(4), || "B".to_string(), || None, false, &mut bridge);
        assert_eq!(tracker.delivery(), Delivery::Unassigned);
        bridge.drain_sent();

        tracker.update(&tracked(1.0, 2.0, 3.0), false, &mut bridge);
        let sent = bridge.drain_sent();
        assert_eq!(statuses(&sent), vec![TrackerStatus::Ok]);
        assert_eq!(sent.len(), 2);
    }
}
