//! One full resolution + transmission pass per tick

use tracing::{debug, info, trace};

use crate::bridge::Bridge;
use crate::digital::DigitalEventWatch;
use crate::pose::Universe;
use crate::resolver::{SlotResolver, DEFAULT_SELF_TRACKING_SYSTEM};
use crate::roles::{Role, RoleMap};
use crate::runtime::{Runtime, RuntimeError, RuntimeEvent};
use crate::tracker::TrackerState;

/// Startup settings for a [`Feeder`]
#[derive(Debug, Clone)]
pub struct FeederConfig {
    pub universe: Universe,
    pub action_manifest: String,
    pub action_set: String,
    /// Driver identity of our own virtual trackers
    pub self_tracking_system: String,
    pub reset_on_reassign: bool,
    /// Digital action paths and the event sent on their rising edge
    pub digital_actions: Vec<(String, Option<String>)>,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            universe: Universe::default(),
            action_manifest: "./bindings/actions.json".to_string(),
            action_set: "/actions/main".to_string(),
            self_tracking_system: DEFAULT_SELF_TRACKING_SYSTEM.to_string(),
            reset_on_reassign: false,
            digital_actions: vec![
                (
                    "/actions/main/in/request_calibration".to_string(),
                    Some("calibrate".to_string()),
                ),
                ("/actions/main/in/confirm".to_string(), Some("Confirm".to_string())),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The runtime asked us to exit
    Quit,
}

/// Owns the collaborators and the per-role state
pub struct Feeder<R, B> {
    runtime: R,
    bridge: B,
    resolver: SlotResolver,
    trackers: RoleMap<TrackerState>,
    digital: DigitalEventWatch,
}

impl<R: Runtime, B: Bridge> Feeder<R, B> {
    /// Resolve the action manifest and handles, then bind roles once
    ///
    /// Any failure here is a setup failure and must stop the process.
    pub fn setup(
        mut runtime: R,
        mut bridge: B,
        config: &FeederConfig,
    ) -> Result<Self, RuntimeError> {
        runtime.set_action_manifest(&config.action_manifest)?;

        let mut actions = Vec::with_capacity(Role::COUNT);
        for role in Role::ALL {
            actions.push(runtime.action_handle(role.action_path())?);
        }
        let actions = RoleMap::from_fn(|role| actions[role.id()]);

        let mut digital = DigitalEventWatch::new();
        for (path, event) in &config.digital_actions {
            let action = runtime.action_handle(path)?;
            digital.watch(action, path, event.clone());
        }

        let action_set = runtime.action_set_handle(&config.action_set)?;

        let mut resolver = SlotResolver::new(
            action_set,
            actions,
            config.universe,
            &config.self_tracking_system,
        );
        let mut trackers = RoleMap::from_fn(|role| {
            TrackerState::new(role).with_reset_on_reassign(config.reset_on_reassign)
        });

        let announced = resolver.refresh(&mut runtime, &mut trackers, &mut bridge, false);
        info!(
            universe = ?config.universe,
            digital = digital.bindings().len(),
            announced,
            "Feeder ready"
        );

        Ok(Self {
            runtime,
            bridge,
            resolver,
            trackers,
            digital,
        })
    }

    /// Run one pass: bridge pump, event poll, resolution, buttons, poses
    pub fn tick(&mut self) -> TickOutcome {
        let just_reconnected = self.bridge.run_frame();
        if just_reconnected {
            info!("Bridge connected, re-announcing trackers");
        }

        if let Some(event) = self.runtime.poll_event() {
            match event {
                RuntimeEvent::Quit => {
                    info!("Runtime requested quit");
                    return TickOutcome::Quit;
                }
                other => debug!(event = ?other, "Runtime event"),
            }
        }

        while let Some(message) = self.bridge.next_message() {
            trace!(kind = message.kind(), "Discarding inbound message");
        }

        self.resolver
            .refresh(&mut self.runtime, &mut self.trackers, &mut self.bridge, just_reconnected);
        self.digital.poll(&self.runtime, &mut self.bridge);
        self.resolver
            .pump_poses(&self.runtime, &mut self.trackers, &mut self.bridge, just_reconnected);

        TickOutcome::Continue
    }

    pub fn tracker(&self, role: Role) -> &TrackerState {
        &self.trackers[role]
    }

    pub fn resolver(&self) -> &SlotResolver {
        &self.resolver
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn bridge_mut(&mut self) -> &mut B {
        &mut self.bridge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::MemoryBridge;
    use crate::message::{DataSource, Message, TrackerStatus};
    use crate::pose::{DeviceIndex, DevicePose, Quat, Vec3};
    use crate::runtime::DeviceProperty;
    use crate::sim::{SimDevice, SimRuntime};
    use crate::tracker::Delivery;

    fn feeder() -> Feeder<SimRuntime, MemoryBridge> {
        Feeder::setup(SimRuntime::new(), MemoryBridge::new(), &FeederConfig::default()).unwrap()
    }

    #[test]
    fn test_setup_failure_is_fatal() {
        let config = FeederConfig {
            action_manifest: String::new(),
            ..FeederConfig::default()
        };
        let result = Feeder::setup(SimRuntime::new(), MemoryBridge::new(), &config);
        assert!(matches!(result, Err(RuntimeError::ManifestRejected(_))));

        let config = FeederConfig {
            action_set: "main".to_string(),
            ..FeederConfig::default()
        };
        let result = Feeder::setup(SimRuntime::new(), MemoryBridge::new(), &config);
        assert!(matches!(result, Err(RuntimeError::ActionSetNotFound(_))));
    }

    #[test]
    fn test_left_foot_scenario() {
        let mut feeder = feeder();
        let device = DeviceIndex(3);

        // bound device appears
        let sim = feeder.runtime_mut();
        sim.add_device(
            device,
            SimDevice::new(DevicePose {
                pose_is_valid: false,
                device_is_connected: true,
                ..DevicePose::disconnected()
            })
            .with_property(DeviceProperty::TrackingSystemName, "lighthouse")
            .with_property(DeviceProperty::ControllerType, "ViveTracker"),
        );
        sim.bind(Role::LeftFoot.action_path(), device);

        assert_eq!(feeder.tick(), TickOutcome::Continue);
        assert_eq!(feeder.resolver().binding(Role::LeftFoot).device, Some(device));
        assert_eq!(
            feeder.bridge_mut().drain_sent(),
            vec![Message::TrackerAdded {
                tracker_id: device,
                tracker_role: 2,
                tracker_name: "ViveTracker".to_string(),
                tracker_serial: None,
            }]
        );

        // valid pose
        feeder
            .runtime_mut()
            .set_pose(device, DevicePose::tracked(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY));
        feeder.tick();
        assert_eq!(
            feeder.bridge_mut().drain_sent(),
            vec![
                Message::TrackerStatus { tracker_id: device, status: TrackerStatus::Ok },
                Message::position(
                    device,
                    Vec3::new(1.0, 2.0, 3.0),
                    Quat::IDENTITY,
                    DataSource::Full
                ),
            ]
        );

        // identical pose
        feeder.tick();
        assert!(feeder.bridge_mut().drain_sent().is_empty());

        // device disconnects
        feeder.runtime_mut().set_pose(device, DevicePose::disconnected());
        feeder.tick();
        assert_eq!(
            feeder.bridge_mut().drain_sent(),
            vec![Message::TrackerStatus { tracker_id: device, status: TrackerStatus::Disconnected }]
        );
        let tracker = feeder.tracker(Role::LeftFoot);
        assert_eq!(tracker.delivery(), Delivery::Invalid);
        assert_eq!(tracker.last_position(), Vec3::ZERO);
    }

    #[test]
    fn test_reconnect_resends_everything() {
        let mut feeder = feeder();
        let device = DeviceIndex(1);
        let sim = feeder.runtime_mut();
        sim.add_device(
            device,
            SimDevice::new(DevicePose::tracked(Vec3::new(0.5, 1.5, 0.0), Quat::IDENTITY)),
        );
        sim.bind(Role::Waist.action_path(), device);

        feeder.tick();
        assert_eq!(feeder.bridge_mut().drain_sent().len(), 3);

        feeder.tick();
        assert!(feeder.bridge_mut().drain_sent().is_empty());

        feeder.bridge_mut().simulate_reconnect();
        feeder.tick();
        let kinds: Vec<_> = feeder.bridge_mut().drain_sent().iter().map(Message::kind).collect();
        assert_eq!(kinds, vec!["tracker_added", "position"]);
    }

    #[test]
    fn test_digital_events_flow_through_tick() {
        let mut feeder = feeder();
        feeder.runtime_mut().set_button("/actions/main/in/request_calibration", true);
        feeder.tick();
        assert_eq!(
            feeder.bridge_mut().drain_sent(),
            vec![Message::UserAction { name: "calibrate".to_string() }]
        );

        feeder.tick();
        assert!(feeder.bridge_mut().drain_sent().is_empty());
    }

    #[test]
    fn test_inbound_drained_and_quit_honored() {
        let mut feeder = feeder();
        for _ in 0..5 {
            feeder
                .bridge_mut()
                .push_inbound(Message::UserAction { name: "noise".to_string() });
        }
        feeder.tick();
        assert_eq!(feeder.bridge_mut().inbound_len(), 0);

        feeder.runtime_mut().push_event(RuntimeEvent::DeviceActivated(DeviceIndex(0)));
        assert_eq!(feeder.tick(), TickOutcome::Continue);
        feeder.runtime_mut().push_event(RuntimeEvent::Quit);
        assert_eq!(feeder.tick(), TickOutcome::Quit);
    }
}
