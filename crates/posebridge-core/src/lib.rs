//! Posebridge Core - Tracking-slot resolution and change detection
//!
//! This crate turns per-frame runtime state into a de-duplicated event stream:
//! - Role table mapping body positions to input actions and server ids
//! - Slot resolution from active action origins to physical devices
//! - Per-role delivery state machine (status/pose/announcement)
//! - Rising-edge digital events and fixed-rate tick scheduling

pub mod bridge;
pub mod digital;
pub mod feeder;
pub mod message;
pub mod pose;
pub mod resolver;
pub mod roles;
pub mod runtime;
pub mod scheduler;
pub mod sim;
pub mod tracker;

pub use bridge::{Bridge, MemoryBridge};
pub use digital::{DigitalBinding, DigitalEventWatch};
pub use feeder::{Feeder, FeederConfig, TickOutcome};
pub use message::{DataSource, Message, TrackerStatus};
pub use pose::{DeviceIndex, DevicePose, Quat, TrackingResult, Universe, Vec3};
pub use resolver::{DeviceBinding, SlotResolver, DEFAULT_SELF_TRACKING_SYSTEM};
pub use roles::{BodyPart, Role, RoleDescriptor, RoleMap};
pub use runtime::{
    ActionHandle, ActionSetHandle, DeviceProperty, DigitalActionData, OriginHandle,
    PoseActionData, Runtime, RuntimeError, RuntimeEvent, MAX_DEVICE_COUNT,
};
pub use scheduler::{ScheduleError, TickScheduler, TickWait, DEFAULT_TICKS_PER_SECOND};
pub use sim::{SceneError, SimDevice, SimRuntime};
pub use tracker::{Delivery, TrackerState};
