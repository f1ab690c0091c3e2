//! Role table: the fixed catalog of logical body-tracking positions
//!
//! Each [`Role`] maps to one [`RoleDescriptor`] holding its display name, the
//! body-part id the server uses for it and the input action queried for its pose.

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Logical body-tracking position, independent of any physical device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Head = 0,
    LeftHand,
    RightHand,
    LeftFoot,
    RightFoot,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftKnee,
    RightKnee,
    Waist,
    Chest,
}

/// Body-part identity as understood by the remote server
///
/// The numbering is owned by the server and differs from [`Role`] ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum BodyPart {
    None = 0,
    Waist = 1,
    LeftFoot = 2,
    RightFoot = 3,
    Chest = 4,
    LeftKnee = 5,
    RightKnee = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftShoulder = 9,
    RightShoulder = 10,
    LeftHand = 11,
    RightHand = 12,
    LeftController = 13,
    RightController = 14,
    Head = 15,
    Neck = 16,
    Camera = 17,
    Keyboard = 18,
    Hmd = 19,
    Beacon = 20,
    GenericController = 21,
}

impl BodyPart {
    pub fn id(self) -> u32 {
        self as u32
    }
}

/// Static description of a role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleDescriptor {
    pub name: &'static str,
    pub body_part: BodyPart,
    pub action_path: &'static str,
}

const fn entry(
    name: &'static str,
    body_part: BodyPart,
    action_path: &'static str,
) -> RoleDescriptor {
    RoleDescriptor {
        name,
        body_part,
        action_path,
    }
}

const DESCRIPTORS: [RoleDescriptor; Role::COUNT] = [
    entry("Head", BodyPart::Head, "/actions/main/in/head"),
    entry("LeftHand", BodyPart::LeftController, "/actions/main/in/left_hand"),
    entry("RightHand", BodyPart::RightController, "/actions/main/in/right_hand"),
    entry("LeftFoot", BodyPart::LeftFoot, "/actions/main/in/left_foot"),
    entry("RightFoot", BodyPart::RightFoot, "/actions/main/in/right_foot"),
    entry("LeftShoulder", BodyPart::LeftShoulder, "/actions/main/in/left_shoulder"),
    entry("RightShoulder", BodyPart::RightShoulder, "/actions/main/in/right_shoulder"),
    entry("LeftElbow", BodyPart::LeftElbow, "/actions/main/in/left_elbow"),
    entry("RightElbow", BodyPart::RightElbow, "/actions/main/in/right_elbow"),
    entry("LeftKnee", BodyPart::LeftKnee, "/actions/main/in/left_knee"),
    entry("RightKnee", BodyPart::RightKnee, "/actions/main/in/right_knee"),
    entry("Waist", BodyPart::Waist, "/actions/main/in/waist"),
    entry("Chest", BodyPart::Chest, "/actions/main/in/chest"),
];

impl Role {
    pub const COUNT: usize = 13;

    /// All roles in table order
    pub const ALL: [Role; Role::COUNT] = [
        Role::Head,
        Role::LeftHand,
        Role::RightHand,
        Role::LeftFoot,
        Role::RightFoot,
        Role::LeftShoulder,
        Role::RightShoulder,
        Role::LeftElbow,
        Role::RightElbow,
        Role::LeftKnee,
        Role::RightKnee,
        Role::Waist,
        Role::Chest,
    ];

    /// Stable numeric identity (0..COUNT)
    pub fn id(self) -> usize {
        self as usize
    }

    pub fn descriptor(self) -> &'static RoleDescriptor {
        &DESCRIPTORS[self.id()]
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn body_part(self) -> BodyPart {
        self.descriptor().body_part
    }

    pub fn action_path(self) -> &'static str {
        self.descriptor().action_path
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Fixed-size map with exactly one entry per [`Role`]
#[derive(Debug, Clone, PartialEq)]
pub struct RoleMap<T>([T; Role::COUNT]);

impl<T> RoleMap<T> {
    /// Build a map by evaluating `f` once per role, in table order
    pub fn from_fn(mut f: impl FnMut(Role) -> T) -> Self {
        Self(std::array::from_fn(|i| f(Role::ALL[i])))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &T)> {
        Role::ALL.into_iter().zip(self.0.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Role, &mut T)> {
        Role::ALL.into_iter().zip(self.0.iter_mut())
    }
}

impl<T: Default> Default for RoleMap<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<Role> for RoleMap<T> {
    type Output = T;

    fn index(&self, role: Role) -> &T {
        &self.0[role.id()]
    }
}

impl<T> IndexMut<Role> for RoleMap<T> {
    fn index_mut(&mut self, role: Role) -> &mut T {
        &mut self.0[role.id()]
    }
}
