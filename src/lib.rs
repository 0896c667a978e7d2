//! # connected-body
//!
//! Attach-time composition of reusable kinematic sub-assemblies ("connected
//! bodies") into a host robot.
//!
//! A [`ConnectedBodyInfo`] describes a gripper, tool or sensor head by its own
//! local names. Attaching it to a [`Robot`] and computing the hierarchy splices
//! renamed copies of its links, joints, manipulators, attached sensors and
//! gripper descriptors into the host, with every internal cross-reference
//! rewritten to the new names. Releasing the hierarchy removes exactly those
//! entities again, so the same body can be re-attached, swapped or toggled.
//!
//! ```
//! use connected_body::{ConnectedBodyInfo, JointInfo, JointType, LinkInfo, Robot, TripleActivation};
//!
//! let mut robot = Robot::new("arm");
//! robot.body().borrow_mut().add_link(LinkInfo::new("flange"));
//!
//! let mut gripper = ConnectedBodyInfo::new("g", "flange");
//! gripper.links.push(LinkInfo::new("palm"));
//! gripper.links.push(LinkInfo::new("finger"));
//! gripper.joints.push(JointInfo::new("slide", JointType::Prismatic, "palm", "finger"));
//! gripper.activation = TripleActivation::Active;
//!
//! robot.add_connected_body(gripper, false).unwrap();
//! robot.compute_hierarchy().unwrap();
//! assert!(robot.body().borrow().link("g_finger").is_some());
//! ```

mod composer;
pub mod config;
pub mod connected_body_info;
mod decomposer;
pub mod descriptor;
pub mod error;
pub mod handle;
pub mod json;
pub mod kinbody;
pub mod naming;
pub mod pose;
pub mod robot;

pub use config::*;
pub use connected_body_info::*;
pub use descriptor::*;
pub use error::*;
pub use handle::*;
pub use kinbody::*;
pub use pose::*;
pub use robot::*;
