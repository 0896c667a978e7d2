//! Error types for connected-body composition.

use thiserror::Error;

/// Coarse classification of a [`ConnectedBodyError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or unresolvable descriptor content.
    InvalidArguments,
    /// The host is in a structural state that forbids the operation.
    InvalidState,
}

/// Errors raised while attaching, merging or updating connected bodies.
#[derive(Debug, Error)]
pub enum ConnectedBodyError {
    /// The connected body's back-reference to its host is gone.
    #[error("no valid robot is given for connected body '{body}'")]
    MissingRobot {
        /// Name of the connected body.
        body: String,
    },

    /// The attach link does not exist on the host.
    #[error("link '{link}' to which connected body '{body}' is attached does not exist in robot '{robot}'")]
    MissingAttachLink {
        /// Name of the connected body.
        body: String,
        /// Host robot name.
        robot: String,
        /// Attach link name.
        link: String,
    },

    /// A connected body without a name was added or merged.
    #[error("connected body attached to link '{link}' of robot '{robot}' has no name")]
    EmptyName {
        /// Host robot name.
        robot: String,
        /// Attach link name.
        link: String,
    },

    /// Two connected bodies of the same host share a name.
    #[error("robot '{robot}' has two connected bodies named '{body}'")]
    DuplicateBody {
        /// Host robot name.
        robot: String,
        /// Duplicated connected body name.
        body: String,
    },

    /// A cross-reference inside a connected body could not be resolved.
    #[error("connected body '{body}' of robot '{robot}': {entity} could not find {reference} '{target}' in its own descriptors")]
    UnresolvedReference {
        /// Name of the connected body.
        body: String,
        /// Host robot name.
        robot: String,
        /// The entity holding the reference, e.g. `joint 'j1'`.
        entity: String,
        /// What kind of reference failed, e.g. `linkname0`.
        reference: &'static str,
        /// The unresolved name.
        target: String,
    },

    /// A manipulator was contributed to a host without any link to use as base.
    #[error("connected body '{body}' of robot '{robot}': no base link for manipulator '{manipulator}'")]
    MissingBaseLink {
        /// Name of the connected body.
        body: String,
        /// Host robot name.
        robot: String,
        /// Resolved manipulator name.
        manipulator: String,
    },

    /// A resolved entity name collides with one already on the host.
    #[error("connected body '{body}' of robot '{robot}' resolved {category} name '{name}' which already exists")]
    NameCollision {
        /// Name of the connected body.
        body: String,
        /// Host robot name.
        robot: String,
        /// Entity category, e.g. `attached sensor`.
        category: &'static str,
        /// The colliding resolved name.
        name: String,
    },

    /// A replacement descriptor does not describe the same connected body.
    #[error("descriptor id '{actual}' does not match connected body id '{expected}'")]
    IdMismatch {
        /// Id of the live descriptor.
        expected: String,
        /// Id of the replacement descriptor.
        actual: String,
    },

    /// Activation vector length does not match the number of connected bodies.
    #[error("expected {expected} activation states, got {actual}")]
    ActivationCount {
        /// Number of connected bodies.
        expected: usize,
        /// Number of supplied states.
        actual: usize,
    },

    /// An `isActive` value outside `-1..=1`.
    #[error("invalid activation value {0}, expected -1, 0 or 1")]
    InvalidActivation(i64),

    /// A JSON document did not have the expected shape.
    #[error("malformed connected body document: {0}")]
    MalformedDocument(String),

    /// A JSON payload failed to decode into a descriptor.
    #[error("failed to decode {what}: {source}")]
    Decode {
        /// Which payload failed.
        what: &'static str,
        /// Underlying decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// Structural mutation attempted while the robot hierarchy is computed.
    #[error("cannot {action} while robot '{robot}' is added to the environment")]
    HierarchyComputed {
        /// Host robot name.
        robot: String,
        /// The rejected action.
        action: String,
    },
}

impl ConnectedBodyError {
    /// Classifies the error as argument or state related.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::HierarchyComputed { .. } => ErrorKind::InvalidState,
            _ => ErrorKind::InvalidArguments,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = ConnectedBodyError> = std::result::Result<T, E>;
