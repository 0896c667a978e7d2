//! Tunables for composition and change classification.

/// Configuration shared by the composer and the change classifier.
#[derive(Clone, Debug)]
pub struct ConnectedBodyConfig {
    /// Tolerance when comparing relative transforms of two descriptors.
    pub transform_epsilon: f32,
    /// Gripper metadata keys ending (case-insensitively) with one of these
    /// suffixes hold entity names that get the connected body prefix.
    pub reference_field_suffixes: Vec<String>,
    /// Appended to the name prefix to name the synthetic connectivity joint.
    pub dummy_joint_suffix: String,
}

impl Default for ConnectedBodyConfig {
    fn default() -> Self {
        Self {
            transform_epsilon: 1e-6,
            reference_field_suffixes: [
                "linkname",
                "linknames",
                "links", // legacy key
                "toolname",
                "toolnames",
                "jointname",
                "jointnames",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            dummy_joint_suffix: "_dummyconnectedbody__".to_string(),
        }
    }
}
