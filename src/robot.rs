//! A host robot together with the connected bodies attached to it.

use crate::config::ConnectedBodyConfig;
use crate::connected_body_info::{ConnectedBodyInfo, TripleActivation};
use crate::error::{ConnectedBodyError, Result};
use crate::handle::ConnectedBody;
use crate::kinbody::KinBody;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// A host kinematic body plus its ordered connected bodies.
///
/// The robot owns its connected bodies; each of them only keeps a weak
/// reference to the shared [`KinBody`].
#[derive(Debug)]
pub struct Robot {
    pub(crate) body: Rc<RefCell<KinBody>>,
    pub(crate) connected_bodies: Vec<ConnectedBody>,
    pub(crate) config: ConnectedBodyConfig,
}

impl Robot {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, ConnectedBodyConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: ConnectedBodyConfig) -> Self {
        Self::from_body(KinBody::new(name), config)
    }

    /// Wraps an already populated body.
    pub fn from_body(body: KinBody, config: ConnectedBodyConfig) -> Self {
        Self {
            body: Rc::new(RefCell::new(body)),
            connected_bodies: Vec::new(),
            config,
        }
    }

    pub fn name(&self) -> String {
        self.body.borrow().name().to_string()
    }

    /// Shared handle to the live structure.
    pub fn body(&self) -> &Rc<RefCell<KinBody>> {
        &self.body
    }

    pub fn config(&self) -> &ConnectedBodyConfig {
        &self.config
    }

    pub fn is_hierarchy_computed(&self) -> bool {
        self.body.borrow().is_hierarchy_computed()
    }

    // --- CONNECTED BODIES ---

    pub fn connected_bodies(&self) -> &[ConnectedBody] {
        &self.connected_bodies
    }

    pub fn connected_body(&self, name: &str) -> Option<&ConnectedBody> {
        self.connected_bodies.iter().find(|cb| cb.name() == name)
    }

    pub fn connected_body_mut(&mut self, name: &str) -> Option<&mut ConnectedBody> {
        self.connected_bodies.iter_mut().find(|cb| cb.name() == name)
    }

    /// Attaches a new connected body.
    ///
    /// With `remove_duplicate`, a body of the same name is replaced in place;
    /// without it a duplicate name is an error. Rejected while the hierarchy is
    /// computed.
    pub fn add_connected_body(
        &mut self,
        info: ConnectedBodyInfo,
        remove_duplicate: bool,
    ) -> Result<&mut ConnectedBody> {
        self.ensure_mutable("add connected body")?;
        if info.name.is_empty() {
            return Err(ConnectedBodyError::EmptyName {
                robot: self.name(),
                link: info.link_name,
            });
        }

        let existing = self
            .connected_bodies
            .iter()
            .position(|cb| cb.name() == info.name);
        if existing.is_some() && !remove_duplicate {
            return Err(ConnectedBodyError::DuplicateBody {
                robot: self.name(),
                body: info.name,
            });
        }

        let connected = ConnectedBody::new(
            Rc::downgrade(&self.body),
            info,
            self.config.transform_epsilon,
        )?;
        debug!(
            "robot {} attaching connected body {} to link {}",
            self.name(),
            connected.name(),
            connected.info().link_name
        );
        let index = match existing {
            Some(index) => {
                self.connected_bodies[index] = connected;
                index
            }
            None => {
                self.connected_bodies.push(connected);
                self.connected_bodies.len() - 1
            }
        };
        Ok(&mut self.connected_bodies[index])
    }

    /// Detaches the named connected body. Returns whether it existed.
    pub fn remove_connected_body(&mut self, name: &str) -> Result<bool> {
        self.ensure_mutable("remove connected body")?;
        let before = self.connected_bodies.len();
        self.connected_bodies.retain(|cb| cb.name() != name);
        Ok(before != self.connected_bodies.len())
    }

    pub fn connected_body_active_states(&self) -> Vec<TripleActivation> {
        self.connected_bodies.iter().map(|cb| cb.activation()).collect()
    }

    /// Sets the activation of every connected body, in attachment order.
    /// Returns whether any of them changed. Nothing is applied unless every
    /// state is accepted.
    pub fn set_connected_body_active_states(&mut self, states: &[TripleActivation]) -> Result<bool> {
        if states.len() != self.connected_bodies.len() {
            return Err(ConnectedBodyError::ActivationCount {
                expected: self.connected_bodies.len(),
                actual: states.len(),
            });
        }
        for (cb, state) in self.connected_bodies.iter().zip(states) {
            cb.check_activation(*state)?;
        }
        let mut changed = false;
        for (cb, state) in self.connected_bodies.iter_mut().zip(states) {
            changed |= cb.set_active(*state)?;
        }
        Ok(changed)
    }

    // --- HIERARCHY ---

    /// Splices every active connected body into the structure and marks the
    /// hierarchy as computed.
    pub fn compute_hierarchy(&mut self) -> Result<()> {
        if self.is_hierarchy_computed() {
            return Ok(());
        }
        self.compute_connected_bodies_information()?;
        self.body.borrow_mut().set_hierarchy_computed(true);
        Ok(())
    }

    /// Removes every spliced entity and clears the computed flag, e.g. before
    /// leaving an environment.
    pub fn release_hierarchy(&mut self) {
        self.body.borrow_mut().set_hierarchy_computed(false);
        self.deinitialize_connected_bodies_information();
    }

    fn ensure_mutable(&self, action: &str) -> Result<()> {
        if self.is_hierarchy_computed() {
            return Err(ConnectedBodyError::HierarchyComputed {
                robot: self.name(),
                action: action.to_string(),
            });
        }
        Ok(())
    }
}
