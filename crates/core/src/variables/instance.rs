use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use hl7_toolchain_profile::DEFAULT_MAX_INSTANCES;

use super::{InstanceOutput, VariableMatcher};
use crate::grammar::ast::Message;

/// A named set of substitution values, keyed by variable id.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Instance {
    /// Stable identifier, unique within a set.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Values keyed by full token text (e.g. `HELPERVARIABLE2`).
    #[serde(default)]
    pub variable_values: BTreeMap<String, String>,
}

impl Instance {
    /// Create an instance with no values.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            variable_values: BTreeMap::new(),
        }
    }

    /// Set the value for one variable id, replacing any previous value.
    pub fn set_value(&mut self, variable_id: impl Into<String>, value: impl Into<String>) {
        self.variable_values.insert(variable_id.into(), value.into());
    }

    /// Value for one variable id, if filled.
    pub fn value(&self, variable_id: &str) -> Option<&str> {
        self.variable_values.get(variable_id).map(String::as_str)
    }
}

/// Errors from managing an [`InstanceSet`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceError {
    /// The set already holds the maximum number of instances.
    #[error("instance limit reached ({max})")]
    LimitReached {
        /// Configured maximum.
        max: usize,
    },
    /// No instance carries the given id.
    #[error("instance '{0}' not found")]
    NotFound(String),
    /// Another instance already carries the given id.
    #[error("duplicate instance id '{0}'")]
    DuplicateId(String),
}

/// An ordered, bounded collection of instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSet {
    instances: Vec<Instance>,
    max: usize,
    next_seq: usize,
}

impl Default for InstanceSet {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INSTANCES)
    }
}

impl InstanceSet {
    /// Create an empty set holding at most `max` instances.
    pub fn new(max: usize) -> Self {
        Self {
            instances: Vec::new(),
            max,
            next_seq: 1,
        }
    }

    /// Build a set from existing instances, checking the limit and id uniqueness.
    pub fn from_instances(instances: Vec<Instance>, max: usize) -> Result<Self, InstanceError> {
        let mut set = Self::new(max);
        for instance in instances {
            set.insert(instance)?;
        }
        Ok(set)
    }

    /// Maximum number of instances.
    pub fn max(&self) -> usize {
        self.max
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Instances in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter()
    }

    /// Look up an instance by id.
    pub fn get(&self, id: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.id == id)
    }

    /// Add a fresh, empty instance with a generated id.
    ///
    /// `name` defaults to `Instance <n>`.
    pub fn add(&mut self, name: Option<&str>) -> Result<&Instance, InstanceError> {
        self.check_capacity()?;
        let (id, seq) = self.fresh_id();
        let name = name.map_or_else(|| format!("Instance {seq}"), str::to_string);
        self.push(Instance::new(id, name))
    }

    /// Insert a prepared instance.
    pub fn insert(&mut self, instance: Instance) -> Result<&Instance, InstanceError> {
        self.check_capacity()?;
        if self.get(&instance.id).is_some() {
            return Err(InstanceError::DuplicateId(instance.id));
        }
        self.push(instance)
    }

    /// Copy an instance's values into a new instance named `<name> (copy)`.
    pub fn duplicate(&mut self, id: &str) -> Result<&Instance, InstanceError> {
        self.check_capacity()?;
        let source = self
            .get(id)
            .ok_or_else(|| InstanceError::NotFound(id.to_string()))?;
        let name = format!("{} (copy)", source.name);
        let values = source.variable_values.clone();
        let (new_id, _) = self.fresh_id();
        self.push(Instance {
            id: new_id,
            name,
            variable_values: values,
        })
    }

    /// Change an instance's display name.
    pub fn rename(&mut self, id: &str, name: &str) -> Result<(), InstanceError> {
        self.get_mut(id)?.name = name.to_string();
        Ok(())
    }

    /// Remove an instance and return it.
    pub fn remove(&mut self, id: &str) -> Result<Instance, InstanceError> {
        let index = self
            .instances
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| InstanceError::NotFound(id.to_string()))?;
        Ok(self.instances.remove(index))
    }

    /// Set one variable value on one instance.
    pub fn set_value(
        &mut self,
        id: &str,
        variable_id: &str,
        value: &str,
    ) -> Result<(), InstanceError> {
        self.get_mut(id)?.set_value(variable_id, value);
        Ok(())
    }

    /// Generate output for every instance against one template.
    pub fn outputs(
        &self,
        matcher: &VariableMatcher,
        template: &Message,
    ) -> Vec<(String, InstanceOutput)> {
        self.instances
            .iter()
            .map(|i| {
                (
                    i.id.clone(),
                    matcher.compute_instance_output(&i.variable_values, template),
                )
            })
            .collect()
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn get_mut(&mut self, id: &str) -> Result<&mut Instance, InstanceError> {
        self.instances
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| InstanceError::NotFound(id.to_string()))
    }

    fn check_capacity(&self) -> Result<(), InstanceError> {
        if self.instances.len() >= self.max {
            return Err(InstanceError::LimitReached { max: self.max });
        }
        Ok(())
    }

    fn fresh_id(&mut self) -> (String, usize) {
        loop {
            let seq = self.next_seq;
            self.next_seq += 1;
            let id = format!("instance-{seq}");
            if self.get(&id).is_none() {
                return (id, seq);
            }
        }
    }

    fn push(&mut self, instance: Instance) -> Result<&Instance, InstanceError> {
        log::debug!("adding instance {}", instance.id);
        self.instances.push(instance);
        Ok(&self.instances[self.instances.len() - 1])
    }
}
