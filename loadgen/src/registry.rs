//! The fixed table of actions a virtual user can pick from.

use std::fmt;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::http::Session;

/// Relative likelihood of an action being selected.
pub type Weight = u32;

/// What happened when an action ran to completion.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Execution {
    /// The request was sent and the service answered with success.
    Completed,
    /// The action had nothing to do this cycle, e.g. because there is no reference data.
    ///
    /// Skipped executions do not produce an outcome.
    Skipped,
}

/// One request/response cycle against the target service.
#[async_trait]
pub trait Execute: fmt::Debug + Send + Sync {
    /// Runs the action once on behalf of the user owning `session`.
    async fn execute(&self, session: &mut Session) -> Result<Execution>;
}

/// A labelled, weighted action.
#[derive(Debug)]
pub struct ActionEntry {
    label: String,
    weight: Weight,
    action: Box<dyn Execute>,
}

impl ActionEntry {
    /// The label outcomes of this action are aggregated under.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The relative weight of this action.
    pub fn weight(&self) -> Weight {
        self.weight
    }

    /// Executes the action once.
    pub async fn execute(&self, session: &mut Session) -> Result<Execution> {
        self.action.execute(session).await
    }
}

/// A builder for an [`ActionRegistry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: Vec<ActionEntry>,
}

impl RegistryBuilder {
    /// Adds an action. Actions keep the order in which they were added.
    pub fn action(
        mut self,
        label: impl Into<String>,
        weight: Weight,
        action: impl Execute + 'static,
    ) -> Self {
        self.entries.push(ActionEntry {
            label: label.into(),
            weight,
            action: Box::new(action),
        });
        self
    }

    /// Validates the weights and freezes the registry.
    pub fn build(self) -> Result<ActionRegistry> {
        if let Some(entry) = self.entries.iter().find(|entry| entry.weight == 0) {
            return Err(Error::InvalidWeight {
                label: entry.label.clone(),
            });
        }

        let total_weight = self
            .entries
            .iter()
            .map(|entry| u64::from(entry.weight))
            .sum();
        if total_weight == 0 {
            return Err(Error::NoActionsConfigured);
        }

        Ok(ActionRegistry {
            entries: self.entries,
            total_weight,
        })
    }
}

/// An immutable, ordered set of actions with positive weights.
///
/// A registry is never empty, and its total weight is always positive.
#[derive(Debug)]
pub struct ActionRegistry {
    entries: Vec<ActionEntry>,
    total_weight: u64,
}

impl ActionRegistry {
    /// Creates an empty [`RegistryBuilder`].
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// The sum of all weights.
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Iterates all actions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ActionEntry> {
        self.entries.iter()
    }

    /// The number of registered actions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`, see [`RegistryBuilder::build`].
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&ActionEntry> {
        self.entries.get(index)
    }
}
