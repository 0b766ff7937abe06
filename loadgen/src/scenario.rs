//! The immutable description of what every virtual user does.

use std::sync::Arc;

use crate::config::{Config, RequestConfig};
use crate::error::Result;
use crate::pacing::Pacing;
use crate::records::RecordSource;
use crate::registry::ActionRegistry;
use crate::requests::{CreateRequest, DetailRequest, ListRequest};
use crate::selector::WeightedSelector;

/// The one-time setup step of a virtual user.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Setup {
    /// Label the setup request is recorded under.
    pub label: String,
    /// Path of the collection to fetch reference identifiers from.
    pub path: String,
}

/// Setup, actions and pacing shared read-only by all virtual users of a run.
#[derive(Debug)]
pub struct Scenario {
    setup: Option<Setup>,
    selector: WeightedSelector,
    pacing: Pacing,
}

impl Scenario {
    /// Creates a scenario from its parts.
    pub fn new(setup: Option<Setup>, registry: ActionRegistry, pacing: Pacing) -> Result<Self> {
        Ok(Self {
            setup,
            selector: WeightedSelector::new(Arc::new(registry))?,
            pacing,
        })
    }

    /// Builds the scenario described by the configuration.
    ///
    /// `create` actions take their request bodies from `records`.
    pub fn from_config(config: &Config, records: Arc<dyn RecordSource>) -> Result<Self> {
        let pacing = Pacing::new(config.wait.min, config.wait.max)?;

        let mut registry = ActionRegistry::builder();
        for action in &config.actions {
            registry = match &action.request {
                RequestConfig::List { path } => {
                    registry.action(&action.name, action.weight, ListRequest::new(path))
                }
                RequestConfig::Detail { path } => {
                    registry.action(&action.name, action.weight, DetailRequest::new(path))
                }
                RequestConfig::Create { path } => registry.action(
                    &action.name,
                    action.weight,
                    CreateRequest::new(path, Arc::clone(&records)),
                ),
            };
        }

        let setup = config.setup.as_ref().map(|setup| Setup {
            label: setup.name.clone(),
            path: setup.path.clone(),
        });

        Self::new(setup, registry.build()?, pacing)
    }

    /// The setup step, if users fetch reference data.
    pub fn setup(&self) -> Option<&Setup> {
        self.setup.as_ref()
    }

    /// The action selector.
    pub fn selector(&self) -> &WeightedSelector {
        &self.selector
    }

    /// The pacing between actions.
    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }
}
