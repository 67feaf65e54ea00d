//! Model fallback: an ordered list of models to try when one fails.
//!
//! The turn engine keeps the set of models that already failed with a
//! retryable error and asks for the next usable one.

use std::collections::HashSet;

use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelFallback {
    models: Vec<String>,
}

impl ModelFallback {
    /// Build from models in priority order. Duplicates and blanks are dropped.
    pub fn new(models: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut seen = HashSet::new();
        let models = models
            .into_iter()
            .map(Into::into)
            .filter(|m: &String| !m.trim().is_empty() && seen.insert(m.clone()))
            .collect();
        Self { models }
    }

    /// Primary model followed by its fallbacks.
    pub fn with_primary(primary: impl Into<String>, fallbacks: &[String]) -> Self {
        Self::new(std::iter::once(primary.into()).chain(fallbacks.iter().cloned()))
    }

    /// Put a model at the front, e.g. an agent's preferred model.
    pub fn prefer(&self, model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(std::iter::once(model).chain(self.models.iter().cloned()))
    }

    /// The first model not yet excluded.
    pub fn next(&self, excluded: &HashSet<String>) -> Option<String> {
        let next = self.models.iter().find(|m| !excluded.contains(*m)).cloned();
        match &next {
            Some(model) if !excluded.is_empty() => {
                info!(model = %model, excluded = excluded.len(), "Falling back to next model");
            }
            Some(model) => debug!(model = %model, "Selected model"),
            None => debug!(excluded = excluded.len(), "No usable model left"),
        }
        next
    }

    pub fn primary(&self) -> Option<&str> {
        self.models.first().map(String::as_str)
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
