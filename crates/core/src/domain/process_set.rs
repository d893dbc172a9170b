// Process Set - validated, ordered collection of ProcessSpec

use std::collections::HashSet;

use crate::domain::error::{DomainError, Result};
use crate::domain::process_spec::{ExecMode, ProcessSpec};

/// Ordered list of process specs with unique names
#[derive(Debug, Clone, Default)]
pub struct ProcessSet {
    specs: Vec<ProcessSpec>,
}

impl ProcessSet {
    /// Validate and build a process set
    ///
    /// # Errors
    /// - `DomainError::ValidationError` for an empty name or command
    /// - `DomainError::DuplicateName` if two specs share a name
    /// - `DomainError::UnsupportedExecMode` for cluster mode
    pub fn new(specs: Vec<ProcessSpec>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(specs.len());

        for spec in &specs {
            if spec.name().trim().is_empty() {
                return Err(DomainError::ValidationError(
                    "process name must not be empty".to_string(),
                ));
            }
            if spec.command().trim().is_empty() {
                return Err(DomainError::ValidationError(format!(
                    "process '{}' has an empty command",
                    spec.name()
                )));
            }
            if spec.exec_mode() != ExecMode::Fork {
                return Err(DomainError::UnsupportedExecMode {
                    name: spec.name().to_string(),
                    mode: spec.exec_mode().to_string(),
                });
            }
            if !seen.insert(spec.name()) {
                return Err(DomainError::DuplicateName(spec.name().to_string()));
            }
        }

        Ok(Self { specs })
    }

    /// Keep only the named specs, preserving configuration order
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Self> {
        if let Some(unknown) = names
            .iter()
            .map(AsRef::as_ref)
            .find(|n| self.get(n).is_none())
        {
            return Err(DomainError::UnknownName(unknown.to_string()));
        }

        let specs = self
            .specs
            .iter()
            .filter(|s| names.iter().any(|n| n.as_ref() == s.name()))
            .cloned()
            .collect();

        Ok(Self { specs })
    }

    pub fn get(&self, name: &str) -> Option<&ProcessSpec> {
        self.specs.iter().find(|s| s.name() == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProcessSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl<'a> IntoIterator for &'a ProcessSet {
    type Item = &'a ProcessSpec;
    type IntoIter = std::slice::Iter<'a, ProcessSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
