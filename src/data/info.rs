//! Attributes and validity flags that travel with every data object.

use crate::types::Extents;

/// Whether domains carry a layer of ghost cells from their neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GhostZoneState {
    #[default]
    None,
    Present,
}

/// Descriptive attributes of a data object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataAttributes {
    pub spatial_dimension: usize,
    pub topological_dimension: usize,
    pub ghost_zones: GhostZoneState,
    /// Extents observed over the data actually produced.
    pub true_spatial_extents: Option<Extents>,
    /// Extents known before execution (e.g. from database metadata).
    pub estimated_spatial_extents: Option<Extents>,
    pub true_data_extents: Option<Extents>,
    pub variables: Vec<String>,
    pub timestep: usize,
}

impl DataAttributes {
    /// Best known spatial extents, preferring the true ones.
    pub fn spatial_extents(&self) -> Option<&Extents> {
        self.true_spatial_extents
            .as_ref()
            .or(self.estimated_spatial_extents.as_ref())
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v == name)
    }

    pub fn add_variable(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.has_variable(&name) {
            self.variables.push(name);
        }
    }
}

/// Whether the information block can be trusted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataValidity {
    information_current: bool,
    error: Option<String>,
}

impl DataValidity {
    pub fn is_current(&self) -> bool {
        self.information_current
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn mark_current(&mut self) {
        self.information_current = true;
        self.error = None;
    }

    pub fn invalidate(&mut self) {
        self.information_current = false;
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.information_current = false;
        self.error = Some(message.into());
    }
}

/// Attributes plus validity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataObjectInformation {
    pub attributes: DataAttributes,
    pub validity: DataValidity,
}

impl DataObjectInformation {
    /// Stale information is flagged, never silently reused.
    pub fn invalidate(&mut self) {
        self.validity.invalidate();
    }

    pub fn is_current(&self) -> bool {
        self.validity.is_current()
    }

    /// Start a downstream block from an upstream one. Execution-specific
    /// results (true extents) are not inherited.
    pub fn derive(&self) -> Self {
        let mut attributes = self.attributes.clone();
        attributes.true_spatial_extents = None;
        attributes.true_data_extents = None;
        Self {
            attributes,
            validity: DataValidity::default(),
        }
    }
}
