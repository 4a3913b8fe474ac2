//! The request a sink hands upstream: what subset, which variables, and how
//! to execute.

use crate::error::FlowResult;
use crate::sil::SilRestriction;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared handle to a contract.
pub type ContractRef = Arc<Contract>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataRequest {
    pub variable: String,
    pub secondary_variables: Vec<String>,
}

impl DataRequest {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            secondary_variables: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFlags {
    pub use_streaming: bool,
    pub ghost_zones_needed: bool,
}

impl Default for ExecutionFlags {
    fn default() -> Self {
        Self {
            use_streaming: true,
            ghost_zones_needed: false,
        }
    }
}

/// Restriction plus data request plus execution flags.
///
/// Contracts are values. A filter that needs something different derives a
/// new contract from the one it was given and returns it upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub restriction: SilRestriction,
    pub request: DataRequest,
    pub flags: ExecutionFlags,
    pub pipeline_index: usize,
}

impl Contract {
    pub fn new(restriction: SilRestriction, variable: impl Into<String>) -> Self {
        Self {
            restriction,
            request: DataRequest::new(variable),
            flags: ExecutionFlags::default(),
            pipeline_index: 0,
        }
    }

    pub fn with_restriction(&self, restriction: SilRestriction) -> Self {
        Self {
            restriction,
            ..self.clone()
        }
    }

    pub fn with_timestep(&self, timestep: usize) -> Self {
        self.with_restriction(self.restriction.clone().with_timestep(timestep))
    }

    pub fn with_flags(&self, flags: ExecutionFlags) -> Self {
        Self {
            flags,
            ..self.clone()
        }
    }

    pub fn without_streaming(&self) -> Self {
        self.with_flags(ExecutionFlags {
            use_streaming: false,
            ..self.flags
        })
    }

    /// Ask sources for a layer of ghost cells around each domain.
    pub fn with_ghost_zones(&self, needed: bool) -> Self {
        self.with_flags(ExecutionFlags {
            ghost_zones_needed: needed,
            ..self.flags
        })
    }

    pub fn with_secondary_variable(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        let mut out = self.clone();
        if out.request.variable != name && !out.request.secondary_variables.contains(&name) {
            out.request.secondary_variables.push(name);
        }
        out
    }

    pub fn timestep(&self) -> usize {
        self.restriction.timestep()
    }

    /// Primary variable followed by secondaries.
    pub fn all_variables(&self) -> Vec<&str> {
        std::iter::once(self.request.variable.as_str())
            .chain(self.request.secondary_variables.iter().map(String::as_str))
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// Whether output produced for `other` satisfies `self`.
    ///
    /// Streaming changes how a filter runs, not what it produces, so it is
    /// ignored here. Ghost zones change the data itself.
    pub fn is_equivalent(&self, other: &Contract) -> bool {
        self.restriction == other.restriction
            && self.request == other.request
            && self.flags.ghost_zones_needed == other.flags.ghost_zones_needed
    }

    pub fn into_ref(self) -> ContractRef {
        Arc::new(self)
    }

    /// Encode for the process boundary.
    pub fn to_message(&self) -> FlowResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_message(bytes: &[u8]) -> FlowResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
