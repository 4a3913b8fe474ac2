//! One mesh chunk plus the metadata that outlives it.

use crate::data::mesh::MeshHandle;
use crate::types::{DomainId, Extents};

/// Wraps exactly one mesh chunk with its domain index and label.
///
/// Immutable after construction except for [`release`](Self::release), which
/// drops the mesh but keeps the domain, label and cached spatial extents.
#[derive(Debug, Clone)]
pub struct DataRepresentation {
    mesh: Option<MeshHandle>,
    domain: DomainId,
    label: String,
    spatial_extents: Extents,
}

impl DataRepresentation {
    pub fn new(mesh: MeshHandle, domain: DomainId, label: impl Into<String>) -> Self {
        let spatial_extents = mesh.bounds();
        Self {
            mesh: Some(mesh),
            domain,
            label: label.into(),
            spatial_extents,
        }
    }

    /// The mesh, or `None` once released.
    pub fn mesh(&self) -> Option<&MeshHandle> {
        self.mesh.as_ref()
    }

    pub fn domain(&self) -> DomainId {
        self.domain
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn spatial_extents(&self) -> &Extents {
        &self.spatial_extents
    }

    pub fn is_released(&self) -> bool {
        self.mesh.is_none()
    }

    /// Drop the mesh to reclaim memory. Metadata is preserved.
    pub fn release(&mut self) {
        self.mesh = None;
    }

    /// Same chunk under a different label.
    pub fn relabeled(&self, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..self.clone()
        }
    }
}
