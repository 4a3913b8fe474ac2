//! Data model: mesh chunks, the recursive data tree, and the data objects
//! that flow between pipeline nodes.

pub mod info;
pub mod mesh;
pub mod object;
pub mod representation;
pub mod synthetic;
pub mod tree;

pub use info::{DataAttributes, DataObjectInformation, DataValidity, GhostZoneState};
pub use mesh::{Centering, DataArray, Mesh, MeshHandle, RectilinearMesh};
pub use object::{DataObject, DataObjectType, DataPayload};
pub use representation::DataRepresentation;
pub use synthetic::SyntheticDatabase;
pub use tree::{DataTree, DataTreeRef, Leaves};
