//! The pipeline node payload: a dataset tree, an image, or nothing.

use crate::composite::Image;
use crate::data::info::DataObjectInformation;
use crate::data::tree::{DataTree, DataTreeRef};
use crate::error::{FlowError, FlowResult};
use crate::pipeline::id::NodeId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Discriminant of [`DataPayload`], used to type-check sink wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataObjectType {
    Dataset,
    Image,
    Null,
}

/// Closed set of data object variants.
#[derive(Debug, Clone)]
pub enum DataPayload {
    Dataset(DataTreeRef),
    Image(Arc<Image>),
    Null,
}

/// Output of one node execution.
///
/// `source` names the producing node without owning it; re-execution is
/// requested through the pipeline, never through the object.
#[derive(Debug, Clone)]
pub struct DataObject {
    pub source: Option<NodeId>,
    pub info: DataObjectInformation,
    pub payload: DataPayload,
}

impl DataObject {
    pub fn dataset(tree: DataTree, info: DataObjectInformation) -> Self {
        Self {
            source: None,
            info,
            payload: DataPayload::Dataset(Arc::new(tree)),
        }
    }

    /// Wrap a tree already shared with another holder.
    pub fn shared_dataset(tree: DataTreeRef, info: DataObjectInformation) -> Self {
        Self {
            source: None,
            info,
            payload: DataPayload::Dataset(tree),
        }
    }

    pub fn image(image: Image, info: DataObjectInformation) -> Self {
        Self {
            source: None,
            info,
            payload: DataPayload::Image(Arc::new(image)),
        }
    }

    pub fn null() -> Self {
        Self {
            source: None,
            info: DataObjectInformation::default(),
            payload: DataPayload::Null,
        }
    }

    pub fn object_type(&self) -> DataObjectType {
        match self.payload {
            DataPayload::Dataset(_) => DataObjectType::Dataset,
            DataPayload::Image(_) => DataObjectType::Image,
            DataPayload::Null => DataObjectType::Null,
        }
    }

    /// The dataset tree, or a type error naming `consumer`.
    pub fn tree(&self, consumer: &str) -> FlowResult<&DataTreeRef> {
        match &self.payload {
            DataPayload::Dataset(tree) => Ok(tree),
            _ => Err(FlowError::TypeMismatch {
                sink: consumer.to_string(),
                expected: DataObjectType::Dataset,
                actual: self.object_type(),
            }),
        }
    }

    pub fn as_image(&self) -> Option<&Arc<Image>> {
        match &self.payload {
            DataPayload::Image(image) => Some(image),
            _ => None,
        }
    }

    /// Drop the payload's meshes if this is the last holder of the tree.
    pub fn release_data(&mut self) {
        if let DataPayload::Dataset(tree) = &mut self.payload {
            if let Some(tree) = Arc::get_mut(tree) {
                tree.release_data();
            }
        }
        self.info.invalidate();
    }
}
