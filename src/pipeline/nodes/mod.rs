//! Built-in pipeline nodes.

mod box_clip;
mod domain_select;
mod variable_transform;

pub use box_clip::BoxClip;
pub use domain_select::DomainSelectFilter;
pub use variable_transform::VariableTransform;
