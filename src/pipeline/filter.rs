//! Node abstraction for the pipeline.
//!
//! Two kinds of node:
//! - **`DataSource`**: a pipeline head. Produces a data object from the
//!   contract alone.
//! - **`Filter`**: owns at most one upstream input. Narrows the contract
//!   on the way up and transforms the input on the way down.
//!
//! `AnyNode` wraps either so the pipeline arena can hold both uniformly.

use crate::data::{DataObject, DataObjectInformation, DataObjectType, DataTreeRef};
use crate::error::{FlowError, FlowResult};
use crate::pipeline::context::EngineContext;
use crate::pipeline::contract::Contract;
use crate::pipeline::id::NodeId;

/// Execution state of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterState {
    #[default]
    Idle,
    Executing,
    Done,
}

/// Everything a node sees during one `execute`.
pub struct NodeContext<'a> {
    /// The node being executed.
    pub node: NodeId,
    /// Output of the upstream node, `None` for sources.
    pub input: Option<&'a DataObject>,
    /// The contract this node was asked to satisfy.
    pub contract: &'a Contract,
    pub engine: &'a EngineContext,
}

impl<'a> NodeContext<'a> {
    pub fn input(&self, consumer: &str) -> FlowResult<&'a DataObject> {
        self.input
            .ok_or_else(|| FlowError::Config(format!("{} executed without an input", consumer)))
    }

    /// The input's dataset tree, or a type error naming `consumer`.
    pub fn input_tree(&self, consumer: &str) -> FlowResult<&'a DataTreeRef> {
        self.input(consumer)?.tree(consumer)
    }

    /// Information block of the input, or a blank one for sources.
    pub fn input_info(&self) -> DataObjectInformation {
        self.input.map(|i| i.info.clone()).unwrap_or_default()
    }
}

/// A unit of computation with zero or one upstream input.
pub trait Filter: Send {
    /// Human-readable name of this filter.
    fn name(&self) -> &str;

    /// Object type this filter accepts on its input.
    fn input_type(&self) -> DataObjectType {
        DataObjectType::Dataset
    }

    fn output_type(&self) -> DataObjectType {
        DataObjectType::Dataset
    }

    /// Derive the contract to send upstream. Called once per update, before
    /// anything executes. The returned restriction may only be narrower.
    fn modify_contract(&mut self, contract: &Contract) -> FlowResult<Contract> {
        Ok(contract.clone())
    }

    /// Produce exactly one output object.
    fn execute(&mut self, ctx: &NodeContext) -> FlowResult<DataObject>;

    /// Adjust the output's information after `execute`.
    fn update_data_object_info(&self, _input: &DataObjectInformation, _output: &mut DataObjectInformation) {}

    /// Drop anything cached between executions.
    fn release_data(&mut self) {}
}

/// Head of a pipeline.
pub trait DataSource: Send {
    fn name(&self) -> &str;

    fn output_type(&self) -> DataObjectType {
        DataObjectType::Dataset
    }

    fn execute(&mut self, ctx: &NodeContext) -> FlowResult<DataObject>;

    fn release_data(&mut self) {}
}

pub enum AnyNode {
    Source(Box<dyn DataSource>),
    Filter(Box<dyn Filter>),
}

impl AnyNode {
    pub fn name(&self) -> &str {
        match self {
            AnyNode::Source(n) => n.name(),
            AnyNode::Filter(n) => n.name(),
        }
    }

    /// Accepted input type, `None` for sources.
    pub fn input_type(&self) -> Option<DataObjectType> {
        match self {
            AnyNode::Source(_) => None,
            AnyNode::Filter(n) => Some(n.input_type()),
        }
    }

    pub fn output_type(&self) -> DataObjectType {
        match self {
            AnyNode::Source(n) => n.output_type(),
            AnyNode::Filter(n) => n.output_type(),
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self, AnyNode::Source(_))
    }

    pub fn execute(&mut self, ctx: &NodeContext) -> FlowResult<DataObject> {
        match self {
            AnyNode::Source(n) => n.execute(ctx),
            AnyNode::Filter(n) => n.execute(ctx),
        }
    }

    pub fn update_data_object_info(&self, input: &DataObjectInformation, output: &mut DataObjectInformation) {
        if let AnyNode::Filter(n) = self {
            n.update_data_object_info(input, output);
        }
    }

    pub fn release_data(&mut self) {
        match self {
            AnyNode::Source(n) => n.release_data(),
            AnyNode::Filter(n) => n.release_data(),
        }
    }
}

impl std::fmt::Debug for AnyNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnyNode::Source(n) => write!(f, "Source({})", n.name()),
            AnyNode::Filter(n) => write!(f, "Filter({})", n.name()),
        }
    }
}
