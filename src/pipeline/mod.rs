//! Pull-model data-flow pipeline.
//!
//! A sink asks for data by handing a [`Contract`] to [`Pipeline::update`].
//! The contract travels upstream through every filter's `modify_contract`,
//! where it may only be narrowed, and data flows back down one domain tree
//! per node.
//!
//! # Architecture
//!
//! ```text
//!            contract (narrowed on the way up)
//!   [DatabaseSource] ◄── [BoxClip] ◄── [VariableTransform] ◄── update()
//!   [DatabaseSource] ──► [BoxClip] ──► [VariableTransform] ──► DataObject
//!            data tree (one leaf per domain)
//! ```
//!
//! # Design
//!
//! - **Arena**: nodes live in a `Vec` and are addressed by [`NodeId`].
//! - **Memoization**: a node re-executes only when its contract changed or
//!   something upstream re-executed.
//! - **Composition**: streaming filters hold a [`StreamingExecutor`] and a
//!   [`DomainTransform`] instead of inheriting behaviour.
//! - **Explicit context**: warnings and progress go through [`EngineContext`].

pub mod context;
pub mod contract;
pub mod executor;
pub mod filter;
pub mod id;
pub mod nodes;
pub mod source;
pub mod streamer;

pub use context::{EngineBridge, EngineContext, EngineMessage};
pub use contract::{Contract, ContractRef, DataRequest, ExecutionFlags};
pub use executor::{NodeSlot, Pipeline};
pub use filter::{AnyNode, DataSource, Filter, FilterState, NodeContext};
pub use id::NodeId;
pub use nodes::{BoxClip, DomainSelectFilter, VariableTransform};
pub use source::{AuxiliaryData, DatabaseReader, DatabaseSource, SPATIAL_EXTENTS};
pub use streamer::{DomainTransform, StreamingExecutor, StreamingFilter};
