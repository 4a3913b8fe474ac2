//! Per-domain execution driver.
//!
//! A [`DomainTransform`] only knows how to turn one mesh chunk into zero or
//! more output chunks. [`StreamingExecutor`] walks an input tree depth-first,
//! calls the transform at each leaf, rebuilds the tree with the same
//! relative order, and tracks progress and the union of observed extents.
//! [`StreamingFilter`] glues the two into a pipeline [`Filter`].

use crate::data::{DataObject, DataObjectInformation, DataTree, MeshHandle};
use crate::error::{FlowError, FlowResult};
use crate::pipeline::contract::Contract;
use crate::pipeline::filter::{Filter, NodeContext};
use crate::types::{DomainId, Extents};

/// The per-domain part of a streaming filter.
pub trait DomainTransform: Send {
    fn name(&self) -> &str;

    fn modify_contract(&mut self, contract: &Contract) -> FlowResult<Contract> {
        Ok(contract.clone())
    }

    /// Called once before the walk starts.
    fn pre_execute(&mut self, _contract: &Contract) -> FlowResult<()> {
        Ok(())
    }

    /// Transform one chunk. Returning [`DataTree::Empty`] drops the domain.
    fn execute_data_tree(&mut self, mesh: &MeshHandle, domain: DomainId, label: &str) -> FlowResult<DataTree>;

    /// Called once after the walk; may override the accumulated extents.
    fn post_execute(&mut self, _executor: &mut StreamingExecutor) {}

    fn update_data_object_info(&self, _input: &DataObjectInformation, _output: &mut DataObjectInformation) {}
}

/// Depth-first walk state plus extent accumulation.
#[derive(Debug, Default)]
pub struct StreamingExecutor {
    total_nodes: usize,
    current_node: usize,
    spatial_extents: Option<Extents>,
    data_extents: Option<Extents>,
    spatial_override: Option<Extents>,
    data_override: Option<Extents>,
}

impl StreamingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaves in the tree being walked.
    pub fn total_nodes(&self) -> usize {
        self.total_nodes
    }

    /// Leaves visited so far.
    pub fn current_node(&self) -> usize {
        self.current_node
    }

    /// Union of spatial extents over everything produced.
    pub fn accumulated_spatial_extents(&self) -> Option<&Extents> {
        self.spatial_extents.as_ref()
    }

    pub fn accumulated_data_extents(&self) -> Option<&Extents> {
        self.data_extents.as_ref()
    }

    pub fn override_true_spatial_extents(&mut self, extents: Extents) {
        self.spatial_override = Some(extents);
    }

    pub fn override_true_data_extents(&mut self, extents: Extents) {
        self.data_override = Some(extents);
    }

    fn reset(&mut self, total: usize) {
        *self = Self {
            total_nodes: total,
            ..Self::default()
        };
    }

    /// Walk `input`, calling `transform` per leaf.
    ///
    /// `variable` names the array whose range feeds the data extents.
    /// `progress` is told `(current, total)` after every leaf.
    pub fn stream<F, P>(
        &mut self,
        input: &DataTree,
        variable: &str,
        mut transform: F,
        mut progress: P,
    ) -> FlowResult<DataTree>
    where
        F: FnMut(&MeshHandle, DomainId, &str) -> FlowResult<DataTree>,
        P: FnMut(usize, usize),
    {
        self.reset(input.number_of_leaves());
        self.walk(input, variable, &mut transform, &mut progress)
    }

    fn walk<F, P>(&mut self, tree: &DataTree, variable: &str, transform: &mut F, progress: &mut P) -> FlowResult<DataTree>
    where
        F: FnMut(&MeshHandle, DomainId, &str) -> FlowResult<DataTree>,
        P: FnMut(usize, usize),
    {
        match tree {
            DataTree::Empty => Ok(DataTree::Empty),
            DataTree::Leaf(rep) => {
                let mesh = rep.mesh().ok_or_else(|| {
                    FlowError::domain(rep.domain(), "mesh was released before streaming")
                })?;
                let out = transform(mesh, rep.domain(), rep.label())?;
                self.current_node += 1;
                self.accumulate(&out, variable);
                progress(self.current_node, self.total_nodes);
                Ok(out)
            }
            DataTree::Node(children) => {
                let mut out = Vec::with_capacity(children.len());
                for child in children {
                    out.push(self.walk(child, variable, transform, progress)?);
                }
                Ok(DataTree::from_children(out))
            }
        }
    }

    fn accumulate(&mut self, produced: &DataTree, variable: &str) {
        for leaf in produced.leaves() {
            match &mut self.spatial_extents {
                Some(e) => e.merge(leaf.spatial_extents()),
                None => self.spatial_extents = Some(leaf.spatial_extents().clone()),
            }
            let range = leaf
                .mesh()
                .and_then(|m| m.array(variable))
                .and_then(|a| a.data_range());
            if let Some([lo, hi]) = range {
                let r = Extents::scalar(lo, hi);
                match &mut self.data_extents {
                    Some(e) => e.merge(&r),
                    None => self.data_extents = Some(r),
                }
            }
        }
    }

    /// Write true extents into `info`, preferring overrides.
    pub fn stamp(&self, info: &mut DataObjectInformation) {
        info.attributes.true_spatial_extents = self
            .spatial_override
            .clone()
            .or_else(|| self.spatial_extents.clone());
        info.attributes.true_data_extents = self
            .data_override
            .clone()
            .or_else(|| self.data_extents.clone());
        if let Some(e) = &info.attributes.true_spatial_extents {
            info.attributes.spatial_dimension = e.dimension();
        }
    }
}

/// A [`Filter`] that streams its input through a [`DomainTransform`].
pub struct StreamingFilter<T: DomainTransform> {
    transform: T,
    executor: StreamingExecutor,
}

impl<T: DomainTransform> StreamingFilter<T> {
    pub fn new(transform: T) -> Self {
        Self {
            transform,
            executor: StreamingExecutor::new(),
        }
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut T {
        &mut self.transform
    }

    pub fn executor(&self) -> &StreamingExecutor {
        &self.executor
    }
}

impl<T: DomainTransform> Filter for StreamingFilter<T> {
    fn name(&self) -> &str {
        self.transform.name()
    }

    fn modify_contract(&mut self, contract: &Contract) -> FlowResult<Contract> {
        self.transform.modify_contract(contract)
    }

    fn execute(&mut self, ctx: &NodeContext) -> FlowResult<DataObject> {
        let Self { transform, executor } = self;
        let name = transform.name().to_string();
        let input = ctx.input(&name)?;
        let tree = input.tree(&name)?;

        transform.pre_execute(ctx.contract)?;
        let streaming = ctx.contract.flags.use_streaming;
        let out = executor.stream(
            tree,
            &ctx.contract.request.variable,
            |mesh, domain, label| transform.execute_data_tree(mesh, domain, label),
            |current, total| {
                if streaming || current == total {
                    ctx.engine.progress(&name, current, total);
                }
            },
        )?;
        transform.post_execute(executor);

        let mut info = input.info.derive();
        executor.stamp(&mut info);
        tracing::debug!(
            "{} streamed {} of {} domains",
            name,
            out.number_of_leaves(),
            executor.total_nodes()
        );
        Ok(DataObject::dataset(out, info))
    }

    fn update_data_object_info(&self, input: &DataObjectInformation, output: &mut DataObjectInformation) {
        self.transform.update_data_object_info(input, output);
    }
}
