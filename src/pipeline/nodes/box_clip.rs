//! BoxClip: keeps the part of each domain inside an axis-aligned box.
//!
//! With an interval tree attached, `modify_contract` also drops every domain
//! whose bounds cannot reach the box, so those are never read. Clipping works
//! cell by cell, so ghost zones are never requested upstream.

use crate::data::{DataTree, MeshHandle};
use crate::error::{FlowError, FlowResult};
use crate::pipeline::contract::Contract;
use crate::pipeline::streamer::{DomainTransform, StreamingFilter};
use crate::sil::IntervalTree;
use crate::types::{DomainId, Extents};
use std::sync::Arc;

pub struct BoxClip {
    bounds: Extents,
    interval_tree: Option<Arc<IntervalTree>>,
    clipped: usize,
}

impl BoxClip {
    pub fn new(bounds: Extents) -> Self {
        Self {
            bounds,
            interval_tree: None,
            clipped: 0,
        }
    }

    pub fn with_interval_tree(mut self, tree: Arc<IntervalTree>) -> Self {
        self.interval_tree = Some(tree);
        self
    }

    /// Wrap in a streaming filter ready for the pipeline.
    pub fn into_filter(self) -> StreamingFilter<Self> {
        StreamingFilter::new(self)
    }

    pub fn bounds(&self) -> &Extents {
        &self.bounds
    }

    /// Domains dropped entirely during the last execution.
    pub fn clipped_domains(&self) -> usize {
        self.clipped
    }
}

impl DomainTransform for BoxClip {
    fn name(&self) -> &str {
        "BoxClip"
    }

    fn modify_contract(&mut self, contract: &Contract) -> FlowResult<Contract> {
        if !self.bounds.is_valid() {
            return Err(FlowError::Config(format!("BoxClip bounds {} are empty", self.bounds)));
        }
        let upstream = contract.with_ghost_zones(false);
        let Some(tree) = &self.interval_tree else {
            return Ok(upstream);
        };
        let min: Vec<f64> = (0..self.bounds.dimension()).map(|a| self.bounds.min(a)).collect();
        let max: Vec<f64> = (0..self.bounds.dimension()).map(|a| self.bounds.max(a)).collect();
        let candidates = tree.get_domains_list_from_range(&min, &max)?;
        Ok(upstream.with_restriction(upstream.restriction.restrict_domains(&candidates)))
    }

    fn pre_execute(&mut self, _contract: &Contract) -> FlowResult<()> {
        self.clipped = 0;
        Ok(())
    }

    fn execute_data_tree(&mut self, mesh: &MeshHandle, domain: DomainId, label: &str) -> FlowResult<DataTree> {
        let kept = if mesh.bounds().overlaps(&self.bounds) {
            mesh.extract_box(&self.bounds)
        } else {
            None
        };
        match kept {
            Some(mesh) => Ok(DataTree::leaf(mesh, domain, label)),
            None => {
                tracing::trace!("BoxClip dropped domain {}", domain);
                self.clipped += 1;
                Ok(DataTree::Empty)
            }
        }
    }
}
