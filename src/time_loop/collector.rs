//! Collector that keeps every timestep's tree side by side.

use crate::data::{DataObject, DataObjectInformation, DataTree, DataTreeRef};
use crate::error::{FlowError, FlowResult};
use crate::time_loop::TimeLoopCollector;
use crate::types::Extents;

/// Combines timesteps into one tree with a child per timestep.
///
/// Leaves are relabelled `label@t<n>` so downstream consumers can tell the
/// timesteps apart.
#[derive(Debug, Default)]
pub struct CollectAllTimesteps {
    trees: Vec<(usize, DataTreeRef)>,
    info: Option<DataObjectInformation>,
}

impl CollectAllTimesteps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timesteps currently held.
    pub fn recorded(&self) -> usize {
        self.trees.len()
    }
}

impl TimeLoopCollector for CollectAllTimesteps {
    fn record(&mut self, timestep: usize, output: &DataObject) -> FlowResult<()> {
        let tree = output.tree("CollectAllTimesteps")?;
        if self.info.is_none() {
            self.info = Some(output.info.derive());
        }
        let extents = output.info.attributes.true_spatial_extents.as_ref();
        if let (Some(info), Some(e)) = (&mut self.info, extents) {
            match &mut info.attributes.true_spatial_extents {
                Some(acc) => acc.merge(e),
                None => info.attributes.true_spatial_extents = Some(e.clone()),
            }
        }
        // Shares the tree; nothing is copied.
        self.trees.push((timestep, tree.clone()));
        Ok(())
    }

    fn execute_all_timesteps(&mut self, valid_times: &[usize]) -> FlowResult<DataObject> {
        if self.trees.len() != valid_times.len() {
            return Err(FlowError::Config(format!(
                "collector holds {} timesteps, loop recorded {}",
                self.trees.len(),
                valid_times.len()
            )));
        }
        let children = self
            .trees
            .iter()
            .map(|(t, tree)| tree.relabel(&|rep| format!("{}@t{}", rep.label(), t)))
            .collect();
        let mut info = self.info.take().unwrap_or_default();
        info.attributes.timestep = valid_times.first().copied().unwrap_or(0);
        if info.attributes.true_spatial_extents.is_none() {
            info.attributes.true_spatial_extents = self
                .trees
                .iter()
                .filter_map(|(_, tree)| tree.spatial_extents())
                .reduce(|mut acc: Extents, e| {
                    acc.merge(&e);
                    acc
                });
        }
        info.validity.mark_current();
        Ok(DataObject::dataset(DataTree::merge(children), info))
    }

    fn release_data(&mut self) {
        self.trees.clear();
        self.info = None;
    }
}
