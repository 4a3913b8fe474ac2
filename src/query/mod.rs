//! Queries that need a global reduction before they can finish.
//!
//! ```text
//! PreExecute -> Pass1 (per domain) -> MidExecute (all-reduce)
//!            -> Pass2 (per domain) -> PostExecute (all-reduce)
//! ```
//!
//! Both passes must visit the same domains in the same order, otherwise the
//! pass-2 contributions no longer line up with the pass-1 reduction.

pub mod compactness;

pub use compactness::CompactnessQuery;

use crate::composite::Communicator;
use crate::data::{DataTree, MeshHandle};
use crate::error::{FlowError, FlowResult, ResultExt};
use crate::pipeline::{Contract, NodeId, Pipeline};
use crate::types::DomainId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryPhase {
    #[default]
    PreExecute,
    Pass1,
    MidExecute,
    Pass2,
    PostExecute,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub name: String,
    pub values: Vec<f64>,
    pub message: String,
}

pub trait TwoPassQuery {
    fn name(&self) -> &str;

    /// Reset per-run state.
    fn pre_execute(&mut self) {}

    fn execute_pass1(&mut self, mesh: &MeshHandle, domain: DomainId) -> FlowResult<()>;

    /// This rank's pass-1 contribution, summed element-wise across ranks.
    fn pass1_partials(&self) -> Vec<f64>;

    /// Receive the global pass-1 sums.
    fn mid_execute(&mut self, global: &[f64]) -> FlowResult<()>;

    fn execute_pass2(&mut self, mesh: &MeshHandle, domain: DomainId) -> FlowResult<()>;

    fn pass2_partials(&self) -> Vec<f64>;

    fn post_execute(&mut self, global: &[f64]) -> FlowResult<QueryResult>;
}

/// Drives a [`TwoPassQuery`] over dataset trees.
pub struct TwoPassDatasetQuery<Q: TwoPassQuery> {
    query: Q,
    phase: QueryPhase,
    pass1_order: Vec<DomainId>,
}

impl<Q: TwoPassQuery> TwoPassDatasetQuery<Q> {
    pub fn new(query: Q) -> Self {
        Self {
            query,
            phase: QueryPhase::PreExecute,
            pass1_order: Vec::new(),
        }
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn phase(&self) -> QueryPhase {
        self.phase
    }

    /// Run both passes over the same tree.
    pub fn perform(&mut self, tree: &DataTree, comm: &dyn Communicator) -> FlowResult<QueryResult> {
        self.perform_passes(tree, tree, comm)
    }

    /// Run pass 1 over `pass1` and pass 2 over `pass2`.
    ///
    /// The trees must hold the same domains in the same order.
    pub fn perform_passes(
        &mut self,
        pass1: &DataTree,
        pass2: &DataTree,
        comm: &dyn Communicator,
    ) -> FlowResult<QueryResult> {
        let name = self.query.name().to_string();
        self.phase = QueryPhase::PreExecute;
        self.pass1_order.clear();
        self.query.pre_execute();

        self.phase = QueryPhase::Pass1;
        for leaf in pass1.leaves() {
            let mesh = leaf
                .mesh()
                .ok_or_else(|| FlowError::domain(leaf.domain(), "mesh was released before the query"))?;
            self.query
                .execute_pass1(mesh, leaf.domain())
                .with_context(|| format!("{} pass 1", name))?;
            self.pass1_order.push(leaf.domain());
        }

        self.phase = QueryPhase::MidExecute;
        let global = comm.all_reduce_sum(&self.query.pass1_partials())?;
        self.query.mid_execute(&global)?;

        self.phase = QueryPhase::Pass2;
        let mut visited = 0;
        for leaf in pass2.leaves() {
            if self.pass1_order.get(visited) != Some(&leaf.domain()) {
                return Err(FlowError::Config(format!(
                    "{}: pass 2 visited domain {} at position {}, pass 1 did not",
                    name,
                    leaf.domain(),
                    visited
                )));
            }
            let mesh = leaf
                .mesh()
                .ok_or_else(|| FlowError::domain(leaf.domain(), "mesh was released before the query"))?;
            self.query
                .execute_pass2(mesh, leaf.domain())
                .with_context(|| format!("{} pass 2", name))?;
            visited += 1;
        }
        if visited != self.pass1_order.len() {
            return Err(FlowError::Config(format!(
                "{}: pass 2 visited {} domains, pass 1 visited {}",
                name,
                visited,
                self.pass1_order.len()
            )));
        }

        self.phase = QueryPhase::PostExecute;
        let global = comm.all_reduce_sum(&self.query.pass2_partials())?;
        let result = self.query.post_execute(&global)?;
        self.phase = QueryPhase::Done;
        tracing::info!("{}", result.message);
        Ok(result)
    }

    /// Pull `node` for each pass under one fixed contract.
    pub fn perform_on_pipeline(
        &mut self,
        pipeline: &mut Pipeline,
        node: NodeId,
        contract: &Contract,
        comm: &dyn Communicator,
    ) -> FlowResult<QueryResult> {
        let name = self.query.name().to_string();
        let first = pipeline.update(node, contract)?.tree(&name)?.clone();
        // Normally a no-op: the pipeline is already current for `contract`.
        let second = pipeline.update(node, contract)?.tree(&name)?.clone();
        self.perform_passes(&first, &second, comm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::SerialCommunicator;
    use crate::data::SyntheticDatabase;
    use crate::pipeline::DatabaseReader;

    /// Counts domains in pass 1 and echoes the global count in pass 2.
    #[derive(Default)]
    struct CountQuery {
        seen: f64,
        global: f64,
        second: f64,
    }

    impl TwoPassQuery for CountQuery {
        fn name(&self) -> &str {
            "Count"
        }
        fn pre_execute(&mut self) {
            *self = Self::default();
        }
        fn execute_pass1(&mut self, _mesh: &MeshHandle, _domain: DomainId) -> FlowResult<()> {
            self.seen += 1.0;
            Ok(())
        }
        fn pass1_partials(&self) -> Vec<f64> {
            vec![self.seen]
        }
        fn mid_execute(&mut self, global: &[f64]) -> FlowResult<()> {
            self.global = global[0];
            Ok(())
        }
        fn execute_pass2(&mut self, _mesh: &MeshHandle, _domain: DomainId) -> FlowResult<()> {
            self.second += self.global;
            Ok(())
        }
        fn pass2_partials(&self) -> Vec<f64> {
            vec![self.second]
        }
        fn post_execute(&mut self, global: &[f64]) -> FlowResult<QueryResult> {
            Ok(QueryResult {
                name: "Count".into(),
                values: global.to_vec(),
                message: format!("{}", global[0]),
            })
        }
    }

    fn tree(domains: &[DomainId]) -> DataTree {
        let mut db = SyntheticDatabase::new_2d(4, 1, 1, 1);
        DataTree::from_children(
            domains
                .iter()
                .map(|&d| DataTree::leaf(db.get_mesh(0, d, "mesh").unwrap(), d, "mesh"))
                .collect(),
        )
    }

    #[test]
    fn test_phases_run_in_order() {
        let mut q = TwoPassDatasetQuery::new(CountQuery::default());
        let result = q.perform(&tree(&[0, 1, 2]), &SerialCommunicator).unwrap();
        assert_eq!(result.values, vec![9.0]);
        assert_eq!(q.phase(), QueryPhase::Done);
    }

    #[test]
    fn test_pass2_order_must_match() {
        let mut q = TwoPassDatasetQuery::new(CountQuery::default());
        let err = q
            .perform_passes(&tree(&[0, 1, 2]), &tree(&[0, 2, 1]), &SerialCommunicator)
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(q.phase(), QueryPhase::Pass2);

        let err = q
            .perform_passes(&tree(&[0, 1, 2]), &tree(&[0, 1]), &SerialCommunicator)
            .unwrap_err();
        assert!(err.to_string().contains("visited 2 domains"));
    }

    #[test]
    fn test_released_mesh_is_a_domain_error() {
        let mut t = tree(&[3]);
        t.release_data();
        let mut q = TwoPassDatasetQuery::new(CountQuery::default());
        assert!(q.perform(&t, &SerialCommunicator).unwrap_err().is_recoverable());
    }
}
