//! File-format reader boundary and the source node that drives it.
//!
//! A [`DatabaseReader`] exposes meshes, variables and auxiliary data per
//! (timestep, domain). [`DatabaseSource`] asks it for exactly what the
//! contract selects, once per (domain, variable, timestep), and assembles a
//! flat multi-domain tree in restriction order. Any caching of repeated
//! reads is the reader's business.

use crate::data::{
    DataArray, DataAttributes, DataObject, DataObjectInformation, DataTree, GhostZoneState, MeshHandle,
};
use crate::error::{FlowError, FlowResult, ResultExt};
use crate::pipeline::filter::{DataSource, NodeContext};
use crate::sil::IntervalTree;
use crate::types::{DomainId, Extents};
use std::any::Any;
use std::sync::Arc;

/// Opaque reader-owned payload.
pub type AuxiliaryData = Arc<dyn Any + Send + Sync>;

/// Auxiliary data kind holding `Vec<(DomainId, Extents)>`.
pub const SPATIAL_EXTENTS: &str = "SPATIAL_EXTENTS";

/// What every file-format plugin provides.
#[cfg_attr(test, mockall::automock)]
pub trait DatabaseReader: Send {
    fn mesh_name(&self) -> String;

    fn number_of_domains(&self) -> usize;

    fn number_of_timesteps(&self) -> usize;

    fn get_mesh(&mut self, timestep: usize, domain: DomainId, mesh_name: &str) -> FlowResult<MeshHandle>;

    fn get_var(&mut self, timestep: usize, domain: DomainId, var_name: &str) -> FlowResult<DataArray>;

    /// `Ok(None)` when the reader has no data of that kind.
    fn get_auxiliary_data(
        &mut self,
        timestep: usize,
        var_name: &str,
        domain: Option<DomainId>,
        kind: &str,
    ) -> FlowResult<Option<AuxiliaryData>>;
}

pub struct DatabaseSource {
    name: String,
    reader: Box<dyn DatabaseReader>,
    interval_tree: Option<Arc<IntervalTree>>,
}

impl DatabaseSource {
    pub fn new(reader: impl DatabaseReader + 'static) -> Self {
        Self::from_boxed(Box::new(reader))
    }

    pub fn from_boxed(reader: Box<dyn DatabaseReader>) -> Self {
        Self {
            name: format!("Database({})", reader.mesh_name()),
            reader,
            interval_tree: None,
        }
    }

    pub fn reader(&self) -> &dyn DatabaseReader {
        self.reader.as_ref()
    }

    pub fn number_of_domains(&self) -> usize {
        self.reader.number_of_domains()
    }

    pub fn number_of_timesteps(&self) -> usize {
        self.reader.number_of_timesteps()
    }

    /// The database's spatial index, built on first use and then shared.
    pub fn interval_tree(&mut self) -> FlowResult<Arc<IntervalTree>> {
        if let Some(tree) = &self.interval_tree {
            return Ok(tree.clone());
        }

        let mesh_name = self.reader.mesh_name();
        let aux = self
            .reader
            .get_auxiliary_data(0, &mesh_name, None, SPATIAL_EXTENTS)?
            .ok_or_else(|| {
                FlowError::Config(format!("reader for '{}' provides no spatial extents", mesh_name))
            })?;
        let extents = aux.downcast_ref::<Vec<(DomainId, Extents)>>().ok_or_else(|| {
            FlowError::Config(format!("{} auxiliary data has an unexpected type", SPATIAL_EXTENTS))
        })?;

        let dimension = extents.first().map_or(3, |(_, e)| e.dimension());
        let mut tree = IntervalTree::new(dimension);
        for (domain, e) in extents {
            tree.add_domain(*domain, e.clone())?;
        }
        tree.calculate();
        tracing::info!("Built interval tree for '{}' over {} domains", mesh_name, tree.number_of_domains());

        let tree = Arc::new(tree);
        self.interval_tree = Some(tree.clone());
        Ok(tree)
    }

    /// Forget everything derived from the open database.
    pub fn reopen(&mut self) {
        tracing::debug!("Reopening '{}'", self.reader.mesh_name());
        self.interval_tree = None;
    }

    fn read_domain(&mut self, timestep: usize, domain: DomainId, mesh_name: &str, variables: &[&str]) -> FlowResult<DataTree> {
        let mut mesh = self.reader.get_mesh(timestep, domain, mesh_name)?;
        for var in variables {
            let array = self.reader.get_var(timestep, domain, var)?;
            mesh = mesh.with_array(array);
        }
        Ok(DataTree::leaf(mesh, domain, mesh_name))
    }
}

impl DataSource for DatabaseSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, ctx: &NodeContext) -> FlowResult<DataObject> {
        let restriction = &ctx.contract.restriction;
        let timestep = ctx.contract.timestep();
        let mesh_name = self.reader.mesh_name();

        if restriction.mesh_name() != mesh_name {
            return Err(FlowError::Config(format!(
                "contract asks for mesh '{}', database has '{}'",
                restriction.mesh_name(),
                mesh_name
            )));
        }
        let count = self.reader.number_of_domains();
        if let Some(bad) = restriction.domains().find(|&d| d as usize >= count) {
            return Err(FlowError::Restriction(format!(
                "domain {} selected but '{}' has {} domains",
                bad, mesh_name, count
            )));
        }
        if let Some(tree) = &self.interval_tree {
            restriction.validate_against(tree)?;
        }

        let variables = ctx.contract.all_variables();
        let mut leaves = Vec::with_capacity(restriction.number_of_domains());
        for domain in restriction.domains() {
            let leaf = self
                .read_domain(timestep, domain, &mesh_name, &variables)
                .with_context(|| format!("{} at timestep {}", self.name, timestep))?;
            leaves.push(leaf);
        }
        let tree = DataTree::from_children(leaves);

        let first = tree.leaves().next().and_then(|l| l.mesh().cloned());
        let dimension = first.as_ref().map_or(0, |m| m.spatial_dimension());
        let mut attributes = DataAttributes {
            spatial_dimension: dimension,
            topological_dimension: dimension,
            estimated_spatial_extents: self.interval_tree.as_ref().and_then(|t| t.extents().cloned()),
            true_spatial_extents: tree.spatial_extents(),
            ghost_zones: if ctx.contract.flags.ghost_zones_needed {
                GhostZoneState::Present
            } else {
                GhostZoneState::None
            },
            timestep,
            ..Default::default()
        };
        for var in &variables {
            attributes.add_variable(*var);
        }

        tracing::debug!(
            "{} read {} domains at timestep {}",
            self.name,
            tree.number_of_leaves(),
            timestep
        );
        Ok(DataObject::dataset(
            tree,
            DataObjectInformation {
                attributes,
                ..Default::default()
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Centering, RectilinearMesh};
    use crate::pipeline::context::EngineContext;
    use crate::pipeline::contract::Contract;
    use crate::pipeline::id::NodeId;
    use crate::sil::SilRestriction;

    fn unit_mesh(domain: DomainId) -> MeshHandle {
        let x = domain as f64;
        Arc::new(RectilinearMesh::uniform(
            &Extents::from_ranges(vec![[x, x + 1.0], [0.0, 1.0]]),
            [1, 1, 0],
        ))
    }

    fn mock_reader(domains: usize) -> MockDatabaseReader {
        let mut reader = MockDatabaseReader::new();
        reader.expect_mesh_name().return_const("mesh".to_string());
        reader.expect_number_of_domains().return_const(domains);
        reader.expect_number_of_timesteps().return_const(1usize);
        reader
    }

    fn run(source: &mut DatabaseSource, contract: &Contract) -> FlowResult<DataObject> {
        let engine = EngineContext::default();
        let ctx = NodeContext {
            node: NodeId(0),
            input: None,
            contract,
            engine: &engine,
        };
        source.execute(&ctx)
    }

    #[test]
    fn test_reads_each_domain_and_variable_once() {
        let mut reader = mock_reader(4);
        for d in [1u32, 3] {
            reader
                .expect_get_mesh()
                .withf(move |t, dom, _| *t == 2 && *dom == d)
                .times(1)
                .returning(|_, dom, _| Ok(unit_mesh(dom)));
            reader
                .expect_get_var()
                .withf(move |t, dom, _| *t == 2 && *dom == d)
                .times(2)
                .returning(|_, _, name| Ok(DataArray::scalar(name, Centering::Zonal, vec![1.0])));
        }

        let mut source = DatabaseSource::new(reader);
        let contract = Contract::new(SilRestriction::new("mesh", [3, 1]).with_timestep(2), "pressure")
            .with_secondary_variable("density");
        let out = run(&mut source, &contract).unwrap();

        let tree = out.tree("test").unwrap();
        assert_eq!(tree.domain_ids(), vec![1, 3]);
        let leaf = tree.leaves().next().unwrap();
        assert!(leaf.mesh().unwrap().array("pressure").is_some());
        assert!(leaf.mesh().unwrap().array("density").is_some());
        assert_eq!(out.info.attributes.variables, vec!["pressure", "density"]);
    }

    #[test]
    fn test_ghost_zone_request_reaches_output() {
        let mut reader = mock_reader(1);
        reader.expect_get_mesh().returning(|_, dom, _| Ok(unit_mesh(dom)));
        reader
            .expect_get_var()
            .returning(|_, _, name| Ok(DataArray::scalar(name, Centering::Zonal, vec![1.0])));
        let mut source = DatabaseSource::new(reader);
        let contract = Contract::new(SilRestriction::new("mesh", [0]), "pressure");

        let plain = run(&mut source, &contract).unwrap();
        assert_eq!(plain.info.attributes.ghost_zones, GhostZoneState::None);
        let ghosted = run(&mut source, &contract.with_ghost_zones(true)).unwrap();
        assert_eq!(ghosted.info.attributes.ghost_zones, GhostZoneState::Present);
    }

    #[test]
    fn test_unknown_domain_is_fatal() {
        let reader = mock_reader(2);
        let mut source = DatabaseSource::new(reader);
        let contract = Contract::new(SilRestriction::new("mesh", [0, 5]), "pressure");
        let err = run(&mut source, &contract).unwrap_err();
        assert!(matches!(err, FlowError::Restriction(_)));
    }

    #[test]
    fn test_reader_error_keeps_kind() {
        let mut reader = mock_reader(1);
        reader
            .expect_get_mesh()
            .returning(|_, d, _| Err(FlowError::domain(d, "truncated record")));
        let mut source = DatabaseSource::new(reader);
        let contract = Contract::new(SilRestriction::new("mesh", [0]), "pressure");
        let err = run(&mut source, &contract).unwrap_err();
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("truncated record"));
    }

    #[test]
    fn test_interval_tree_cached_until_reopen() {
        let mut reader = mock_reader(2);
        reader
            .expect_get_auxiliary_data()
            .times(2)
            .returning(|_, _, _, _| {
                let extents = vec![
                    (0u32, Extents::from_ranges(vec![[0.0, 1.0], [0.0, 1.0]])),
                    (1u32, Extents::from_ranges(vec![[1.0, 2.0], [0.0, 1.0]])),
                ];
                Ok(Some(Arc::new(extents) as AuxiliaryData))
            });
        let mut source = DatabaseSource::new(reader);

        let a = source.interval_tree().unwrap();
        let b = source.interval_tree().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.get_domains_list(&[1.5, 0.5], 0.0).unwrap(), vec![1]);

        source.reopen();
        let c = source.interval_tree().unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_mesh_name_mismatch() {
        let reader = mock_reader(1);
        let mut source = DatabaseSource::new(reader);
        let contract = Contract::new(SilRestriction::new("other", [0]), "pressure");
        assert!(run(&mut source, &contract).unwrap_err().is_fatal());
    }
}
