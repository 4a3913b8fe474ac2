//! In-memory reader producing a block-decomposed rectilinear dataset.
//!
//! Domains tile a `blocks[0] x blocks[1] (x blocks[2])` lattice of unit
//! boxes. Each domain carries a nodal `pressure` field that moves with the
//! timestep and a zonal `density` field. Failures can be injected per
//! timestep or per domain to exercise recovery paths.

use crate::data::mesh::{Centering, DataArray, Mesh, MeshHandle, RectilinearMesh};
use crate::error::{FlowError, FlowResult};
use crate::pipeline::source::{AuxiliaryData, DatabaseReader, SPATIAL_EXTENTS};
use crate::types::{DomainId, Extents};
use std::collections::HashSet;
use std::sync::Arc;

pub const PRESSURE: &str = "pressure";
pub const DENSITY: &str = "density";

#[derive(Debug, Clone)]
pub struct SyntheticDatabase {
    mesh_name: String,
    blocks: [usize; 3],
    cells_per_block: usize,
    timesteps: usize,
    failing_timesteps: HashSet<usize>,
    failing_domains: HashSet<DomainId>,
}

impl SyntheticDatabase {
    /// 2-D lattice of `bx * by` domains.
    pub fn new_2d(bx: usize, by: usize, cells_per_block: usize, timesteps: usize) -> Self {
        Self {
            mesh_name: "mesh".to_string(),
            blocks: [bx.max(1), by.max(1), 1],
            cells_per_block: cells_per_block.max(1),
            timesteps,
            failing_timesteps: HashSet::new(),
            failing_domains: HashSet::new(),
        }
    }

    /// 3-D lattice of `bx * by * bz` domains.
    pub fn new_3d(bx: usize, by: usize, bz: usize, cells_per_block: usize, timesteps: usize) -> Self {
        let mut db = Self::new_2d(bx, by, cells_per_block, timesteps);
        db.blocks[2] = bz.max(1);
        db
    }

    pub fn with_mesh_name(mut self, name: impl Into<String>) -> Self {
        self.mesh_name = name.into();
        self
    }

    /// Every read at `timestep` fails with a data error.
    pub fn failing_at(mut self, timestep: usize) -> Self {
        self.failing_timesteps.insert(timestep);
        self
    }

    /// Every read of `domain` fails with a data error.
    pub fn failing_domain(mut self, domain: DomainId) -> Self {
        self.failing_domains.insert(domain);
        self
    }

    fn is_3d(&self) -> bool {
        self.blocks[2] > 1
    }

    /// Bounding box of one domain.
    pub fn domain_bounds(&self, domain: DomainId) -> Extents {
        let d = domain as usize;
        let i = d % self.blocks[0];
        let j = (d / self.blocks[0]) % self.blocks[1];
        let k = d / (self.blocks[0] * self.blocks[1]);
        let mut ranges = vec![[i as f64, i as f64 + 1.0], [j as f64, j as f64 + 1.0]];
        if self.is_3d() {
            ranges.push([k as f64, k as f64 + 1.0]);
        }
        Extents::from_ranges(ranges)
    }

    fn check(&self, timestep: usize, domain: DomainId) -> FlowResult<()> {
        if timestep >= self.timesteps {
            return Err(FlowError::Data(format!(
                "timestep {} out of range (database has {})",
                timestep, self.timesteps
            )));
        }
        if domain as usize >= self.number_of_domains() {
            return Err(FlowError::Restriction(format!(
                "domain {} out of range (database has {})",
                domain,
                self.number_of_domains()
            )));
        }
        if self.failing_timesteps.contains(&timestep) {
            return Err(FlowError::domain(
                domain,
                format!("corrupt record at timestep {}", timestep),
            ));
        }
        if self.failing_domains.contains(&domain) {
            return Err(FlowError::domain(domain, "corrupt domain record"));
        }
        Ok(())
    }

    fn build_mesh(&self, domain: DomainId) -> RectilinearMesh {
        let n = self.cells_per_block;
        let cells = if self.is_3d() { [n, n, n] } else { [n, n, 0] };
        RectilinearMesh::uniform(&self.domain_bounds(domain), cells)
    }
}

impl DatabaseReader for SyntheticDatabase {
    fn mesh_name(&self) -> String {
        self.mesh_name.clone()
    }

    fn number_of_domains(&self) -> usize {
        self.blocks.iter().product()
    }

    fn number_of_timesteps(&self) -> usize {
        self.timesteps
    }

    fn get_mesh(&mut self, timestep: usize, domain: DomainId, mesh_name: &str) -> FlowResult<MeshHandle> {
        if mesh_name != self.mesh_name {
            return Err(FlowError::Config(format!("no mesh named '{}'", mesh_name)));
        }
        self.check(timestep, domain)?;
        Ok(Arc::new(self.build_mesh(domain)))
    }

    fn get_var(&mut self, timestep: usize, domain: DomainId, var_name: &str) -> FlowResult<DataArray> {
        self.check(timestep, domain)?;
        let mesh = self.build_mesh(domain);
        let t = timestep as f64;
        match var_name {
            PRESSURE => {
                let values = (0..mesh.number_of_points())
                    .map(|i| {
                        let p = mesh.point(i);
                        p[0] + p[1] + p[2] + 0.5 * t
                    })
                    .collect();
                Ok(DataArray::scalar(PRESSURE, Centering::Nodal, values))
            }
            DENSITY => {
                let values = (0..mesh.number_of_cells())
                    .map(|c| 1.0 + domain as f64 + 0.1 * mesh.cell_center(c)[0])
                    .collect();
                Ok(DataArray::scalar(DENSITY, Centering::Zonal, values))
            }
            other => Err(FlowError::domain(domain, format!("unknown variable '{}'", other))),
        }
    }

    fn get_auxiliary_data(
        &mut self,
        _timestep: usize,
        _var_name: &str,
        _domain: Option<DomainId>,
        kind: &str,
    ) -> FlowResult<Option<AuxiliaryData>> {
        if kind != SPATIAL_EXTENTS {
            return Ok(None);
        }
        let extents: Vec<(DomainId, Extents)> = (0..self.number_of_domains() as DomainId)
            .map(|d| (d, self.domain_bounds(d)))
            .collect();
        Ok(Some(Arc::new(extents)))
    }
}
