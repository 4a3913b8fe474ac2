//! How much of a shape fits inside a circle (2-D) or sphere (3-D) of equal
//! measure centred on its centroid.
//!
//! Pass 1 sums cell measures and measure-weighted centres. The global sums
//! give the centroid and the idealised radius. Pass 2 sums the measure of
//! every cell whose centre lies within that radius. A perfect disc scores 1.

use crate::data::MeshHandle;
use crate::error::{FlowError, FlowResult};
use crate::query::{QueryResult, TwoPassQuery};
use crate::types::DomainId;
use std::f64::consts::PI;

// pass-1 partial layout
const MEASURE: usize = 0;
const WEIGHTED_CENTRE: usize = 1;
const LEAVES_3D: usize = 4;
const LEAVES: usize = 5;

#[derive(Debug, Default)]
pub struct CompactnessQuery {
    pass1: [f64; 6],
    inside: f64,
    total: f64,
    centroid: [f64; 3],
    radius: f64,
    dimension: usize,
}

impl CompactnessQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn centroid(&self) -> [f64; 3] {
        self.centroid
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Radius of the disc (2-D) or ball (3-D) with the given measure.
    pub fn equal_measure_radius(measure: f64, dimension: usize) -> f64 {
        if dimension == 3 {
            (3.0 * measure / (4.0 * PI)).cbrt()
        } else {
            (measure / PI).sqrt()
        }
    }

    fn distance(&self, p: [f64; 3]) -> f64 {
        (0..self.dimension)
            .map(|a| (p[a] - self.centroid[a]).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

impl TwoPassQuery for CompactnessQuery {
    fn name(&self) -> &str {
        "Compactness"
    }

    fn pre_execute(&mut self) {
        *self = Self::default();
    }

    fn execute_pass1(&mut self, mesh: &MeshHandle, _domain: DomainId) -> FlowResult<()> {
        for c in 0..mesh.number_of_cells() {
            let m = mesh.cell_measure(c);
            let centre = mesh.cell_center(c);
            self.pass1[MEASURE] += m;
            for a in 0..3 {
                self.pass1[WEIGHTED_CENTRE + a] += centre[a] * m;
            }
        }
        if mesh.spatial_dimension() == 3 {
            self.pass1[LEAVES_3D] += 1.0;
        }
        self.pass1[LEAVES] += 1.0;
        Ok(())
    }

    fn pass1_partials(&self) -> Vec<f64> {
        self.pass1.to_vec()
    }

    fn mid_execute(&mut self, global: &[f64]) -> FlowResult<()> {
        if global.len() != self.pass1.len() {
            return Err(FlowError::Communication(format!(
                "expected {} pass-1 sums, got {}",
                self.pass1.len(),
                global.len()
            )));
        }
        let total = global[MEASURE];
        if total <= 0.0 {
            return Err(FlowError::Data("shape has zero measure".to_string()));
        }
        self.dimension = if global[LEAVES_3D] == 0.0 {
            2
        } else if global[LEAVES_3D] == global[LEAVES] {
            3
        } else {
            return Err(FlowError::Data("shape mixes 2-D and 3-D domains".to_string()));
        };
        self.total = total;
        for a in 0..3 {
            self.centroid[a] = global[WEIGHTED_CENTRE + a] / total;
        }
        self.radius = Self::equal_measure_radius(total, self.dimension);
        tracing::debug!(
            "Compactness: centroid {:?}, radius {:.4} ({}-D)",
            self.centroid,
            self.radius,
            self.dimension
        );
        Ok(())
    }

    fn execute_pass2(&mut self, mesh: &MeshHandle, _domain: DomainId) -> FlowResult<()> {
        for c in 0..mesh.number_of_cells() {
            if self.distance(mesh.cell_center(c)) <= self.radius {
                self.inside += mesh.cell_measure(c);
            }
        }
        Ok(())
    }

    fn pass2_partials(&self) -> Vec<f64> {
        vec![self.inside]
    }

    fn post_execute(&mut self, global: &[f64]) -> FlowResult<QueryResult> {
        let inside = global.first().copied().unwrap_or(0.0);
        let fraction = inside / self.total;
        Ok(QueryResult {
            name: self.name().to_string(),
            values: vec![fraction, self.total, self.radius],
            message: format!(
                "Compactness: {:.4} of {} measure {:.4} lies within radius {:.4} of the centroid",
                fraction,
                if self.dimension == 3 { "volume" } else { "area" },
                self.total,
                self.radius
            ),
        })
    }
}
