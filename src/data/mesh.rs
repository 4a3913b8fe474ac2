//! Mesh library boundary.
//!
//! The engine never runs geometric algorithms itself. It routes opaque
//! [`MeshHandle`]s between filters and asks the mesh library for the few
//! operations it needs: point and cell access, named arrays, a clone that
//! carries one more array, and box extraction. [`RectilinearMesh`] is the
//! in-crate implementation used by the synthetic database and the tests.

use crate::types::Extents;
use std::fmt;
use std::sync::Arc;

/// Shared, immutable handle to a mesh chunk.
pub type MeshHandle = Arc<dyn Mesh>;

/// Where the tuples of an array live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Centering {
    Nodal,
    Zonal,
}

/// Named multi-component array attached to a mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct DataArray {
    name: String,
    centering: Centering,
    components: usize,
    values: Vec<f64>,
}

impl DataArray {
    pub fn new(
        name: impl Into<String>,
        centering: Centering,
        components: usize,
        values: Vec<f64>,
    ) -> Self {
        let components = components.max(1);
        debug_assert!(values.len() % components == 0);
        Self {
            name: name.into(),
            centering,
            components,
            values,
        }
    }

    /// Single-component array.
    pub fn scalar(name: impl Into<String>, centering: Centering, values: Vec<f64>) -> Self {
        Self::new(name, centering, 1, values)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn centering(&self) -> Centering {
        self.centering
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn number_of_tuples(&self) -> usize {
        self.values.len() / self.components
    }

    #[inline]
    pub fn tuple(&self, index: usize) -> &[f64] {
        let start = index * self.components;
        &self.values[start..start + self.components]
    }

    #[inline]
    pub fn component(&self, index: usize, component: usize) -> f64 {
        self.values[index * self.components + component]
    }

    /// Scalar range, or magnitude range for vectors. `None` when empty.
    pub fn data_range(&self) -> Option<[f64; 2]> {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for i in 0..self.number_of_tuples() {
            let tuple = self.tuple(i);
            let v = if self.components == 1 {
                tuple[0]
            } else {
                tuple.iter().map(|c| c * c).sum::<f64>().sqrt()
            };
            lo = lo.min(v);
            hi = hi.max(v);
        }
        (lo <= hi).then_some([lo, hi])
    }

    /// Apply a pure per-tuple transform producing a scalar array.
    pub fn map<F>(&self, name: impl Into<String>, mut f: F) -> DataArray
    where
        F: FnMut(&[f64]) -> f64,
    {
        let values = (0..self.number_of_tuples())
            .map(|i| f(self.tuple(i)))
            .collect();
        DataArray::scalar(name, self.centering, values)
    }

    /// Keep the tuples at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> DataArray {
        let mut values = Vec::with_capacity(indices.len() * self.components);
        for &i in indices {
            values.extend_from_slice(self.tuple(i));
        }
        DataArray::new(self.name.clone(), self.centering, self.components, values)
    }
}

/// Opaque mesh chunk as seen by the engine.
pub trait Mesh: fmt::Debug + Send + Sync {
    /// Short type name, for logging.
    fn kind(&self) -> &'static str;

    fn spatial_dimension(&self) -> usize;

    fn number_of_points(&self) -> usize;

    fn number_of_cells(&self) -> usize;

    fn point(&self, index: usize) -> [f64; 3];

    fn cell_center(&self, index: usize) -> [f64; 3];

    /// Area in 2-D, volume in 3-D.
    fn cell_measure(&self, index: usize) -> f64;

    fn array(&self, name: &str) -> Option<&DataArray>;

    fn array_names(&self) -> Vec<&str>;

    /// A copy of this mesh carrying `array` (replacing any array of the same name).
    fn with_array(&self, array: DataArray) -> MeshHandle;

    /// The part of the mesh inside `bounds`, or `None` if nothing remains.
    fn extract_box(&self, bounds: &Extents) -> Option<MeshHandle>;

    /// Bounding box over all points.
    fn bounds(&self) -> Extents {
        let dim = self.spatial_dimension();
        let mut extents = Extents::empty(dim);
        for i in 0..self.number_of_points() {
            extents.include_point(&self.point(i)[..dim]);
        }
        extents
    }
}

/// Axis-aligned grid defined by one coordinate array per axis.
///
/// The grid is 2-D when the third axis has a single coordinate. Points are
/// ordered with x varying fastest.
#[derive(Debug, Clone)]
pub struct RectilinearMesh {
    coords: [Vec<f64>; 3],
    arrays: Vec<DataArray>,
}

impl RectilinearMesh {
    pub fn new(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Self {
        let z = if z.is_empty() { vec![0.0] } else { z };
        Self {
            coords: [x, y, z],
            arrays: Vec::new(),
        }
    }

    /// Uniform grid of `cells` cells per axis spanning `bounds`.
    pub fn uniform(bounds: &Extents, cells: [usize; 3]) -> Self {
        let axis = |a: usize| -> Vec<f64> {
            if a >= bounds.dimension() || cells[a] == 0 {
                return vec![if a < bounds.dimension() { bounds.min(a) } else { 0.0 }];
            }
            let [lo, hi] = bounds.range(a);
            let n = cells[a];
            (0..=n)
                .map(|i| lo + (hi - lo) * i as f64 / n as f64)
                .collect()
        };
        Self::new(axis(0), axis(1), axis(2))
    }

    pub fn with_added_array(mut self, array: DataArray) -> Self {
        self.arrays.retain(|a| a.name() != array.name());
        self.arrays.push(array);
        self
    }

    pub fn coords(&self, axis: usize) -> &[f64] {
        &self.coords[axis]
    }

    fn node_dims(&self) -> [usize; 3] {
        [
            self.coords[0].len(),
            self.coords[1].len(),
            self.coords[2].len(),
        ]
    }

    fn cell_dims(&self) -> [usize; 3] {
        let n = self.node_dims();
        let c = |len: usize| if len > 1 { len - 1 } else { 1 };
        if n.iter().any(|&len| len == 0) {
            return [0, 0, 0];
        }
        [c(n[0]), c(n[1]), c(n[2])]
    }

    fn cell_ijk(&self, index: usize) -> [usize; 3] {
        let c = self.cell_dims();
        [index % c[0], (index / c[0]) % c[1], index / (c[0] * c[1])]
    }

    fn axis_cell(&self, axis: usize, i: usize) -> (f64, f64) {
        let coords = &self.coords[axis];
        if coords.len() > 1 {
            (0.5 * (coords[i] + coords[i + 1]), coords[i + 1] - coords[i])
        } else {
            (coords[0], 1.0)
        }
    }
}

impl Mesh for RectilinearMesh {
    fn kind(&self) -> &'static str {
        "rectilinear"
    }

    fn spatial_dimension(&self) -> usize {
        if self.coords[2].len() > 1 {
            3
        } else {
            2
        }
    }

    fn number_of_points(&self) -> usize {
        self.node_dims().iter().product()
    }

    fn number_of_cells(&self) -> usize {
        let n = self.node_dims();
        // A single node along a populated axis leaves no cells.
        if n[0] < 2 || n[1] < 2 {
            return 0;
        }
        self.cell_dims().iter().product()
    }

    fn point(&self, index: usize) -> [f64; 3] {
        let n = self.node_dims();
        let i = index % n[0];
        let j = (index / n[0]) % n[1];
        let k = index / (n[0] * n[1]);
        [self.coords[0][i], self.coords[1][j], self.coords[2][k]]
    }

    fn cell_center(&self, index: usize) -> [f64; 3] {
        let ijk = self.cell_ijk(index);
        [
            self.axis_cell(0, ijk[0]).0,
            self.axis_cell(1, ijk[1]).0,
            self.axis_cell(2, ijk[2]).0,
        ]
    }

    fn cell_measure(&self, index: usize) -> f64 {
        let ijk = self.cell_ijk(index);
        (0..3).map(|a| self.axis_cell(a, ijk[a]).1).product()
    }

    fn array(&self, name: &str) -> Option<&DataArray> {
        self.arrays.iter().find(|a| a.name() == name)
    }

    fn array_names(&self) -> Vec<&str> {
        self.arrays.iter().map(|a| a.name()).collect()
    }

    fn with_array(&self, array: DataArray) -> MeshHandle {
        Arc::new(self.clone().with_added_array(array))
    }

    fn extract_box(&self, bounds: &Extents) -> Option<MeshHandle> {
        // Inclusive node index range kept on each axis.
        let mut keep = [(0usize, 0usize); 3];
        for (axis, slot) in keep.iter_mut().enumerate() {
            let coords = &self.coords[axis];
            if axis >= bounds.dimension() || coords.len() == 1 {
                *slot = (0, coords.len() - 1);
                continue;
            }
            let [lo, hi] = bounds.range(axis);
            let first = coords.iter().position(|&c| c >= lo && c <= hi)?;
            let last = coords.iter().rposition(|&c| c >= lo && c <= hi)?;
            *slot = (first, last);
        }

        let n = self.node_dims();
        let mut point_ids = Vec::new();
        for k in keep[2].0..=keep[2].1 {
            for j in keep[1].0..=keep[1].1 {
                for i in keep[0].0..=keep[0].1 {
                    point_ids.push(i + n[0] * (j + n[1] * k));
                }
            }
        }

        let c = self.cell_dims();
        let cell_range = |axis: usize| {
            if self.coords[axis].len() > 1 {
                keep[axis].0..keep[axis].1
            } else {
                0..1
            }
        };
        let mut cell_ids = Vec::new();
        for k in cell_range(2) {
            for j in cell_range(1) {
                for i in cell_range(0) {
                    cell_ids.push(i + c[0] * (j + c[1] * k));
                }
            }
        }

        let coords = [0, 1, 2].map(|a| self.coords[a][keep[a].0..=keep[a].1].to_vec());
        let arrays = self
            .arrays
            .iter()
            .map(|a| match a.centering() {
                Centering::Nodal => a.subset(&point_ids),
                Centering::Zonal => a.subset(&cell_ids),
            })
            .collect();
        Some(Arc::new(RectilinearMesh { coords, arrays }))
    }
}
