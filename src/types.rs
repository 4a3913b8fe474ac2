//! Core value types shared by every layer of the engine.

use crate::error::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of one domain, the unit of data-parallel decomposition.
pub type DomainId = u32;

/// Axis-aligned closed bounds of arbitrary dimension.
///
/// Used both for spatial bounding boxes (dimension 2 or 3) and data ranges
/// (dimension 1). An empty extent has `min = +inf` and `max = -inf` on every
/// axis, so merging anything into it yields the other operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extents {
    ranges: Vec<[f64; 2]>,
}

impl Extents {
    /// Empty extents of the given dimension.
    pub fn empty(dimension: usize) -> Self {
        Self {
            ranges: vec![[f64::INFINITY, f64::NEG_INFINITY]; dimension],
        }
    }

    pub fn from_ranges(ranges: Vec<[f64; 2]>) -> Self {
        Self { ranges }
    }

    /// Build from the interleaved `[min0, max0, min1, max1, ...]` layout.
    pub fn from_flat(values: &[f64]) -> FlowResult<Self> {
        if values.len() % 2 != 0 {
            return Err(FlowError::Config(format!(
                "extents need an even number of values, got {}",
                values.len()
            )));
        }
        Ok(Self {
            ranges: values.chunks_exact(2).map(|c| [c[0], c[1]]).collect(),
        })
    }

    /// Bounds of a single scalar range.
    pub fn scalar(min: f64, max: f64) -> Self {
        Self {
            ranges: vec![[min, max]],
        }
    }

    pub fn to_flat(&self) -> Vec<f64> {
        self.ranges.iter().flat_map(|r| [r[0], r[1]]).collect()
    }

    pub fn dimension(&self) -> usize {
        self.ranges.len()
    }

    /// True when every axis has `min <= max`.
    pub fn is_valid(&self) -> bool {
        !self.ranges.is_empty() && self.ranges.iter().all(|r| r[0] <= r[1])
    }

    #[inline]
    pub fn range(&self, axis: usize) -> [f64; 2] {
        self.ranges[axis]
    }

    #[inline]
    pub fn min(&self, axis: usize) -> f64 {
        self.ranges[axis][0]
    }

    #[inline]
    pub fn max(&self, axis: usize) -> f64 {
        self.ranges[axis][1]
    }

    pub fn center(&self, axis: usize) -> f64 {
        0.5 * (self.ranges[axis][0] + self.ranges[axis][1])
    }

    pub fn ranges(&self) -> &[[f64; 2]] {
        &self.ranges
    }

    /// Coordinate-wise union. Grows to the larger dimension.
    pub fn merge(&mut self, other: &Extents) {
        if other.ranges.len() > self.ranges.len() {
            self.ranges
                .resize(other.ranges.len(), [f64::INFINITY, f64::NEG_INFINITY]);
        }
        for (mine, theirs) in self.ranges.iter_mut().zip(&other.ranges) {
            mine[0] = mine[0].min(theirs[0]);
            mine[1] = mine[1].max(theirs[1]);
        }
    }

    pub fn include_point(&mut self, point: &[f64]) {
        for (range, &value) in self.ranges.iter_mut().zip(point) {
            range[0] = range[0].min(value);
            range[1] = range[1].max(value);
        }
    }

    /// Closed-interval overlap on every shared axis.
    pub fn overlaps(&self, other: &Extents) -> bool {
        self.ranges
            .iter()
            .zip(&other.ranges)
            .all(|(a, b)| a[0] <= b[1] && b[0] <= a[1])
    }

    /// Overlap with the box `[min, max]` given as separate corner slices.
    pub fn overlaps_box(&self, min: &[f64], max: &[f64]) -> bool {
        self.ranges
            .iter()
            .zip(min.iter().zip(max))
            .all(|(r, (&lo, &hi))| r[0] <= hi && lo <= r[1])
    }

    pub fn contains_point(&self, point: &[f64], tolerance: f64) -> bool {
        self.ranges
            .iter()
            .zip(point)
            .all(|(r, &p)| p >= r[0] - tolerance && p <= r[1] + tolerance)
    }

    /// Slab test for the half-line `origin + s * direction`, `s >= 0`.
    pub fn intersects_ray(&self, origin: &[f64], direction: &[f64]) -> bool {
        let mut t_near = 0.0_f64;
        let mut t_far = f64::INFINITY;
        for ((r, &o), &d) in self.ranges.iter().zip(origin).zip(direction) {
            if d == 0.0 {
                if o < r[0] || o > r[1] {
                    return false;
                }
                continue;
            }
            let mut t0 = (r[0] - o) / d;
            let mut t1 = (r[1] - o) / d;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_near = t_near.max(t0);
            t_far = t_far.min(t1);
            if t_near > t_far {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for Extents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, r) in self.ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}..{}", r[0], r[1])?;
        }
        write!(f, "]")
    }
}
