//! Static binary tree over per-domain bounding extents.
//!
//! Domains are registered with [`IntervalTree::add_domain`], the tree is
//! built once by [`IntervalTree::calculate`], and afterwards it is only
//! queried. Each internal node stores the union of its subtree's extents so a
//! query can skip a whole subtree that cannot overlap.
//!
//! Query results are returned in ascending domain order, not spatial order.

use crate::error::{FlowError, FlowResult};
use crate::types::{DomainId, Extents};

#[derive(Debug, Clone)]
enum NodeKind {
    Leaf(usize),
    Internal { left: usize, right: usize },
}

#[derive(Debug, Clone)]
struct TreeNode {
    extents: Extents,
    kind: NodeKind,
}

#[derive(Debug, Clone)]
pub struct IntervalTree {
    dimension: usize,
    domains: Vec<(DomainId, Extents)>,
    nodes: Vec<TreeNode>,
    has_been_calculated: bool,
}

impl IntervalTree {
    /// An empty tree over extents of `dimension` axes.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            domains: Vec::new(),
            nodes: Vec::new(),
            has_been_calculated: false,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn number_of_domains(&self) -> usize {
        self.domains.len()
    }

    pub fn has_been_calculated(&self) -> bool {
        self.has_been_calculated
    }

    pub fn add_domain(&mut self, domain: DomainId, extents: Extents) -> FlowResult<()> {
        if self.has_been_calculated {
            return Err(FlowError::Config(format!(
                "cannot add domain {} to an interval tree that has been calculated",
                domain
            )));
        }
        if extents.dimension() != self.dimension {
            return Err(FlowError::Config(format!(
                "domain {} has {}-D extents, tree is {}-D",
                domain,
                extents.dimension(),
                self.dimension
            )));
        }
        if self.domains.iter().any(|(d, _)| *d == domain) {
            return Err(FlowError::Config(format!("domain {} added twice", domain)));
        }
        self.domains.push((domain, extents));
        Ok(())
    }

    /// Build the tree. Later calls are no-ops.
    pub fn calculate(&mut self) {
        if self.has_been_calculated {
            return;
        }
        self.nodes.clear();
        if !self.domains.is_empty() {
            let mut order: Vec<usize> = (0..self.domains.len()).collect();
            self.build(&mut order);
        }
        self.has_been_calculated = true;
        tracing::debug!(
            "Interval tree calculated: {} domains, {} nodes",
            self.domains.len(),
            self.nodes.len()
        );
    }

    /// Build the subtree over `items` and return its node index.
    fn build(&mut self, items: &mut [usize]) -> usize {
        let index = self.nodes.len();
        if items.len() == 1 {
            self.nodes.push(TreeNode {
                extents: self.domains[items[0]].1.clone(),
                kind: NodeKind::Leaf(items[0]),
            });
            return index;
        }

        // Split at the median centre along the axis where centres spread most.
        let axis = (0..self.dimension)
            .max_by(|&a, &b| {
                self.center_spread(items, a)
                    .total_cmp(&self.center_spread(items, b))
            })
            .unwrap_or(0);
        let domains = &self.domains;
        items.sort_by(|&x, &y| {
            domains[x]
                .1
                .center(axis)
                .total_cmp(&domains[y].1.center(axis))
                .then(domains[x].0.cmp(&domains[y].0))
        });

        // Reserve this node's slot before the children take theirs.
        self.nodes.push(TreeNode {
            extents: Extents::empty(self.dimension),
            kind: NodeKind::Leaf(usize::MAX),
        });
        let mid = items.len() / 2;
        let (lo, hi) = items.split_at_mut(mid);
        let left = self.build(lo);
        let right = self.build(hi);

        let mut extents = self.nodes[left].extents.clone();
        extents.merge(&self.nodes[right].extents);
        self.nodes[index] = TreeNode {
            extents,
            kind: NodeKind::Internal { left, right },
        };
        index
    }

    fn center_spread(&self, items: &[usize], axis: usize) -> f64 {
        let (lo, hi) = items.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            let c = self.domains[i].1.center(axis);
            (lo.min(c), hi.max(c))
        });
        hi - lo
    }

    fn ensure_calculated(&self) -> FlowResult<()> {
        if self.has_been_calculated {
            Ok(())
        } else {
            Err(FlowError::Config(
                "interval tree queried before calculate()".to_string(),
            ))
        }
    }

    /// Pruning descent: `hit` decides overlap for any node's extents.
    fn collect<F>(&self, hit: F) -> FlowResult<Vec<DomainId>>
    where
        F: Fn(&Extents) -> bool,
    {
        self.ensure_calculated()?;
        let mut out = Vec::new();
        if self.nodes.is_empty() {
            return Ok(out);
        }
        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !hit(&node.extents) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf(item) => out.push(self.domains[item].0),
                NodeKind::Internal { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }
        out.sort_unstable();
        Ok(out)
    }

    /// Domains whose extents contain `point`, each axis widened by `tolerance`.
    pub fn get_domains_list(&self, point: &[f64], tolerance: f64) -> FlowResult<Vec<DomainId>> {
        self.check_query_dimension(point.len())?;
        self.collect(|e| e.contains_point(point, tolerance))
    }

    /// Domains whose extents overlap the box `[min, max]`.
    pub fn get_domains_list_from_range(&self, min: &[f64], max: &[f64]) -> FlowResult<Vec<DomainId>> {
        self.check_query_dimension(min.len())?;
        self.check_query_dimension(max.len())?;
        self.collect(|e| e.overlaps_box(min, max))
    }

    /// Domains whose extents are hit by the ray `origin + s * direction`, `s >= 0`.
    pub fn get_domains_list_from_ray(&self, origin: &[f64], direction: &[f64]) -> FlowResult<Vec<DomainId>> {
        self.check_query_dimension(origin.len())?;
        self.check_query_dimension(direction.len())?;
        self.collect(|e| e.intersects_ray(origin, direction))
    }

    fn check_query_dimension(&self, len: usize) -> FlowResult<()> {
        if len == self.dimension {
            Ok(())
        } else {
            Err(FlowError::Config(format!(
                "{}-D query against a {}-D interval tree",
                len, self.dimension
            )))
        }
    }

    /// Extents of the whole dataset.
    pub fn extents(&self) -> Option<&Extents> {
        if self.has_been_calculated {
            self.nodes.first().map(|n| &n.extents)
        } else {
            None
        }
    }

    pub fn domain_extents(&self, domain: DomainId) -> Option<&Extents> {
        self.domains
            .iter()
            .find(|(d, _)| *d == domain)
            .map(|(_, e)| e)
    }

    pub fn contains_domain(&self, domain: DomainId) -> bool {
        self.domain_extents(domain).is_some()
    }

    /// All registered domain ids, ascending.
    pub fn domain_ids(&self) -> Vec<DomainId> {
        let mut ids: Vec<DomainId> = self.domains.iter().map(|(d, _)| *d).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn grid_tree(n: usize) -> IntervalTree {
        let mut tree = IntervalTree::new(2);
        for j in 0..n {
            for i in 0..n {
                let id = (i + j * n) as DomainId;
                let e = Extents::from_ranges(vec![
                    [i as f64, i as f64 + 1.0],
                    [j as f64, j as f64 + 1.0],
                ]);
                tree.add_domain(id, e).unwrap();
            }
        }
        tree.calculate();
        tree
    }

    #[test]
    fn test_query_before_calculate_is_fatal() {
        let mut tree = IntervalTree::new(1);
        tree.add_domain(0, Extents::scalar(0.0, 1.0)).unwrap();
        let err = tree.get_domains_list(&[0.5], 0.0).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_add_after_calculate_rejected() {
        let mut tree = grid_tree(2);
        assert!(tree.add_domain(99, Extents::from_ranges(vec![[0.0, 1.0], [0.0, 1.0]])).is_err());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut tree = IntervalTree::new(3);
        assert!(tree.add_domain(0, Extents::scalar(0.0, 1.0)).is_err());
    }

    #[test]
    fn test_calculate_is_idempotent() {
        let mut tree = grid_tree(3);
        let before = tree.nodes.len();
        tree.calculate();
        assert_eq!(tree.nodes.len(), before);
        assert_eq!(before, 2 * 9 - 1);
    }

    #[test]
    fn test_point_query() {
        let tree = grid_tree(4);
        assert_eq!(tree.get_domains_list(&[1.5, 2.5], 0.0).unwrap(), vec![9]);
        // Shared corner touches four domains.
        assert_eq!(tree.get_domains_list(&[1.0, 1.0], 0.0).unwrap(), vec![0, 1, 4, 5]);
        assert!(tree.get_domains_list(&[10.0, 10.0], 0.0).unwrap().is_empty());
    }

    #[test]
    fn test_range_query_in_domain_order() {
        let tree = grid_tree(4);
        let hits = tree
            .get_domains_list_from_range(&[2.5, 0.5], &[3.5, 1.5])
            .unwrap();
        assert_eq!(hits, vec![2, 3, 6, 7]);
    }

    #[test]
    fn test_ray_query() {
        let tree = grid_tree(3);
        let hits = tree.get_domains_list_from_ray(&[0.5, -1.0], &[0.0, 1.0]).unwrap();
        assert_eq!(hits, vec![0, 3, 6]);
    }

    #[test]
    fn test_extents() {
        let tree = grid_tree(3);
        let e = tree.extents().unwrap();
        assert_eq!(e.range(0), [0.0, 3.0]);
        assert_eq!(e.range(1), [0.0, 3.0]);
        assert_eq!(tree.domain_ids().len(), 9);
    }

    #[test]
    fn test_empty_tree() {
        let mut tree = IntervalTree::new(2);
        tree.calculate();
        assert!(tree.get_domains_list(&[0.0, 0.0], 1.0).unwrap().is_empty());
        assert!(tree.extents().is_none());
    }

    proptest! {
        #[test]
        fn test_pruning_is_sound(
            boxes in prop::collection::vec((0.0f64..50.0, 0.0f64..50.0, 0.1f64..10.0, 0.1f64..10.0), 1..60),
            qx in -5.0f64..60.0,
            qy in -5.0f64..60.0,
            qw in 0.0f64..20.0,
            qh in 0.0f64..20.0,
        ) {
            let mut tree = IntervalTree::new(2);
            let mut all = Vec::new();
            for (i, (x, y, w, h)) in boxes.iter().enumerate() {
                let e = Extents::from_ranges(vec![[*x, x + w], [*y, y + h]]);
                tree.add_domain(i as DomainId, e.clone()).unwrap();
                all.push((i as DomainId, e));
            }
            tree.calculate();

            let min = [qx, qy];
            let max = [qx + qw, qy + qh];
            let hits = tree.get_domains_list_from_range(&min, &max).unwrap();
            let expected: Vec<DomainId> = all
                .iter()
                .filter(|(_, e)| e.overlaps_box(&min, &max))
                .map(|(d, _)| *d)
                .collect();
            prop_assert_eq!(hits, expected);
        }
    }
}
