//! Subset selection carried by every contract.

use crate::error::{FlowError, FlowResult};
use crate::sil::interval_tree::IntervalTree;
use crate::sil::namespace::SilNamespace;
use crate::types::DomainId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which domains and materials of which mesh, at which timestep.
///
/// Filters may only narrow a restriction. The executor rejects any
/// `modify_contract` that returns a restriction selecting something its
/// input did not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilRestriction {
    mesh_name: String,
    domains: BTreeSet<DomainId>,
    materials: Option<SilNamespace>,
    timestep: usize,
}

impl SilRestriction {
    pub fn new(mesh_name: impl Into<String>, domains: impl IntoIterator<Item = DomainId>) -> Self {
        Self {
            mesh_name: mesh_name.into(),
            domains: domains.into_iter().collect(),
            materials: None,
            timestep: 0,
        }
    }

    /// Every domain `0..count`.
    pub fn all_domains(mesh_name: impl Into<String>, count: usize) -> Self {
        Self::new(mesh_name, 0..count as DomainId)
    }

    pub fn with_timestep(mut self, timestep: usize) -> Self {
        self.timestep = timestep;
        self
    }

    pub fn mesh_name(&self) -> &str {
        &self.mesh_name
    }

    pub fn timestep(&self) -> usize {
        self.timestep
    }

    /// Selected domains, ascending.
    pub fn domains(&self) -> impl Iterator<Item = DomainId> + '_ {
        self.domains.iter().copied()
    }

    pub fn domain_list(&self) -> Vec<DomainId> {
        self.domains.iter().copied().collect()
    }

    pub fn number_of_domains(&self) -> usize {
        self.domains.len()
    }

    pub fn uses_domain(&self, domain: DomainId) -> bool {
        self.domains.contains(&domain)
    }

    pub fn materials(&self) -> Option<&SilNamespace> {
        self.materials.as_ref()
    }

    pub fn uses_material(&self, material: i32) -> bool {
        self.materials
            .as_ref()
            .map_or(true, |m| m.contains_element(material))
    }

    /// Keep only domains also in `domains`.
    pub fn restrict_domains(&self, domains: &[DomainId]) -> Self {
        let keep: BTreeSet<DomainId> = domains.iter().copied().collect();
        Self {
            domains: self.domains.intersection(&keep).copied().collect(),
            ..self.clone()
        }
    }

    /// Intersect the material selection with `materials`.
    pub fn restrict_materials(&self, materials: &SilNamespace) -> Self {
        let materials = match &self.materials {
            Some(current) => current.intersect(materials),
            None => materials.clone(),
        };
        Self {
            materials: Some(materials),
            ..self.clone()
        }
    }

    /// Share of the selected domains owned by `rank`, dealt round-robin in
    /// ascending domain order.
    pub fn restrict_to_rank(&self, rank: usize, size: usize) -> Self {
        let size = size.max(1);
        Self {
            domains: self
                .domains
                .iter()
                .enumerate()
                .filter(|(i, _)| i % size == rank)
                .map(|(_, &d)| d)
                .collect(),
            ..self.clone()
        }
    }

    /// True when `self` selects nothing `wider` does not.
    pub fn is_narrowing_of(&self, wider: &SilRestriction) -> bool {
        if self.mesh_name != wider.mesh_name || !self.domains.is_subset(&wider.domains) {
            return false;
        }
        match (&self.materials, &wider.materials) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(mine), Some(theirs)) => mine.is_subset_of(theirs),
        }
    }

    /// Reject a restriction naming domains the database does not have.
    pub fn validate_against(&self, tree: &IntervalTree) -> FlowResult<()> {
        let unknown: Vec<DomainId> = self
            .domains
            .iter()
            .copied()
            .filter(|&d| !tree.contains_domain(d))
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(FlowError::Restriction(format!(
                "mesh '{}' has no domains {:?}",
                self.mesh_name, unknown
            )))
        }
    }
}
