//! DomainSelectFilter: narrows the upstream request to a domain list.
//!
//! Narrowing happens in `modify_contract`, so the source never reads the
//! dropped domains. Execution passes the (already narrowed) input through
//! without copying it.

use crate::data::DataObject;
use crate::error::FlowResult;
use crate::pipeline::contract::Contract;
use crate::pipeline::filter::{Filter, NodeContext};
use crate::types::DomainId;

pub struct DomainSelectFilter {
    domains: Vec<DomainId>,
}

impl DomainSelectFilter {
    pub fn new(domains: impl IntoIterator<Item = DomainId>) -> Self {
        Self {
            domains: domains.into_iter().collect(),
        }
    }

    pub fn domains(&self) -> &[DomainId] {
        &self.domains
    }
}

impl Filter for DomainSelectFilter {
    fn name(&self) -> &str {
        "DomainSelect"
    }

    fn modify_contract(&mut self, contract: &Contract) -> FlowResult<Contract> {
        let restriction = contract.restriction.restrict_domains(&self.domains);
        tracing::debug!(
            "DomainSelect narrowed {} -> {} domains",
            contract.restriction.number_of_domains(),
            restriction.number_of_domains()
        );
        Ok(contract.with_restriction(restriction))
    }

    fn execute(&mut self, ctx: &NodeContext) -> FlowResult<DataObject> {
        let input = ctx.input(self.name())?;
        let tree = input.tree(self.name())?;
        Ok(DataObject::shared_dataset(tree.clone(), input.info.derive()))
    }
}
