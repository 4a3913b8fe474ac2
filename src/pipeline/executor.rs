//! Pipeline executor: the node arena and the pull-model update.
//!
//! An `update(node, contract)` call:
//! 1. Walk the input links from `node` up to its source.
//! 2. Call `modify_contract` once per filter, downstream to upstream,
//!    rejecting any filter that widens the restriction.
//! 3. Execute from the source down. A node whose cached output was produced
//!    for an equivalent contract is skipped unless something upstream of it
//!    re-executed.
//! 4. Stamp each fresh output's information and mark it current.

use crate::data::{DataObject, DataObjectInformation};
use crate::error::{FlowError, FlowResult};
use crate::pipeline::context::EngineContext;
use crate::pipeline::contract::{Contract, ContractRef};
use crate::pipeline::filter::{AnyNode, DataSource, Filter, FilterState, NodeContext};
use crate::pipeline::id::NodeId;
use std::sync::Arc;

/// A slot holding a node, its input link and its cached output.
pub struct NodeSlot {
    pub node: AnyNode,
    pub input: Option<NodeId>,
    output: Option<DataObject>,
    last_contract: Option<ContractRef>,
    state: FilterState,
    executions: usize,
}

impl NodeSlot {
    pub fn new(node: AnyNode) -> Self {
        Self {
            node,
            input: None,
            output: None,
            last_contract: None,
            state: FilterState::Idle,
            executions: 0,
        }
    }

    /// Drop cached output so the next update re-executes.
    fn invalidate(&mut self) {
        if let Some(out) = &mut self.output {
            out.info.invalidate();
        }
        self.last_contract = None;
        self.state = FilterState::Idle;
    }

    fn is_valid_for(&self, contract: &Contract) -> bool {
        self.state == FilterState::Done
            && self.output.as_ref().is_some_and(|o| o.info.is_current())
            && self
                .last_contract
                .as_ref()
                .is_some_and(|c| c.is_equivalent(contract))
    }
}

/// The pipeline graph and executor.
pub struct Pipeline {
    nodes: Vec<NodeSlot>,
    engine: EngineContext,
}

impl Pipeline {
    pub fn new(engine: EngineContext) -> Self {
        Self {
            nodes: Vec::new(),
            engine,
        }
    }

    pub fn engine(&self) -> &EngineContext {
        &self.engine
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ── Graph building ──

    /// Add a node to the pipeline. Returns its NodeId.
    pub fn add_node(&mut self, node: AnyNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        tracing::debug!("Added node {} '{}'", id, node.name());
        self.nodes.push(NodeSlot::new(node));
        id
    }

    pub fn add_source(&mut self, source: impl DataSource + 'static) -> NodeId {
        self.add_node(AnyNode::Source(Box::new(source)))
    }

    pub fn add_filter(&mut self, filter: impl Filter + 'static) -> NodeId {
        self.add_node(AnyNode::Filter(Box::new(filter)))
    }

    fn slot(&self, id: NodeId) -> FlowResult<&NodeSlot> {
        self.nodes
            .get(id.index())
            .ok_or_else(|| FlowError::Config(format!("unknown node {}", id)))
    }

    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(id.index()).map(|s| s.node.name())
    }

    /// Wire the output of `from` into the input of `to`.
    ///
    /// A sink receiving the wrong object type is a fatal configuration error.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> FlowResult<()> {
        let actual = self.slot(from)?.node.output_type();
        let sink = self.slot(to)?;
        let expected = sink.node.input_type().ok_or_else(|| {
            FlowError::Config(format!("source '{}' cannot take an input", sink.node.name()))
        })?;
        if expected != actual {
            return Err(FlowError::TypeMismatch {
                sink: sink.node.name().to_string(),
                expected,
                actual,
            });
        }
        if self.would_create_cycle(from, to) {
            return Err(FlowError::Config(format!(
                "connecting {} -> {} would create a cycle",
                from, to
            )));
        }

        self.nodes[to.index()].input = Some(from);
        self.modified(to);
        tracing::debug!("Connected {} -> {}", from, to);
        Ok(())
    }

    /// Check if connecting `from` -> `to` would create a cycle.
    fn would_create_cycle(&self, from: NodeId, to: NodeId) -> bool {
        let mut current = Some(from);
        let mut steps = 0;
        while let Some(id) = current {
            if id == to {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                return true;
            }
            current = self.nodes[id.index()].input;
        }
        false
    }

    /// Nodes fed directly by `id`.
    pub fn downstream(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.input == Some(id))
            .map(|(i, _)| NodeId(i as u32))
            .collect()
    }

    /// Invalidate `id` and everything downstream of it.
    pub fn modified(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if let Some(slot) = self.nodes.get_mut(n.index()) {
                slot.invalidate();
                stack.extend(self.downstream(n));
            }
        }
    }

    /// `node` and its ancestors, ordered source first.
    pub fn upstream_chain(&self, node: NodeId) -> FlowResult<Vec<NodeId>> {
        let mut chain = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let slot = self.slot(id)?;
            chain.push(id);
            current = match (slot.input, slot.node.is_source()) {
                (Some(input), _) => Some(input),
                (None, true) => None,
                (None, false) => {
                    return Err(FlowError::Config(format!(
                        "filter '{}' has no input connected",
                        slot.node.name()
                    )))
                }
            };
        }
        chain.reverse();
        Ok(chain)
    }

    // ── Execution ──

    /// Bring `node`'s output up to date for `contract`.
    pub fn update(&mut self, node: NodeId, contract: &Contract) -> FlowResult<&DataObject> {
        let chain = self.upstream_chain(node)?;
        let contracts = self.propagate_contracts(&chain, contract)?;

        let mut upstream_executed = false;
        for (position, &id) in chain.iter().enumerate() {
            let request = &contracts[position];
            if !upstream_executed && self.nodes[id.index()].is_valid_for(request) {
                tracing::trace!("Node {} up to date, skipping", id);
                continue;
            }
            self.execute_node(id, Arc::clone(request))?;
            upstream_executed = true;
        }

        self.nodes[node.index()]
            .output
            .as_ref()
            .ok_or_else(|| FlowError::Config(format!("node {} produced no output", node)))
    }

    /// Contract each chain element receives, computed sink to source.
    ///
    /// A filter that passes its contract through unchanged shares the
    /// downstream handle.
    fn propagate_contracts(&mut self, chain: &[NodeId], contract: &Contract) -> FlowResult<Vec<ContractRef>> {
        let mut contracts = vec![contract.clone().into_ref(); chain.len()];
        for position in (1..chain.len()).rev() {
            let received = Arc::clone(&contracts[position]);
            let slot = &mut self.nodes[chain[position].index()];
            if let AnyNode::Filter(filter) = &mut slot.node {
                let upstream = filter.modify_contract(&received)?;
                if !upstream.restriction.is_narrowing_of(&received.restriction) {
                    return Err(FlowError::Restriction(format!(
                        "filter '{}' widened its restriction",
                        filter.name()
                    )));
                }
                contracts[position - 1] = if upstream == *received {
                    received
                } else {
                    upstream.into_ref()
                };
            }
        }
        Ok(contracts)
    }

    fn execute_node(&mut self, id: NodeId, contract: ContractRef) -> FlowResult<()> {
        let input = match self.nodes[id.index()].input {
            Some(up) => self.nodes[up.index()].output.clone(),
            None => None,
        };
        let engine = &self.engine;
        let slot = &mut self.nodes[id.index()];
        slot.state = FilterState::Executing;
        tracing::debug!("Executing {} '{}' at timestep {}", id, slot.node.name(), contract.timestep());

        let ctx = NodeContext {
            node: id,
            input: input.as_ref(),
            contract: &contract,
            engine,
        };
        match slot.node.execute(&ctx) {
            Ok(mut output) => {
                let input_info = input
                    .as_ref()
                    .map(|i| i.info.clone())
                    .unwrap_or_else(DataObjectInformation::default);
                output.source = Some(id);
                output.info.attributes.timestep = contract.timestep();
                slot.node.update_data_object_info(&input_info, &mut output.info);
                output.info.validity.mark_current();

                slot.output = Some(output);
                slot.last_contract = Some(Arc::clone(&contract));
                slot.state = FilterState::Done;
                slot.executions += 1;
                Ok(())
            }
            Err(e) => {
                tracing::debug!("Node {} '{}' failed: {}", id, slot.node.name(), e);
                slot.invalidate();
                slot.output = None;
                Err(e)
            }
        }
    }

    // ── Inspection and release ──

    pub fn state(&self, id: NodeId) -> Option<FilterState> {
        self.nodes.get(id.index()).map(|s| s.state)
    }

    pub fn output(&self, id: NodeId) -> Option<&DataObject> {
        self.nodes.get(id.index()).and_then(|s| s.output.as_ref())
    }

    /// How many times the node has executed.
    pub fn executions(&self, id: NodeId) -> usize {
        self.nodes.get(id.index()).map_or(0, |s| s.executions)
    }

    /// Drop the node's held output. The node itself stays wired.
    pub fn release_data(&mut self, id: NodeId) {
        if let Some(slot) = self.nodes.get_mut(id.index()) {
            if let Some(mut out) = slot.output.take() {
                out.release_data();
            }
            slot.node.release_data();
            slot.invalidate();
        }
    }

    pub fn release_all(&mut self) {
        for i in 0..self.nodes.len() {
            self.release_data(NodeId(i as u32));
        }
    }
}
