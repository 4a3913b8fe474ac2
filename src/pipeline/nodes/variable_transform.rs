//! VariableTransform: derives a new variable from an existing one, tuple by
//! tuple.
//!
//! The input variable is requested upstream as a secondary variable so the
//! source reads it even when the sink asked for something else. A request
//! naming the derived variable is rewritten to name the input instead; only
//! this filter can produce it.

use crate::data::{DataObjectInformation, DataTree, MeshHandle};
use crate::error::{FlowError, FlowResult};
use crate::pipeline::contract::Contract;
use crate::pipeline::streamer::{DomainTransform, StreamingExecutor, StreamingFilter};
use crate::types::{DomainId, Extents};

type TupleFn = Box<dyn Fn(&[f64]) -> f64 + Send>;

pub struct VariableTransform {
    name: String,
    input: String,
    output: String,
    f: TupleFn,
    output_range: Option<Extents>,
}

impl VariableTransform {
    pub fn new<F>(input: impl Into<String>, output: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + 'static,
    {
        let output = output.into();
        Self {
            name: format!("VariableTransform({})", output),
            input: input.into(),
            output,
            f: Box::new(f),
            output_range: None,
        }
    }

    pub fn into_filter(self) -> StreamingFilter<Self> {
        StreamingFilter::new(self)
    }

    pub fn output_variable(&self) -> &str {
        &self.output
    }
}

impl DomainTransform for VariableTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn modify_contract(&mut self, contract: &Contract) -> FlowResult<Contract> {
        let mut upstream = contract.clone();
        upstream.request.secondary_variables.retain(|v| *v != self.output);
        if upstream.request.variable == self.output {
            upstream.request.variable = self.input.clone();
        }
        Ok(upstream.with_secondary_variable(self.input.clone()))
    }

    fn pre_execute(&mut self, _contract: &Contract) -> FlowResult<()> {
        self.output_range = None;
        Ok(())
    }

    fn execute_data_tree(&mut self, mesh: &MeshHandle, domain: DomainId, label: &str) -> FlowResult<DataTree> {
        let array = mesh.array(&self.input).ok_or_else(|| {
            FlowError::domain(domain, format!("variable '{}' is missing", self.input))
        })?;
        let derived = array.map(self.output.clone(), |t| (self.f)(t));
        if let Some([lo, hi]) = derived.data_range() {
            let r = Extents::scalar(lo, hi);
            match &mut self.output_range {
                Some(e) => e.merge(&r),
                None => self.output_range = Some(r),
            }
        }
        Ok(DataTree::leaf(mesh.with_array(derived), domain, label))
    }

    fn post_execute(&mut self, executor: &mut StreamingExecutor) {
        if let Some(range) = self.output_range.clone() {
            executor.override_true_data_extents(range);
        }
    }

    fn update_data_object_info(&self, _input: &DataObjectInformation, output: &mut DataObjectInformation) {
        output.attributes.add_variable(self.output.clone());
    }
}
