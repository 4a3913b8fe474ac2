//! Integration tests for the time loop
//!
//! A loop over N timesteps with K corrupt ones must record N-K, skip K, and
//! still combine the survivors.

mod common;

use common::builders::DatasetBuilder;
use meshflow::data::synthetic::PRESSURE;
use meshflow::data::{DataObject, DataTree};
use meshflow::error::FlowError;
use meshflow::pipeline::{EngineContext, EngineMessage, VariableTransform};
use meshflow::time_loop::{CollectAllTimesteps, TimeLoopCollector, TimeLoopFilter, TimeLoopRange};
use meshflow::FlowResult;
use proptest::prelude::*;

/// Counts what it is handed and remembers the final call.
#[derive(Default)]
struct Recorder {
    recorded: Vec<usize>,
    finalized_with: Option<Vec<usize>>,
    finalize_calls: usize,
}

impl TimeLoopCollector for Recorder {
    fn record(&mut self, timestep: usize, _output: &DataObject) -> FlowResult<()> {
        self.recorded.push(timestep);
        Ok(())
    }

    fn execute_all_timesteps(&mut self, valid_times: &[usize]) -> FlowResult<DataObject> {
        self.finalize_calls += 1;
        self.finalized_with = Some(valid_times.to_vec());
        Ok(DataObject::dataset(DataTree::Empty, Default::default()))
    }

    fn release_data(&mut self) {
        self.recorded.clear();
    }
}

#[test]
fn test_loop_over_derived_variable() {
    let builder = DatasetBuilder::new(2, 1).timesteps(3);
    let contract = builder.contract("p2");
    let (mut p, src) = builder.build();
    let xf = p.add_filter(VariableTransform::new(PRESSURE, "p2", |t| t[0] * t[0]).into_filter());
    p.connect(src, xf).unwrap();

    let mut tl = TimeLoopFilter::new(TimeLoopRange::open(0, 1), Recorder::default()).with_available_timesteps(3);
    tl.run(&mut p, xf, &contract).unwrap();
    assert_eq!(tl.valid_times(), &[0, 1, 2]);
    assert!(tl.skipped_times().is_empty());
}

#[test]
fn test_partial_failure_partition() {
    let builder = DatasetBuilder::new(2, 2).timesteps(8).failing_at(1).failing_at(4).failing_at(6);
    let contract = builder.contract(PRESSURE);
    let (mut p, src) = builder.build();
    let xf = p.add_filter(VariableTransform::new(PRESSURE, "p2", |t| t[0] * 2.0).into_filter());
    p.connect(src, xf).unwrap();

    let mut tl = TimeLoopFilter::new(TimeLoopRange::open(0, 1), Recorder::default()).with_available_timesteps(8);
    tl.run(&mut p, xf, &contract).unwrap();

    assert_eq!(tl.valid_times(), &[0, 2, 3, 5, 7]);
    assert_eq!(tl.skipped_times(), &[1, 4, 6]);
    assert_eq!(tl.collector().finalize_calls, 1);
    assert_eq!(tl.collector().finalized_with.as_deref(), Some(&[0, 2, 3, 5, 7][..]));
    // Accumulator is released right after the final combine.
    assert!(tl.collector().recorded.is_empty());
}

#[test]
fn test_collected_tree_holds_only_valid_timesteps() {
    let (ctx, bridge) = EngineContext::new(Default::default());
    let builder = DatasetBuilder::new(2, 1).timesteps(4).failing_at(2).context(ctx);
    let contract = builder.contract(PRESSURE);
    let (mut p, src) = builder.build();

    let mut tl = TimeLoopFilter::new(TimeLoopRange::new(0, 10, 1), CollectAllTimesteps::new()).with_available_timesteps(4);
    let out = tl.run(&mut p, src, &contract).unwrap();
    let labels = out.tree("test").unwrap().unique_labels();
    assert_eq!(labels, vec!["mesh@t0", "mesh@t1", "mesh@t3"]);

    let warnings = bridge.drain_warnings();
    // One for clamping the end, one summarising the skipped timestep.
    assert_eq!(warnings.len(), 2);
    assert!(warnings[1].contains("1 of 4 timesteps skipped"));
}

#[test]
fn test_every_timestep_failing() {
    let (ctx, bridge) = EngineContext::new(Default::default());
    let builder = DatasetBuilder::new(1, 1).timesteps(2).failing_at(0).failing_at(1).context(ctx);
    let contract = builder.contract(PRESSURE);
    let (mut p, src) = builder.build();

    let mut tl = TimeLoopFilter::new(TimeLoopRange::new(0, 1, 1), Recorder::default());
    let err = tl.run(&mut p, src, &contract).unwrap_err();
    assert!(matches!(err, FlowError::AllTimestepsSkipped { count: 2, .. }));
    assert_eq!(tl.collector().finalize_calls, 0);
    assert!(bridge
        .drain()
        .contains(&EngineMessage::TimeLoopFinished { valid: 0, skipped: 2 }));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_valid_plus_skipped_is_everything(failing in proptest::collection::btree_set(0usize..10, 0..9)) {
        let builder = failing
            .iter()
            .fold(DatasetBuilder::new(1, 1).cells(1).timesteps(10), |b, &t| b.failing_at(t));
        let contract = builder.contract(PRESSURE);
        let (mut p, src) = builder.build();

        let mut tl = TimeLoopFilter::new(TimeLoopRange::open(0, 1), Recorder::default()).with_available_timesteps(10);
        tl.run(&mut p, src, &contract).unwrap();
        prop_assert_eq!(tl.valid_times().len(), 10 - failing.len());
        prop_assert_eq!(tl.skipped_times().to_vec(), failing.iter().copied().collect::<Vec<_>>());
    }
}
