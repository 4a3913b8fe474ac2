//! Integration tests for pipeline wiring and execution
//!
//! These tests drive full chains through the public API:
//! - Contracts narrowing on the way up
//! - Domain order and extents on the way down
//! - Memoized re-execution
//! - Wiring errors

mod common;

use common::builders::DatasetBuilder;
use meshflow::data::synthetic::{DENSITY, PRESSURE};
use meshflow::data::{DataObject, DataObjectType, GhostZoneState};
use meshflow::error::FlowError;
use meshflow::pipeline::{
    BoxClip, Contract, DomainSelectFilter, EngineContext, EngineMessage, Filter, NodeContext, VariableTransform,
};
use meshflow::sil::SilRestriction;
use meshflow::types::Extents;
use meshflow::FlowResult;

#[test]
fn test_chain_preserves_domain_order() {
    let builder = DatasetBuilder::new(4, 4).cells(2);
    let contract = builder.contract(PRESSURE);
    let (mut p, src) = builder.build();

    let select = p.add_filter(DomainSelectFilter::new([15, 3, 9, 1, 12, 6]));
    let clip = p.add_filter(BoxClip::new(Extents::from_ranges(vec![[0.0, 1.9], [0.0, 4.0]])).into_filter());
    let xf = p.add_filter(VariableTransform::new(PRESSURE, "neg", |t| -t[0]).into_filter());
    p.connect(src, select).unwrap();
    p.connect(select, clip).unwrap();
    p.connect(clip, xf).unwrap();

    let out = p.update(xf, &contract).unwrap();
    let ids = out.tree("test").unwrap().domain_ids();
    // Domains 3, 6 and 15 lie at x >= 2, outside the box.
    assert_eq!(ids, vec![1, 9, 12]);
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_true_extents_are_union_of_leaves() {
    let builder = DatasetBuilder::new(3, 2);
    let contract = builder.contract(PRESSURE);
    let (mut p, src) = builder.build();
    let xf = p.add_filter(VariableTransform::new(PRESSURE, "copy", |t| t[0]).into_filter());
    p.connect(src, xf).unwrap();

    let out = p.update(xf, &contract).unwrap();
    let tree = out.tree("test").unwrap();
    let union = tree.spatial_extents().unwrap();
    assert_eq!(out.info.attributes.true_spatial_extents.as_ref(), Some(&union));
    assert_eq!(union.range(0), [0.0, 3.0]);
    assert_eq!(union.range(1), [0.0, 2.0]);
    assert_eq!(out.info.attributes.spatial_dimension, 2);
}

#[test]
fn test_memoized_update() {
    let builder = DatasetBuilder::new(2, 2).timesteps(3);
    let contract = builder.contract(PRESSURE);
    let (mut p, src) = builder.build();
    let xf = p.add_filter(VariableTransform::new(PRESSURE, "copy", |t| t[0]).into_filter());
    p.connect(src, xf).unwrap();

    p.update(xf, &contract).unwrap();
    p.update(xf, &contract).unwrap();
    assert_eq!(p.executions(src), 1);
    assert_eq!(p.executions(xf), 1);

    p.update(xf, &contract.with_timestep(2)).unwrap();
    assert_eq!(p.executions(src), 2);
    assert_eq!(p.output(xf).unwrap().info.attributes.timestep, 2);

    // A new secondary variable changes the request.
    p.update(xf, &contract.with_timestep(2).with_secondary_variable(DENSITY)).unwrap();
    assert_eq!(p.executions(src), 3);
}

/// Asks for every domain regardless of what it was handed.
struct Greedy;

impl Filter for Greedy {
    fn name(&self) -> &str {
        "Greedy"
    }

    fn modify_contract(&mut self, contract: &Contract) -> FlowResult<Contract> {
        Ok(contract.with_restriction(SilRestriction::all_domains("mesh", 64)))
    }

    fn execute(&mut self, ctx: &NodeContext) -> FlowResult<DataObject> {
        let input = ctx.input(self.name())?;
        Ok(input.clone())
    }
}

/// Consumes images only.
struct ImageOnly;

impl Filter for ImageOnly {
    fn name(&self) -> &str {
        "ImageOnly"
    }

    fn input_type(&self) -> DataObjectType {
        DataObjectType::Image
    }

    fn execute(&mut self, _ctx: &NodeContext) -> FlowResult<DataObject> {
        Ok(DataObject::null())
    }
}

#[test]
fn test_widening_is_rejected() {
    let builder = DatasetBuilder::new(2, 2);
    let narrow = builder.contract(PRESSURE).with_restriction(SilRestriction::new("mesh", [0, 1]));
    let (mut p, src) = builder.build();
    let greedy = p.add_filter(Greedy);
    p.connect(src, greedy).unwrap();

    let err = p.update(greedy, &narrow).unwrap_err();
    assert!(matches!(err, FlowError::Restriction(_)));
    assert!(err.is_fatal());
    assert_eq!(p.executions(src), 0);
}

#[test]
fn test_type_mismatch_on_connect() {
    let (mut p, src) = DatasetBuilder::new(1, 1).build();
    let sink = p.add_filter(ImageOnly);
    let err = p.connect(src, sink).unwrap_err();
    assert!(matches!(
        err,
        FlowError::TypeMismatch {
            expected: DataObjectType::Image,
            actual: DataObjectType::Dataset,
            ..
        }
    ));
}

#[test]
fn test_progress_reaches_bridge() {
    let (ctx, bridge) = EngineContext::new(Default::default());
    let builder = DatasetBuilder::new(3, 1).context(ctx);
    let contract = builder.contract(PRESSURE);
    let (mut p, src) = builder.build();
    let xf = p.add_filter(VariableTransform::new(PRESSURE, "copy", |t| t[0]).into_filter());
    p.connect(src, xf).unwrap();
    p.update(xf, &contract).unwrap();

    let progress: Vec<(usize, usize)> = bridge
        .drain()
        .into_iter()
        .filter_map(|m| match m {
            EngineMessage::Progress { current, total, .. } => Some((current, total)),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
}

#[test]
fn test_bad_domain_aborts_single_update() {
    let builder = DatasetBuilder::new(2, 1);
    let contract = builder.contract(PRESSURE);
    let mut p = meshflow::Pipeline::new(EngineContext::default());
    let src = p.add_source(meshflow::pipeline::DatabaseSource::new(builder.database().failing_domain(1)));

    let err = p.update(src, &contract).unwrap_err();
    assert!(err.is_recoverable());
    assert!(p.output(src).is_none());

    // Dropping the bad domain lets the same pipeline succeed.
    let narrowed = contract.with_restriction(contract.restriction.restrict_domains(&[0]));
    assert_eq!(p.update(src, &narrowed).unwrap().tree("test").unwrap().domain_ids(), vec![0]);
}

#[test]
fn test_ghost_zone_request_reaches_source() {
    let builder = DatasetBuilder::new(2, 2);
    let contract = builder.contract(PRESSURE).with_ghost_zones(true);
    let (mut p, src) = builder.build();
    let xf = p.add_filter(VariableTransform::new(PRESSURE, "copy", |t| t[0]).into_filter());
    p.connect(src, xf).unwrap();

    let out = p.update(xf, &contract).unwrap();
    assert_eq!(out.info.attributes.ghost_zones, GhostZoneState::Present);
    assert_eq!(p.output(src).unwrap().info.attributes.ghost_zones, GhostZoneState::Present);

    // A different ghost-zone request is a different dataset.
    p.update(xf, &contract.with_ghost_zones(false)).unwrap();
    assert_eq!(p.executions(src), 2);
    assert_eq!(p.output(src).unwrap().info.attributes.ghost_zones, GhostZoneState::None);
}

#[test]
fn test_clip_turns_ghost_zones_off_upstream() {
    let builder = DatasetBuilder::new(2, 2);
    let contract = builder.contract(PRESSURE).with_ghost_zones(true);
    let (mut p, src) = builder.build();
    let clip = p.add_filter(BoxClip::new(Extents::from_ranges(vec![[0.0, 1.5], [0.0, 1.5]])).into_filter());
    let xf = p.add_filter(VariableTransform::new(PRESSURE, "copy", |t| t[0]).into_filter());
    p.connect(src, clip).unwrap();
    p.connect(clip, xf).unwrap();

    p.update(xf, &contract).unwrap();
    assert_eq!(p.output(src).unwrap().info.attributes.ghost_zones, GhostZoneState::None);
}

#[test]
fn test_dataset_builder() {
    let builder = DatasetBuilder::new(2, 3).cells(2).timesteps(4).failing_at(1);
    assert_eq!(builder.domains(), 6);
    let contract = builder.contract(PRESSURE);
    assert_eq!(contract.restriction.number_of_domains(), 6);
    let (pipeline, _source) = builder.build();
    assert_eq!(pipeline.len(), 1);
}
