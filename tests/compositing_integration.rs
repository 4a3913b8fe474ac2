//! Integration tests for parallel compositing and reductions
//!
//! Every test runs real threads, one per rank, over in-process channels.

mod common;

use common::ranks::run_ranks;
use meshflow::composite::{
    BinaryTreeTopology, Communicator, Image, ImageCompositer, ReductionTopology, WholeImageCompositer,
};
use meshflow::config::{CompositingSettings, TopologyKind};
use meshflow::error::FlowError;
use std::sync::Arc;

const W: usize = 8;
const H: usize = 4;

/// Rank `r` covers column `r` at depth `r + 1`, and every rank draws the
/// corner pixel at the same depth.
fn rank_image(rank: usize) -> Image {
    let mut img = Image::new(W, H);
    for y in 0..H {
        img.set_pixel(rank % W, y, [rank as f32, 0.0, 0.0], rank as f32 + 1.0);
    }
    img.set_pixel(W - 1, H - 1, [rank as f32, 1.0, 1.0], 0.5);
    img
}

fn serial_reference(ranks: usize) -> Image {
    let mut c = WholeImageCompositer::new(W, H);
    for r in 0..ranks {
        c.add_input(Arc::new(rank_image(r)), 0, 0).unwrap();
    }
    c.execute().unwrap()
}

#[test]
fn test_parallel_matches_serial() {
    for ranks in [1, 2, 3, 5, 8] {
        let results = run_ranks(ranks, |comm| {
            let mut c = WholeImageCompositer::new(W, H);
            c.add_input(Arc::new(rank_image(comm.rank())), 0, 0).unwrap();
            c.execute_parallel(&comm).unwrap()
        });
        let root = results[0].as_ref().expect("root holds the result");
        assert_eq!(root, &serial_reference(ranks), "{} ranks", ranks);
        assert!(results[1..].iter().all(Option::is_none));
    }
}

#[test]
fn test_depth_tie_goes_to_lowest_rank() {
    let results = run_ranks(6, |comm| {
        let mut c = WholeImageCompositer::new(W, H);
        c.add_input(Arc::new(rank_image(comm.rank())), 0, 0).unwrap();
        c.execute_parallel(&comm).unwrap()
    });
    let root = results[0].as_ref().unwrap();
    assert_eq!(root.rgb(W - 1, H - 1), [0.0, 1.0, 1.0]);
}

#[test]
fn test_settings_drive_broadcast_and_topology() {
    let settings = CompositingSettings {
        background: [0.1, 0.2, 0.3],
        all_procs_need_result: true,
        topology: TopologyKind::Linear,
    };
    let results = run_ranks(4, move |comm| {
        let mut c = WholeImageCompositer::from_settings(W, H, &settings);
        // Rank 2 contributes nothing and falls back to the background.
        if comm.rank() != 2 {
            c.add_input(Arc::new(rank_image(comm.rank())), 0, 0).unwrap();
        }
        c.execute_parallel(&comm).unwrap()
    });
    let first = results[0].clone().unwrap();
    assert!(results.iter().all(|r| r.as_ref() == Some(&first)));
    assert_eq!(first.rgb(1, 0), [1.0, 0.0, 0.0]);
    assert_eq!(first.z(2, 0), f32::INFINITY);
}

#[test]
fn test_missing_sub_image_fails_every_rank() {
    let results = run_ranks(3, |comm| {
        let mut c = WholeImageCompositer::new(W, H).with_expected_inputs(1);
        if comm.rank() != 1 {
            c.add_input(Arc::new(rank_image(comm.rank())), 0, 0).unwrap();
        }
        c.execute_parallel(&comm)
    });
    assert!(matches!(
        results[1],
        Err(FlowError::MissingSubImage { expected: 1, received: 0 })
    ));
    // Rank 0 waits for rank 1, which left without sending.
    assert!(matches!(results[0], Err(FlowError::Communication(_))));
}

#[test]
fn test_all_reduce_sum_across_ranks() {
    let results = run_ranks(7, |comm| {
        let r = comm.rank() as f64;
        comm.all_reduce_sum(&[1.0, r, r * r]).unwrap()
    });
    for sums in results {
        assert_eq!(sums, vec![7.0, 21.0, 91.0]);
    }
}

#[test]
fn test_program_is_reusable_data() {
    let program = BinaryTreeTopology.make_program(&[10, 20, 30, 40, 50, 60, 70, 80]);
    assert_eq!(program.number_of_rounds(), 3);
    assert_eq!(program.root(), Some(10));
    let rendered = program.to_string();
    assert!(rendered.contains("round 2: (10,50)"));
}
