//! meshflow engine - demo entry point
//!
//! Builds a pipeline over a synthetic block-decomposed dataset, runs it
//! across timesteps, answers a two-pass query, and composites per-rank
//! images across in-process ranks.
//!
//! Usage: `meshflow [config-path]`

use anyhow::{anyhow, Context, Result};
use meshflow::{
    composite::{Communicator, Image, ImageCompositer, LocalCommunicator, SerialCommunicator, WholeImageCompositer},
    config::{default_config_path, EngineConfig},
    data::{synthetic::PRESSURE, DataTree, SyntheticDatabase},
    pipeline::{BoxClip, Contract, DatabaseSource, EngineContext, EngineMessage, Pipeline, VariableTransform},
    query::{CompactnessQuery, QueryResult, TwoPassDatasetQuery},
    sil::SilRestriction,
    time_loop::{CollectAllTimesteps, TimeLoopFilter, TimeLoopRange},
    types::Extents,
    NodeId,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const BLOCKS: usize = 4;
const CELLS_PER_BLOCK: usize = 16;
const TIMESTEPS: usize = 6;
const RANKS: usize = 4;
const IMAGE_SIZE: usize = 64;

fn database() -> SyntheticDatabase {
    // Timestep 3 is corrupt; the time loop skips it.
    SyntheticDatabase::new_2d(BLOCKS, BLOCKS, CELLS_PER_BLOCK, TIMESTEPS).failing_at(3)
}

fn clip_bounds() -> Extents {
    Extents::from_ranges(vec![[0.5, 3.5], [0.5, 3.5]])
}

/// source -> box clip -> variable transform. Returns the clip and transform nodes.
fn build_pipeline(pipeline: &mut Pipeline) -> Result<(NodeId, NodeId, usize, usize)> {
    let mut source = DatabaseSource::new(database());
    let tree = source.interval_tree().context("building the interval tree")?;
    let domains = source.number_of_domains();
    let timesteps = source.number_of_timesteps();

    let src = pipeline.add_source(source);
    let clip = pipeline.add_filter(BoxClip::new(clip_bounds()).with_interval_tree(tree).into_filter());
    let xf = pipeline.add_filter(VariableTransform::new(PRESSURE, "pressure_squared", |t| t[0] * t[0]).into_filter());
    pipeline.connect(src, clip)?;
    pipeline.connect(clip, xf)?;
    Ok((clip, xf, domains, timesteps))
}

/// Splat each cell centre into the image, coloured by domain.
fn render(tree: &DataTree, bounds: &Extents, number_of_domains: usize) -> Image {
    let mut image = Image::new(IMAGE_SIZE, IMAGE_SIZE);
    let pixel = |v: f64, axis: usize| -> usize {
        let [lo, hi] = bounds.range(axis);
        let t = ((v - lo) / (hi - lo)).clamp(0.0, 1.0);
        ((t * IMAGE_SIZE as f64) as usize).min(IMAGE_SIZE - 1)
    };
    for leaf in tree.leaves() {
        let Some(mesh) = leaf.mesh() else { continue };
        let shade = leaf.domain() as f32 / number_of_domains.max(1) as f32;
        for c in 0..mesh.number_of_cells() {
            let p = mesh.cell_center(c);
            let (x, y) = (pixel(p[0], 0), pixel(p[1], 1));
            let z = 1.0 + p[2] as f32;
            if z < image.z(x, y) {
                image.set_pixel(x, y, [shade, 0.5, 1.0 - shade], z);
            }
        }
    }
    image
}

/// One rank's share of the parallel run.
fn run_rank(comm: LocalCommunicator, ctx: EngineContext, config: Arc<EngineConfig>) -> Result<Option<(QueryResult, Image)>> {
    let rank = comm.rank();
    let mut pipeline = Pipeline::new(ctx.for_rank(rank, comm.size()));
    let (clip, _, domains, _) = build_pipeline(&mut pipeline)?;

    let restriction = SilRestriction::all_domains("mesh", domains).restrict_to_rank(rank, comm.size());
    tracing::debug!("rank {} owns domains {:?}", rank, restriction.domain_list());
    let contract = Contract::new(restriction, PRESSURE).with_ghost_zones(config.execution.ghost_zones);

    let mut query = TwoPassDatasetQuery::new(CompactnessQuery::new());
    let result = query.perform_on_pipeline(&mut pipeline, clip, &contract, &comm)?;

    let tree = pipeline.update(clip, &contract)?.tree("render")?.clone();
    let mut compositer = WholeImageCompositer::from_settings(IMAGE_SIZE, IMAGE_SIZE, &config.compositing);
    compositer.add_input(Arc::new(render(&tree, &clip_bounds(), domains)), 0, 0)?;
    let image = compositer.execute_parallel(&comm)?;
    Ok(image.map(|image| (result, image)))
}

fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from).or_else(default_config_path);
    let config = match &config_path {
        Some(path) if path.exists() => EngineConfig::load(path).with_context(|| format!("loading {:?}", path))?,
        _ => EngineConfig::default(),
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let started = chrono::Local::now();
    tracing::info!("Starting meshflow engine at {}", started.format("%Y-%m-%d %H:%M:%S"));

    let (ctx, bridge) = EngineContext::new(config.execution.clone());
    let mut pipeline = Pipeline::new(ctx.clone());
    let (clip, xf, domains, timesteps) = build_pipeline(&mut pipeline)?;

    let mut contract = Contract::new(SilRestriction::all_domains("mesh", domains), PRESSURE)
        .with_ghost_zones(config.execution.ghost_zones);
    if !config.execution.streaming {
        contract = contract.without_streaming();
    }

    // Time loop over the derived variable
    let mut time_loop = TimeLoopFilter::new(TimeLoopRange::from_settings(&config.time_loop), CollectAllTimesteps::new())
        .with_available_timesteps(timesteps);
    let leaves = time_loop.run(&mut pipeline, xf, &contract)?.tree("main")?.number_of_leaves();
    tracing::info!(
        "Time loop produced {} leaves; valid {:?}, skipped {:?}",
        leaves,
        time_loop.valid_times(),
        time_loop.skipped_times()
    );
    time_loop.release_data();

    // Serial two-pass query
    let mut query = TwoPassDatasetQuery::new(CompactnessQuery::new());
    let serial = query.perform_on_pipeline(&mut pipeline, clip, &contract.with_timestep(0), &SerialCommunicator)?;
    tracing::info!("Serial: {}", serial.message);
    pipeline.release_all();

    // Parallel query and composite over in-process ranks
    let config = Arc::new(config);
    let handles: Vec<_> = LocalCommunicator::group(RANKS)
        .into_iter()
        .map(|comm| {
            let ctx = ctx.clone();
            let config = Arc::clone(&config);
            std::thread::spawn(move || run_rank(comm, ctx, config))
        })
        .collect();

    for (rank, handle) in handles.into_iter().enumerate() {
        let outcome = handle.join().map_err(|_| anyhow!("rank {} panicked", rank))?;
        if let Some((result, image)) = outcome.with_context(|| format!("rank {}", rank))? {
            tracing::info!(
                "Rank {}: {}; composited image has {} of {} pixels covered",
                rank,
                result.message,
                image.covered_pixels(),
                image.pixel_count()
            );
        }
    }

    for message in bridge.drain() {
        match message {
            EngineMessage::Warning(w) => tracing::info!("Engine warning: {}", w),
            EngineMessage::TimeLoopFinished { valid, skipped } => {
                tracing::info!("Time loop finished: {} valid, {} skipped", valid, skipped)
            }
            other => tracing::trace!("{:?}", other),
        }
    }

    ctx.shutdown();
    let elapsed = chrono::Local::now() - started;
    tracing::info!("Done in {} ms", elapsed.num_milliseconds());
    Ok(())
}
