//! Test data builders for pipelines over the synthetic database

use meshflow::data::SyntheticDatabase;
use meshflow::pipeline::{Contract, DatabaseSource, EngineContext, Pipeline};
use meshflow::sil::SilRestriction;
use meshflow::NodeId;

/// Builder for a source-only pipeline over a 2-D synthetic database
pub struct DatasetBuilder {
    blocks: (usize, usize),
    cells: usize,
    timesteps: usize,
    failing: Vec<usize>,
    ctx: EngineContext,
}

impl DatasetBuilder {
    pub fn new(bx: usize, by: usize) -> Self {
        Self {
            blocks: (bx, by),
            cells: 4,
            timesteps: 1,
            failing: Vec::new(),
            ctx: EngineContext::default(),
        }
    }

    pub fn cells(mut self, cells: usize) -> Self {
        self.cells = cells;
        self
    }

    pub fn timesteps(mut self, timesteps: usize) -> Self {
        self.timesteps = timesteps;
        self
    }

    pub fn failing_at(mut self, timestep: usize) -> Self {
        self.failing.push(timestep);
        self
    }

    pub fn context(mut self, ctx: EngineContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn database(&self) -> SyntheticDatabase {
        self.failing.iter().fold(
            SyntheticDatabase::new_2d(self.blocks.0, self.blocks.1, self.cells, self.timesteps),
            |db, &t| db.failing_at(t),
        )
    }

    pub fn domains(&self) -> usize {
        self.blocks.0 * self.blocks.1
    }

    /// A pipeline holding only the source, plus its node id.
    pub fn build(self) -> (Pipeline, NodeId) {
        let mut pipeline = Pipeline::new(self.ctx.clone());
        let source = pipeline.add_source(DatabaseSource::new(self.database()));
        (pipeline, source)
    }

    /// Contract for `variable` over every domain.
    pub fn contract(&self, variable: &str) -> Contract {
        Contract::new(SilRestriction::all_domains("mesh", self.domains()), variable)
    }
}
