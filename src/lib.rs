//! # meshflow: streaming data-flow engine for domain-decomposed meshes
//!
//! A demand-driven pipeline for scientific visualization. Sinks pull data
//! through chains of filters by handing a [`Contract`] upstream; sources
//! read only the domains the contract's SIL restriction selects, and each
//! filter processes its input one domain at a time.
//!
//! ## Architecture
//!
//! - **Data**: [`DataTree`]s of per-domain mesh chunks wrapped in
//!   [`DataObject`]s with attributes and validity
//! - **SIL**: subset restrictions and the interval tree used to prune domains
//! - **Pipeline**: an arena of filters and sources with memoized updates
//! - **Time loop**: run one pipeline across timesteps, skipping bad ones
//! - **Compositing**: depth-merge partial images, locally or across ranks
//! - **Query**: two-pass queries with a global reduction in between
//! - **Xfer**: byte-order-tagged buffers for anything crossing ranks
//!
//! ## Configuration
//!
//! Engine settings live in `engine.toml` under the platform config directory
//! (`~/.config/meshflow/` on Linux). Every field has a default.
//!
//! ## Example
//!
//! ```ignore
//! use meshflow::{
//!     data::SyntheticDatabase,
//!     pipeline::{BoxClip, Contract, DatabaseSource, EngineContext, Pipeline},
//!     sil::SilRestriction,
//!     types::Extents,
//! };
//!
//! let mut pipeline = Pipeline::new(EngineContext::default());
//! let src = pipeline.add_source(DatabaseSource::new(SyntheticDatabase::new_2d(4, 4, 8, 1)));
//! let clip = pipeline.add_filter(
//!     BoxClip::new(Extents::from_ranges(vec![[0.5, 2.5], [0.5, 2.5]])).into_filter(),
//! );
//! pipeline.connect(src, clip)?;
//!
//! let contract = Contract::new(SilRestriction::all_domains("mesh", 16), "pressure");
//! let output = pipeline.update(clip, &contract)?;
//! println!("{} domains survived", output.tree("example")?.number_of_leaves());
//! ```

pub mod composite;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod sil;
pub mod time_loop;
pub mod types;
pub mod xfer;

// Re-export commonly used types
pub use composite::{Communicator, Image, ImageCompositer, LocalCommunicator, WholeImageCompositer};
pub use config::EngineConfig;
pub use data::{DataObject, DataTree, SyntheticDatabase};
pub use error::{ErrorKind, FlowError, FlowResult};
pub use pipeline::{Contract, EngineContext, Filter, NodeId, Pipeline};
pub use query::{CompactnessQuery, TwoPassDatasetQuery};
pub use sil::{IntervalTree, SilRestriction};
pub use time_loop::{TimeLoopFilter, TimeLoopRange};
pub use types::{DomainId, Extents};
