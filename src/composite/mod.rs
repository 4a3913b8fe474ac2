//! Image compositing and the reduction machinery behind it.
//!
//! Partial images from several sources are merged by depth, either within
//! one process ([`WholeImageCompositer::execute`]) or across a group of
//! ranks following a [`CommunicationProgram`].

pub mod comm;
pub mod compositer;
pub mod image;
pub mod program;

pub use comm::{Communicator, LocalCommunicator, SerialCommunicator};
pub use compositer::{merge_by_depth, ImageCompositer, WholeImageCompositer};
pub use image::Image;
pub use program::{
    topology_for, BinaryTreeTopology, CommunicationProgram, LinearTopology, RankPair, ReductionTopology, Round,
};
