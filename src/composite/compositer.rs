//! Z-buffer compositing of partial images.

use crate::composite::comm::Communicator;
use crate::composite::image::Image;
use crate::composite::program::{topology_for, BinaryTreeTopology, ReductionTopology};
use crate::config::CompositingSettings;
use crate::error::{FlowError, FlowResult, ResultExt};
use crate::xfer::Wire;
use std::sync::Arc;

/// Per pixel, take `src` wherever it is strictly nearer than `dst`.
///
/// Equal depths keep `dst`, so the earlier sample wins a tie. If `src` carries
/// alpha, `dst` gains an alpha channel first; opaque samples write alpha 1.
pub fn merge_by_depth(dst: &mut Image, src: &Image) -> FlowResult<()> {
    if !dst.same_size(src) {
        return Err(FlowError::Composite(format!(
            "cannot merge a {}x{} image into {}x{}",
            src.width(),
            src.height(),
            dst.width(),
            dst.height()
        )));
    }
    if src.has_alpha() {
        dst.promote_alpha();
    }
    for i in 0..dst.pixel_count() {
        if src.raw_depth(i) < dst.raw_depth(i) {
            dst.copy_pixel(src, i);
        }
    }
    Ok(())
}

pub trait ImageCompositer {
    fn set_output_size(&mut self, width: usize, height: usize);

    /// Queue a sub-image whose top-left corner sits at (`row`, `col`).
    fn add_input(&mut self, image: Arc<Image>, row: usize, col: usize) -> FlowResult<()>;

    /// Composite the queued inputs locally.
    fn execute(&mut self) -> FlowResult<Image>;

    /// Composite the local result with every other rank's.
    ///
    /// Returns the image on the root, and on every rank when the result is
    /// broadcast back. Other ranks get `None`.
    fn execute_parallel(&mut self, comm: &dyn Communicator) -> FlowResult<Option<Image>>;
}

/// Compositer for full-frame sub-images only.
///
/// Every input must start at the origin and match the output size, so the
/// merge is a plain per-pixel depth compare with no tile placement.
#[derive(Debug)]
pub struct WholeImageCompositer {
    width: usize,
    height: usize,
    inputs: Vec<Arc<Image>>,
    expected_inputs: Option<usize>,
    background: [f32; 3],
    all_procs_need_result: bool,
    topology: Box<dyn ReductionTopology>,
}

impl WholeImageCompositer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            inputs: Vec::new(),
            expected_inputs: None,
            background: [0.0; 3],
            all_procs_need_result: false,
            topology: Box::new(BinaryTreeTopology),
        }
    }

    pub fn from_settings(width: usize, height: usize, settings: &CompositingSettings) -> Self {
        Self::new(width, height)
            .with_background(settings.background)
            .with_all_procs_need_result(settings.all_procs_need_result)
            .with_topology(topology_for(settings.topology))
    }

    pub fn with_background(mut self, colour: [f32; 3]) -> Self {
        self.background = colour;
        self
    }

    /// Fail `execute` unless exactly this many inputs were added.
    pub fn with_expected_inputs(mut self, n: usize) -> Self {
        self.expected_inputs = Some(n);
        self
    }

    pub fn with_all_procs_need_result(mut self, yes: bool) -> Self {
        self.all_procs_need_result = yes;
        self
    }

    pub fn with_topology(mut self, topology: Box<dyn ReductionTopology>) -> Self {
        self.topology = topology;
        self
    }

    pub fn number_of_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn clear_inputs(&mut self) {
        self.inputs.clear();
    }

    fn background_image(&self) -> Image {
        Image::filled(self.width, self.height, self.background)
    }
}

impl ImageCompositer for WholeImageCompositer {
    fn set_output_size(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
    }

    fn add_input(&mut self, image: Arc<Image>, row: usize, col: usize) -> FlowResult<()> {
        if row != 0 || col != 0 {
            return Err(FlowError::Composite(format!(
                "sub-image origin ({}, {}) is not full-frame",
                row, col
            )));
        }
        if image.width() != self.width || image.height() != self.height {
            return Err(FlowError::Composite(format!(
                "sub-image is {}x{}, output is {}x{}",
                image.width(),
                image.height(),
                self.width,
                self.height
            )));
        }
        self.inputs.push(image);
        Ok(())
    }

    fn execute(&mut self) -> FlowResult<Image> {
        if let Some(expected) = self.expected_inputs {
            if self.inputs.len() != expected {
                return Err(FlowError::MissingSubImage {
                    expected,
                    received: self.inputs.len(),
                });
            }
        }
        let Some((first, rest)) = self.inputs.split_first() else {
            return Ok(self.background_image());
        };
        let mut result = Image::clone(first);
        for image in rest {
            merge_by_depth(&mut result, image)?;
        }
        tracing::debug!(
            "composited {} sub-images, {} pixels covered",
            self.inputs.len(),
            result.covered_pixels()
        );
        Ok(result)
    }

    fn execute_parallel(&mut self, comm: &dyn Communicator) -> FlowResult<Option<Image>> {
        let me = comm.rank();
        let mut local = self.execute()?;
        let program = self.topology.make_program(&comm.ranks());
        tracing::debug!(
            "rank {} compositing via {} in {} rounds",
            me,
            self.topology.name(),
            program.number_of_rounds()
        );

        for round in 0..program.number_of_rounds() {
            let Some(pair) = program.pair_for(round, me) else {
                continue;
            };
            if pair.sender == me {
                comm.send(pair.receiver, local.to_bytes()?)?;
            } else {
                let bytes = comm.recv(pair.sender)?;
                let theirs = Image::from_bytes(&bytes)
                    .with_context(|| format!("sub-image from rank {}", pair.sender))?;
                // The receiver's own pixels win ties.
                merge_by_depth(&mut local, &theirs)?;
            }
        }

        let root = program.root().unwrap_or(me);
        if me == root {
            if self.all_procs_need_result {
                let bytes = local.to_bytes()?;
                for peer in comm.ranks().into_iter().filter(|&r| r != root) {
                    comm.send(peer, bytes.clone())?;
                }
            }
            Ok(Some(local))
        } else if self.all_procs_need_result {
            Ok(Some(Image::from_bytes(&comm.recv(root)?)?))
        } else {
            Ok(None)
        }
    }
}
