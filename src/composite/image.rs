//! Rendered images with a depth buffer.

use crate::error::{FlowError, FlowResult};
use crate::xfer::{MessageReader, MessageWriter, Wire};

/// RGB colour plus z per pixel, optionally alpha.
///
/// Pixels are stored row-major. A fresh image is black at z = +inf, so any
/// rendered sample lies in front of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: usize,
    height: usize,
    rgb: Vec<[f32; 3]>,
    z: Vec<f32>,
    alpha: Option<Vec<f32>>,
}

impl Image {
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, [0.0; 3])
    }

    /// Background image: every pixel `colour` at infinite depth.
    pub fn filled(width: usize, height: usize, colour: [f32; 3]) -> Self {
        let n = width * height;
        Self {
            width,
            height,
            rgb: vec![colour; n],
            z: vec![f32::INFINITY; n],
            alpha: None,
        }
    }

    /// Add an alpha channel, fully transparent.
    pub fn with_alpha(mut self) -> Self {
        self.alpha = Some(vec![0.0; self.rgb.len()]);
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        self.rgb.len()
    }

    pub fn has_alpha(&self) -> bool {
        self.alpha.is_some()
    }

    pub fn same_size(&self, other: &Image) -> bool {
        self.width == other.width && self.height == other.height
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    pub fn rgb(&self, x: usize, y: usize) -> [f32; 3] {
        self.rgb[self.index(x, y)]
    }

    pub fn z(&self, x: usize, y: usize) -> f32 {
        self.z[self.index(x, y)]
    }

    pub fn alpha(&self, x: usize, y: usize) -> Option<f32> {
        let i = self.index(x, y);
        self.alpha.as_ref().map(|a| a[i])
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: [f32; 3], z: f32) {
        let i = self.index(x, y);
        self.rgb[i] = rgb;
        self.z[i] = z;
        if let Some(alpha) = &mut self.alpha {
            alpha[i] = 1.0;
        }
    }

    pub fn depths(&self) -> &[f32] {
        &self.z
    }

    /// Number of pixels with a finite depth.
    pub fn covered_pixels(&self) -> usize {
        self.z.iter().filter(|z| z.is_finite()).count()
    }

    /// Give an opaque image an alpha channel: covered pixels become opaque,
    /// background pixels transparent.
    pub(crate) fn promote_alpha(&mut self) {
        if self.alpha.is_none() {
            self.alpha = Some(self.z.iter().map(|z| if z.is_finite() { 1.0 } else { 0.0 }).collect());
        }
    }

    /// Copy pixel `i` from `src`. A sample without alpha is opaque.
    pub(crate) fn copy_pixel(&mut self, src: &Image, i: usize) {
        self.rgb[i] = src.rgb[i];
        self.z[i] = src.z[i];
        if let Some(dst) = &mut self.alpha {
            dst[i] = src.alpha.as_ref().map_or(1.0, |s| s[i]);
        }
    }

    pub(crate) fn raw_depth(&self, i: usize) -> f32 {
        self.z[i]
    }
}

impl Wire for Image {
    fn encode(&self, w: &mut MessageWriter) -> FlowResult<()> {
        w.write_len(self.width)?;
        w.write_len(self.height)?;
        w.write_int(i32::from(self.alpha.is_some()));
        for (i, rgb) in self.rgb.iter().enumerate() {
            for &c in rgb {
                w.write_float(c);
            }
            w.write_float(self.z[i]);
            if let Some(alpha) = &self.alpha {
                w.write_float(alpha[i]);
            }
        }
        Ok(())
    }

    fn decode(r: &mut MessageReader) -> FlowResult<Self> {
        let width = r.read_len()?;
        let height = r.read_len()?;
        let has_alpha = match r.read_int()? {
            0 => false,
            1 => true,
            other => return Err(FlowError::Wire(format!("bad alpha flag {}", other))),
        };
        let n = width
            .checked_mul(height)
            .ok_or_else(|| FlowError::Wire(format!("image {}x{} overflows", width, height)))?;
        let floats_per_pixel = if has_alpha { 5 } else { 4 };
        r.ensure_available(n, floats_per_pixel * 4)?;

        let mut image = Image::new(width, height);
        if has_alpha {
            image = image.with_alpha();
        }
        for i in 0..n {
            image.rgb[i] = [r.read_float()?, r.read_float()?, r.read_float()?];
            image.z[i] = r.read_float()?;
            if let Some(alpha) = &mut image.alpha {
                alpha[i] = r.read_float()?;
            }
        }
        Ok(image)
    }
}
