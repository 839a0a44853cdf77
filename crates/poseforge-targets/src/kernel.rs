//! Rasterization kernels: per-keypoint update rules for the target buffers.
//!
//! A keypoint is rendered either as a smooth Gaussian falloff or as a hard
//! 0/1 plateau disc. The kernel is chosen once when the generator is built;
//! per-keypoint dispatch is a plain match on the tag.

use std::str::FromStr;

use poseforge_core::Error;

use crate::grid::Grid;

/// Mutable view of one heatmap channel inside a (height, width, channels)
/// batch slice. The channel axis is innermost, so cells are strided.
pub struct ChannelView<'a> {
    data: &'a mut [f32],
    width: usize,
    channels: usize,
    channel: usize,
}

impl<'a> ChannelView<'a> {
    pub fn new(data: &'a mut [f32], width: usize, channels: usize, channel: usize) -> Self {
        Self {
            data,
            width,
            channels,
            channel,
        }
    }

    #[inline]
    fn index(&self, i: usize, j: usize) -> usize {
        (i * self.width + j) * self.channels + self.channel
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.data[self.index(i, j)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f32) {
        let at = self.index(i, j);
        self.data[at] = value;
    }
}

/// Mutable view of one channel's interleaved (dx, dy) component pair inside
/// a (height, width, 2 * channels) locref slice: components 2k and 2k + 1
/// belong to channel k.
pub struct PairView<'a> {
    data: &'a mut [f32],
    width: usize,
    stride: usize,
    base: usize,
}

impl<'a> PairView<'a> {
    /// `stride` is the full last-axis extent (2 * channels), `base` the
    /// first component owned by the channel (2 * channel).
    pub fn new(data: &'a mut [f32], width: usize, stride: usize, base: usize) -> Self {
        Self {
            data,
            width,
            stride,
            base,
        }
    }

    #[inline]
    fn index(&self, i: usize, j: usize, component: usize) -> usize {
        (i * self.width + j) * self.stride + self.base + component
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize, component: usize) -> f32 {
        self.data[self.index(i, j, component)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, component: usize, value: f32) {
        let at = self.index(i, j, component);
        self.data[at] = value;
    }
}

/// Kernel shape used to render a keypoint onto the feature grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    /// Smooth falloff, `exp(-dist^2 / (2 * std^2))`.
    Gaussian,
    /// Hard 0/1 disc of radius `pos_dist_thresh`.
    Plateau,
}

impl FromStr for Kernel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "gaussian" => Ok(Self::Gaussian),
            "plateau" => Ok(Self::Plateau),
            other => Err(Error::Config(format!("unknown target kernel: {other}"))),
        }
    }
}

/// Applies one keypoint's kernel response to the target buffers.
///
/// Holds the constants derived from the generator configuration:
/// `std = 2 * pos_dist_thresh / 3` (the threshold is three standard
/// deviations) and `locref_scale = 1 / locref_std`.
#[derive(Debug, Clone)]
pub struct Rasterizer {
    kernel: Kernel,
    dist_thresh_sq: f32,
    std: f32,
    locref_scale: f32,
}

impl Rasterizer {
    pub fn new(kernel: Kernel, dist_thresh: f32, locref_std: f32) -> Self {
        Self {
            kernel,
            dist_thresh_sq: dist_thresh * dist_thresh,
            std: 2.0 * dist_thresh / 3.0,
            locref_scale: 1.0 / locref_std,
        }
    }

    pub fn kernel(&self) -> Kernel {
        self.kernel
    }

    /// Merges one keypoint into its channel buffers.
    ///
    /// `keypoint` is (row, col) in input-pixel space; the caller skips absent
    /// annotations (any coordinate <= 0) before calling, so the kernel never
    /// sees one. The heatmap is max-merged so earlier subjects in the same
    /// channel are never dimmed; locref map and mask are direct assignment,
    /// last subject wins.
    pub fn update(
        &self,
        heatmap: ChannelView<'_>,
        grid: &Grid,
        keypoint: [f32; 2],
        locref: Option<(PairView<'_>, PairView<'_>)>,
    ) {
        match self.kernel {
            Kernel::Gaussian => self.update_gaussian(heatmap, grid, keypoint, locref),
            Kernel::Plateau => self.update_plateau(heatmap, grid, keypoint, locref),
        }
    }

    fn update_gaussian(
        &self,
        mut heatmap: ChannelView<'_>,
        grid: &Grid,
        keypoint: [f32; 2],
        mut locref: Option<(PairView<'_>, PairView<'_>)>,
    ) {
        let denom = 2.0 * self.std * self.std;

        for i in 0..grid.height() {
            for j in 0..grid.width() {
                let dist_sq = grid.dist_sq(i, j, keypoint);
                let response = (-dist_sq / denom).exp();
                if response > heatmap.get(i, j) {
                    heatmap.set(i, j, response);
                }

                if let Some((map, mask)) = locref.as_mut() {
                    // The offset field covers the full grid: every cell gets
                    // an estimate toward this keypoint, with no radius cap.
                    map.set(i, j, 0, (keypoint[1] - grid.col(i, j)) * self.locref_scale);
                    map.set(i, j, 1, (keypoint[0] - grid.row(i, j)) * self.locref_scale);

                    // The validity disc is written whenever a mask buffer is
                    // supplied, independent of the map write above.
                    if dist_sq <= self.dist_thresh_sq {
                        mask.set(i, j, 0, 1.0);
                        mask.set(i, j, 1, 1.0);
                    }
                }
            }
        }
    }

    fn update_plateau(
        &self,
        mut heatmap: ChannelView<'_>,
        grid: &Grid,
        keypoint: [f32; 2],
        mut locref: Option<(PairView<'_>, PairView<'_>)>,
    ) {
        for i in 0..grid.height() {
            for j in 0..grid.width() {
                if grid.dist_sq(i, j, keypoint) > self.dist_thresh_sq {
                    continue;
                }

                heatmap.set(i, j, 1.0);

                if let Some((map, mask)) = locref.as_mut() {
                    map.set(i, j, 0, (keypoint[1] - grid.col(i, j)) * self.locref_scale);
                    map.set(i, j, 1, (keypoint[0] - grid.row(i, j)) * self.locref_scale);
                    mask.set(i, j, 0, 1.0);
                    mask.set(i, j, 1, 1.0);
                }
            }
        }
    }
}
