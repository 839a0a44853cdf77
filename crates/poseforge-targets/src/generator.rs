//! Heatmap target generation: sparse keypoints to dense supervision maps.

use candle_core::Tensor;
use serde::{Deserialize, Serialize};

use poseforge_core::{Error, HeatmapMode, Result};

use crate::coords::normalize_keypoints;
use crate::grid::Grid;
use crate::kernel::{ChannelView, Kernel, PairView, Rasterizer};

/// Default standard deviation for location-refinement offsets.
pub const DEFAULT_LOCREF_STD: f32 = 7.2801;

fn default_generate_locref() -> bool {
    true
}

fn default_locref_std() -> f32 {
    DEFAULT_LOCREF_STD
}

/// Configuration for a heatmap target generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Number of heatmap channels to generate
    pub num_heatmaps: usize,

    /// Kernel radius in input pixels; three standard deviations of the
    /// Gaussian kernel
    pub pos_dist_thresh: f32,

    /// Channel semantics: keypoint types or subject identities
    #[serde(default)]
    pub heatmap_mode: HeatmapMode,

    /// Whether to also build location-refinement maps and masks
    #[serde(default = "default_generate_locref")]
    pub generate_locref: bool,

    /// Standard deviation scaling the location-refinement offsets
    #[serde(default = "default_locref_std")]
    pub locref_std: f32,
}

impl GeneratorConfig {
    /// Configuration with the default mode (keypoint channels), locref
    /// generation enabled, and the default locref standard deviation.
    pub fn new(num_heatmaps: usize, pos_dist_thresh: f32) -> Self {
        Self {
            num_heatmaps,
            pos_dist_thresh,
            heatmap_mode: HeatmapMode::Keypoint,
            generate_locref: true,
            locref_std: DEFAULT_LOCREF_STD,
        }
    }
}

/// Prediction tensors the generated targets must match.
///
/// Only shapes and devices are read here; the predicted values themselves
/// are left to the loss computation.
#[derive(Debug, Clone)]
pub struct Predictions {
    /// Predicted heatmap, (batch, channels, height, width)
    pub heatmap: Tensor,
    /// Predicted locref field, (batch, 2 * channels, height, width);
    /// required when locref generation is enabled
    pub locref: Option<Tensor>,
}

/// Supervision target paired with optional per-element weights.
#[derive(Debug, Clone)]
pub struct TargetMap {
    pub target: Tensor,
    pub weights: Option<Tensor>,
}

/// Dense training targets produced from one annotated batch.
#[derive(Debug, Clone)]
pub struct TargetBundle {
    /// (batch, channels, height, width) heatmap target
    pub heatmap: TargetMap,
    /// (batch, 2 * channels, height, width) offsets with validity weights,
    /// present iff locref generation is enabled
    pub locref: Option<TargetMap>,
}

/// Generates dense heatmap (and optional locref) targets from sparse
/// keypoint annotations.
///
/// The kernel shape is fixed at construction; every call to
/// [`forward`](Self::forward) allocates fresh buffers, so a generator is
/// safe to reuse across batches of varying image sizes.
pub struct HeatmapGenerator {
    config: GeneratorConfig,
    rasterizer: Rasterizer,
}

impl HeatmapGenerator {
    pub fn new(kernel: Kernel, config: GeneratorConfig) -> Result<Self> {
        if config.num_heatmaps == 0 {
            return Err(Error::Config("num_heatmaps must be positive".to_string()));
        }
        if config.pos_dist_thresh <= 0.0 {
            return Err(Error::Config(format!(
                "pos_dist_thresh must be positive, got {}",
                config.pos_dist_thresh
            )));
        }
        if config.locref_std <= 0.0 {
            return Err(Error::Config(format!(
                "locref_std must be positive, got {}",
                config.locref_std
            )));
        }

        let rasterizer = Rasterizer::new(kernel, config.pos_dist_thresh, config.locref_std);
        Ok(Self { config, rasterizer })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn kernel(&self) -> Kernel {
        self.rasterizer.kernel()
    }

    /// Builds the supervision targets for one annotated batch.
    ///
    /// # Arguments
    /// * `inputs` - Input image batch (batch, channels, height, width);
    ///   only the pixel dimensions are read
    /// * `outputs` - Prediction tensors providing the feature-grid shape and
    ///   the device the targets should live on
    /// * `keypoints` - Annotated (x, y) pixel coordinates, shape
    ///   (batch, subject, keypoint, 2) or (batch, keypoint, 2); coordinates
    ///   <= 0 mark absent annotations
    ///
    /// # Returns
    /// The target bundle in (batch, channel, height, width) layout.
    pub fn forward(
        &self,
        inputs: &Tensor,
        outputs: &Predictions,
        keypoints: &Tensor,
    ) -> Result<TargetBundle> {
        let (batch_size, _, input_h, input_w) = inputs.dims4()?;
        let (_, _, height, width) = outputs.heatmap.dims4()?;

        let groups = normalize_keypoints(keypoints, self.config.heatmap_mode)?;
        if groups.len() != batch_size {
            return Err(Error::Shape {
                expected: format!("keypoint batch of {batch_size}"),
                actual: format!("{}", groups.len()),
            });
        }

        let grid = Grid::new(height, width, input_h as f32, input_w as f32);

        let channels = self.config.num_heatmaps;
        let plane = height * width;
        let mut heatmap = vec![0.0f32; batch_size * plane * channels];
        let locref_len = if self.config.generate_locref {
            batch_size * plane * channels * 2
        } else {
            0
        };
        let mut locref_map = vec![0.0f32; locref_len];
        let mut locref_mask = vec![0.0f32; locref_len];

        let mut rendered = 0usize;
        let mut skipped = 0usize;
        for (b, channel_groups) in groups.iter().enumerate() {
            if channel_groups.len() != channels {
                return Err(Error::Shape {
                    expected: format!("{channels} heatmap channels"),
                    actual: format!("{}", channel_groups.len()),
                });
            }

            for (channel, subjects) in channel_groups.iter().enumerate() {
                for &keypoint in subjects {
                    // (row, col) both strictly positive, else the annotation
                    // is absent and must leave every buffer untouched.
                    if keypoint[0] <= 0.0 || keypoint[1] <= 0.0 {
                        skipped += 1;
                        continue;
                    }
                    rendered += 1;

                    let batch_slice =
                        &mut heatmap[b * plane * channels..(b + 1) * plane * channels];
                    let heatmap_view = ChannelView::new(batch_slice, width, channels, channel);

                    let locref_views = if self.config.generate_locref {
                        let extent = plane * channels * 2;
                        Some((
                            PairView::new(
                                &mut locref_map[b * extent..(b + 1) * extent],
                                width,
                                channels * 2,
                                channel * 2,
                            ),
                            PairView::new(
                                &mut locref_mask[b * extent..(b + 1) * extent],
                                width,
                                channels * 2,
                                channel * 2,
                            ),
                        ))
                    } else {
                        None
                    };

                    self.rasterizer
                        .update(heatmap_view, &grid, keypoint, locref_views);
                }
            }
        }

        tracing::debug!(
            "Rasterized {} keypoints into {}x{}x{} targets ({} absent)",
            rendered,
            height,
            width,
            channels,
            skipped
        );

        self.assemble(
            outputs,
            heatmap,
            locref_map,
            locref_mask,
            batch_size,
            height,
            width,
        )
    }

    /// Transposes the internal (batch, H, W, C) buffers to the
    /// (batch, C, H, W) layout the loss heads expect and places them on the
    /// devices of the matching prediction tensors.
    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        outputs: &Predictions,
        heatmap: Vec<f32>,
        locref_map: Vec<f32>,
        locref_mask: Vec<f32>,
        batch_size: usize,
        height: usize,
        width: usize,
    ) -> Result<TargetBundle> {
        let channels = self.config.num_heatmaps;

        let heatmap = Tensor::from_vec(
            transpose_to_chw(&heatmap, batch_size, height, width, channels),
            (batch_size, channels, height, width),
            outputs.heatmap.device(),
        )?;

        let locref = if self.config.generate_locref {
            let locref_pred = outputs.locref.as_ref().ok_or_else(|| {
                Error::Contract(
                    "locref targets requested but no locref prediction was supplied".to_string(),
                )
            })?;

            let shape = (batch_size, channels * 2, height, width);
            let target = Tensor::from_vec(
                transpose_to_chw(&locref_map, batch_size, height, width, channels * 2),
                shape,
                locref_pred.device(),
            )?;
            let weights = Tensor::from_vec(
                transpose_to_chw(&locref_mask, batch_size, height, width, channels * 2),
                shape,
                locref_pred.device(),
            )?;

            Some(TargetMap {
                target,
                weights: Some(weights),
            })
        } else {
            None
        };

        Ok(TargetBundle {
            heatmap: TargetMap {
                target: heatmap,
                weights: None,
            },
            locref,
        })
    }
}

/// Re-lays a flat (batch, height, width, channels) buffer out as
/// (batch, channels, height, width). Bit-exact, no data loss.
fn transpose_to_chw(
    src: &[f32],
    batch: usize,
    height: usize,
    width: usize,
    channels: usize,
) -> Vec<f32> {
    let mut out = vec![0.0f32; src.len()];
    for b in 0..batch {
        for i in 0..height {
            for j in 0..width {
                for c in 0..channels {
                    out[((b * channels + c) * height + i) * width + j] =
                        src[((b * height + i) * width + j) * channels + c];
                }
            }
        }
    }
    out
}

/// Builds a generator from the kernel name used in training configurations.
///
/// Accepts `"gaussian"` or `"plateau"`, case-insensitively; anything else is
/// a configuration error.
pub fn build_generator(kernel: &str, config: GeneratorConfig) -> Result<HeatmapGenerator> {
    HeatmapGenerator::new(kernel.parse()?, config)
}
