//! # PoseForge-Targets
//!
//! Dense supervision targets for heatmap-based pose estimation.
//!
//! Sparse keypoint annotations (pixel coordinates of body parts, per subject)
//! are rasterized into the per-pixel targets a heatmap network trains against:
//!
//! 1. **Grid**: maps every feature-map cell to its center in input-pixel space
//! 2. **Coordinate normalizer**: regroups the annotation batch by heatmap channel
//! 3. **Rasterizer**: Gaussian or plateau kernel response, merged per subject
//! 4. **Assembler**: transposes to (batch, channel, height, width) tensors
//!
//! The produced bundle is consumed by the training loop's loss computation;
//! this crate performs no loss computation, inference, or I/O itself.

pub mod coords;
pub mod generator;
pub mod grid;
pub mod kernel;

pub use coords::*;
pub use generator::*;
pub use grid::*;
pub use kernel::*;
