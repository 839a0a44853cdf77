//! # PoseForge-Core
//!
//! Core types and utilities for the PoseForge heatmap-based
//! pose-estimation training stack.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
