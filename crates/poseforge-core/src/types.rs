//! Fundamental types for heatmap target generation.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Channel semantics for generated heatmaps.
///
/// `Keypoint` produces one heatmap per keypoint type, merging all subjects
/// that share a type (pose-estimation heads). `Individual` produces one
/// heatmap per subject (identity heads).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HeatmapMode {
    #[default]
    Keypoint,
    Individual,
}

impl FromStr for HeatmapMode {
    type Err = Error;

    /// Parses the mode from a configuration string, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_uppercase().as_str() {
            "KEYPOINT" => Ok(Self::Keypoint),
            "INDIVIDUAL" => Ok(Self::Individual),
            other => Err(Error::Config(format!("unknown heatmap mode: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse_case_insensitive() {
        assert_eq!("keypoint".parse::<HeatmapMode>().unwrap(), HeatmapMode::Keypoint);
        assert_eq!("KEYPOINT".parse::<HeatmapMode>().unwrap(), HeatmapMode::Keypoint);
        assert_eq!(
            "Individual".parse::<HeatmapMode>().unwrap(),
            HeatmapMode::Individual
        );
        assert!("heatmap".parse::<HeatmapMode>().is_err());
    }

    #[test]
    fn test_mode_serde_round_trip() {
        let json = serde_json::to_string(&HeatmapMode::Individual).unwrap();
        assert_eq!(json, "\"INDIVIDUAL\"");

        let mode: HeatmapMode = serde_json::from_str("\"KEYPOINT\"").unwrap();
        assert_eq!(mode, HeatmapMode::Keypoint);
    }

    #[test]
    fn test_mode_default_is_keypoint() {
        assert_eq!(HeatmapMode::default(), HeatmapMode::Keypoint);
    }
}
