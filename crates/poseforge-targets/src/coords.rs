//! Keypoint batch normalization.
//!
//! Regroups the raw annotation batch into the (batch, channel, subject)
//! iteration order the rasterizer consumes, swapping each coordinate pair
//! from the annotation convention (x, y) to the grid convention (row, col).

use candle_core::{DType, Tensor};
use poseforge_core::{Error, HeatmapMode, Result};

/// Regroups a keypoint coordinate batch by heatmap channel.
///
/// Accepts a tensor of shape (batch, subject, keypoint, 2) or, for
/// single-subject datasets, (batch, keypoint, 2) — a singleton subject axis
/// is inserted. The returned nesting is `groups[batch][channel][subject]`,
/// where the channel axis is the keypoint type in [`HeatmapMode::Keypoint`]
/// mode and the subject in [`HeatmapMode::Individual`] mode.
///
/// Coordinates come back as (row, col) pairs in input-pixel space. Absent
/// annotations (any coordinate <= 0) are kept in place; the rasterization
/// loop skips them so that skips can be counted per call.
pub fn normalize_keypoints(
    coords: &Tensor,
    mode: HeatmapMode,
) -> Result<Vec<Vec<Vec<[f32; 2]>>>> {
    let (batch, subjects, types) = match coords.dims() {
        &[b, t, 2] => (b, 1, t),
        &[b, s, t, 2] => (b, s, t),
        dims => {
            return Err(Error::Shape {
                expected: "(batch, subject, keypoint, 2) or (batch, keypoint, 2)".to_string(),
                actual: format!("{dims:?}"),
            })
        }
    };

    // Annotations may arrive as integer pixel coordinates; widen once on the
    // host before regrouping.
    let flat = coords.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;

    let channels = match mode {
        HeatmapMode::Keypoint => types,
        HeatmapMode::Individual => subjects,
    };

    let mut groups = vec![vec![Vec::new(); channels]; batch];
    for b in 0..batch {
        for s in 0..subjects {
            for t in 0..types {
                let at = ((b * subjects + s) * types + t) * 2;
                // (x, y) -> (row, col)
                let keypoint = [flat[at + 1], flat[at]];
                match mode {
                    HeatmapMode::Keypoint => groups[b][t].push(keypoint),
                    HeatmapMode::Individual => groups[b][s].push(keypoint),
                }
            }
        }
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_keypoint_mode_groups_by_type() -> Result<()> {
        let device = Device::Cpu;
        // 1 batch, 2 subjects, 3 keypoint types, (x, y) pairs.
        let data: Vec<f32> = vec![
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, // subject 0
            7.0, 8.0, 9.0, 10.0, 11.0, 12.0, // subject 1
        ];
        let coords = Tensor::from_vec(data, (1, 2, 3, 2), &device)?;

        let groups = normalize_keypoints(&coords, HeatmapMode::Keypoint)?;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 3);
        assert_eq!(groups[0][0].len(), 2);

        // Channel 0 collects keypoint type 0 of both subjects, (x, y)
        // swapped to (row, col).
        assert_eq!(groups[0][0][0], [2.0, 1.0]);
        assert_eq!(groups[0][0][1], [8.0, 7.0]);
        assert_eq!(groups[0][2][1], [12.0, 11.0]);
        Ok(())
    }

    #[test]
    fn test_individual_mode_groups_by_subject() -> Result<()> {
        let device = Device::Cpu;
        let data: Vec<f32> = vec![
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, //
            7.0, 8.0, 9.0, 10.0, 11.0, 12.0,
        ];
        let coords = Tensor::from_vec(data, (1, 2, 3, 2), &device)?;

        let groups = normalize_keypoints(&coords, HeatmapMode::Individual)?;
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0][0].len(), 3);

        // Channel 1 is subject 1, all of its keypoint types in order.
        assert_eq!(groups[0][1][0], [8.0, 7.0]);
        assert_eq!(groups[0][1][2], [12.0, 11.0]);
        Ok(())
    }

    #[test]
    fn test_rank_three_inserts_subject_axis() -> Result<()> {
        let device = Device::Cpu;
        let data: Vec<f32> = vec![1.0, 2.0, 3.0, 4.0];
        let coords = Tensor::from_vec(data, (1, 2, 2), &device)?;

        let groups = normalize_keypoints(&coords, HeatmapMode::Keypoint)?;
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0][0], vec![[2.0, 1.0]]);
        assert_eq!(groups[0][1], vec![[4.0, 3.0]]);
        Ok(())
    }

    #[test]
    fn test_integer_annotations_accepted() -> Result<()> {
        let device = Device::Cpu;
        let coords = Tensor::from_vec(vec![3i64, 5], (1, 1, 2), &device)?;

        let groups = normalize_keypoints(&coords, HeatmapMode::Keypoint)?;
        assert_eq!(groups[0][0][0], [5.0, 3.0]);
        Ok(())
    }

    #[test]
    fn test_malformed_shape_rejected() {
        let device = Device::Cpu;
        let coords = Tensor::from_vec(vec![1.0f32, 2.0], (1, 2), &device).unwrap();

        let err = normalize_keypoints(&coords, HeatmapMode::Keypoint).unwrap_err();
        assert!(matches!(err, Error::Shape { .. }));

        // Wrong last axis.
        let coords = Tensor::from_vec(vec![1.0f32, 2.0, 3.0], (1, 1, 3), &device).unwrap();
        let err = normalize_keypoints(&coords, HeatmapMode::Keypoint).unwrap_err();
        assert!(matches!(err, Error::Shape { .. }));
    }
}
