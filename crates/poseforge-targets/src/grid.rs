//! Feature-grid geometry: pixel-space centers of feature-map cells.

/// Dense map from feature-map cells to their centers in input-pixel space.
///
/// Cell (i, j) of an (H, W) feature map covering an
/// (input_height, input_width) image is centered at
/// `(i * stride_y + stride_y / 2, j * stride_x + stride_x / 2)`, with
/// `stride_y = input_height / H` and `stride_x = input_width / W`.
/// Strides are rational; they need not be whole pixels.
#[derive(Debug, Clone)]
pub struct Grid {
    height: usize,
    width: usize,
    /// (row, col) center pairs, row-major, interleaved.
    centers: Vec<f32>,
}

impl Grid {
    /// Builds the cell-center map for a `height` x `width` feature map over
    /// an `input_height` x `input_width` image. Rebuilt on every generator
    /// invocation since image sizes may vary across batches.
    pub fn new(height: usize, width: usize, input_height: f32, input_width: f32) -> Self {
        let stride_y = input_height / height as f32;
        let stride_x = input_width / width as f32;

        let mut centers = Vec::with_capacity(height * width * 2);
        for i in 0..height {
            for j in 0..width {
                centers.push(i as f32 * stride_y + stride_y / 2.0);
                centers.push(j as f32 * stride_x + stride_x / 2.0);
            }
        }

        Self {
            height,
            width,
            centers,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Pixel-space row coordinate of cell (i, j)'s center.
    #[inline]
    pub fn row(&self, i: usize, j: usize) -> f32 {
        self.centers[2 * (i * self.width + j)]
    }

    /// Pixel-space column coordinate of cell (i, j)'s center.
    #[inline]
    pub fn col(&self, i: usize, j: usize) -> f32 {
        self.centers[2 * (i * self.width + j) + 1]
    }

    /// Squared Euclidean distance from cell (i, j)'s center to a (row, col)
    /// point in pixel space.
    #[inline]
    pub fn dist_sq(&self, i: usize, j: usize, point: [f32; 2]) -> f32 {
        let dr = self.row(i, j) - point[0];
        let dc = self.col(i, j) - point[1];
        dr * dr + dc * dc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_stride_centers() {
        // 4x4 feature map over an 8x8 image: stride 2, centers at odd pixels.
        let grid = Grid::new(4, 4, 8.0, 8.0);

        assert_eq!(grid.row(0, 0), 1.0);
        assert_eq!(grid.col(0, 0), 1.0);
        assert_eq!(grid.row(1, 1), 3.0);
        assert_eq!(grid.col(1, 1), 3.0);
        assert_eq!(grid.row(3, 0), 7.0);
        assert_eq!(grid.col(0, 3), 7.0);
    }

    #[test]
    fn test_rational_strides() {
        // 3x2 feature map over a 9x5 image: stride_y = 3, stride_x = 2.5.
        let grid = Grid::new(3, 2, 9.0, 5.0);

        assert!((grid.row(0, 0) - 1.5).abs() < 1e-6);
        assert!((grid.row(2, 0) - 7.5).abs() < 1e-6);
        assert!((grid.col(0, 0) - 1.25).abs() < 1e-6);
        assert!((grid.col(0, 1) - 3.75).abs() < 1e-6);
    }

    #[test]
    fn test_dist_sq() {
        let grid = Grid::new(4, 4, 8.0, 8.0);

        // Cell (1, 1) is centered exactly on (3, 3).
        assert_eq!(grid.dist_sq(1, 1, [3.0, 3.0]), 0.0);
        // One cell to the right: 2 pixels along the column axis.
        assert_eq!(grid.dist_sq(1, 2, [3.0, 3.0]), 4.0);
        // Diagonal neighbor.
        assert_eq!(grid.dist_sq(2, 2, [3.0, 3.0]), 8.0);
    }
}
