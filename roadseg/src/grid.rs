//! The dense binary label grid produced by prediction, and hole filling.

use image::{GrayImage, Luma};

use crate::{
    error::{RoadSegError, RoadSegResult},
    geometry::{scan_order, PixelCoord},
};

/// One binary label per pixel of an unpadded image.
///
/// Cells are stored row by row. A cell is 1 where the classifier found the
/// background class more likely than road.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelGrid {
    height: usize,
    width: usize,
    cells: Vec<u8>,
}

impl LabelGrid {
    /// A grid of zeros.
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            cells: vec![0; height * width],
        }
    }

    /// Builds a grid from labels listed in [`scan_order`].
    ///
    /// # Errors
    ///
    /// Returns [`RoadSegError::ShapeMismatch`] when the number of labels is
    /// not `height * width`.
    pub fn from_scan(
        height: usize,
        width: usize,
        labels: impl IntoIterator<Item = bool>,
    ) -> RoadSegResult<Self> {
        let mut grid = Self::new(height, width);
        let mut count = 0;
        let mut pixels = scan_order(height, width);
        for label in labels {
            count += 1;
            if let Some(pixel) = pixels.next() {
                grid.set(pixel, u8::from(label));
            }
        }

        if count != height * width {
            return Err(RoadSegError::ShapeMismatch {
                expected: format!("{} labels for a {height}x{width} grid", height * width),
                actual: format!("{count} labels"),
            });
        }
        Ok(grid)
    }

    /// `(height, width)`.
    pub const fn dims(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub const fn height(&self) -> usize {
        self.height
    }

    pub const fn width(&self) -> usize {
        self.width
    }

    pub fn get(&self, pixel: PixelCoord) -> u8 {
        self.cells[pixel.row * self.width + pixel.col]
    }

    pub fn set(&mut self, pixel: PixelCoord, value: u8) {
        self.cells[pixel.row * self.width + pixel.col] = value;
    }

    pub fn count_ones(&self) -> usize {
        self.cells.iter().filter(|&&cell| cell != 0).count()
    }

    /// Swaps zeros and ones.
    pub fn inverted(&self) -> Self {
        Self {
            height: self.height,
            width: self.width,
            cells: self.cells.iter().map(|&cell| u8::from(cell == 0)).collect(),
        }
    }

    /// Fills every region of zeros that is not 8-connected to the border.
    ///
    /// Zeros reachable from the image border through zeros (diagonal steps
    /// included) are kept; all other zeros become ones. Applying the fill to
    /// its own result changes nothing.
    pub fn fill_holes(&mut self) {
        let (height, width) = self.dims();
        if height == 0 || width == 0 {
            return;
        }

        let mut outside = vec![false; self.cells.len()];
        let mut stack = Vec::new();
        let border = (0..width)
            .flat_map(|col| [PixelCoord::new(0, col), PixelCoord::new(height - 1, col)])
            .chain(
                (0..height)
                    .flat_map(|row| [PixelCoord::new(row, 0), PixelCoord::new(row, width - 1)]),
            );
        for pixel in border {
            let index = pixel.row * width + pixel.col;
            if self.cells[index] == 0 && !outside[index] {
                outside[index] = true;
                stack.push(pixel);
            }
        }

        while let Some(pixel) = stack.pop() {
            for (row, col) in neighbours(pixel, height, width) {
                let index = row * width + col;
                if self.cells[index] == 0 && !outside[index] {
                    outside[index] = true;
                    stack.push(PixelCoord::new(row, col));
                }
            }
        }

        let mut filled = 0usize;
        for (cell, reached) in self.cells.iter_mut().zip(outside) {
            if *cell == 0 && !reached {
                *cell = 1;
                filled += 1;
            }
        }
        tracing::debug!(filled, "filled enclosed holes");
    }

    /// Black and white image: ones are white.
    pub fn to_luma_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let cell = self.get(PixelCoord::new(y as usize, x as usize));
            Luma([if cell == 0 { 0 } else { 255 }])
        })
    }
}

/// The up to eight in-bounds neighbours of `pixel`.
fn neighbours(
    pixel: PixelCoord,
    height: usize,
    width: usize,
) -> impl Iterator<Item = (usize, usize)> {
    let rows = pixel.row.saturating_sub(1)..=(pixel.row + 1).min(height - 1);
    rows.flat_map(move |row| {
        let cols = pixel.col.saturating_sub(1)..=(pixel.col + 1).min(width - 1);
        cols.map(move |col| (row, col))
    })
    .filter(move |&(row, col)| (row, col) != (pixel.row, pixel.col))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&str]) -> LabelGrid {
        let height = rows.len();
        let width = rows[0].len();
        let mut grid = LabelGrid::new(height, width);
        for (row, line) in rows.iter().enumerate() {
            for (col, c) in line.chars().enumerate() {
                grid.set(PixelCoord::new(row, col), u8::from(c == '#'));
            }
        }
        grid
    }

    #[test]
    fn from_scan_places_labels_column_by_column() {
        let labels = [true, false, false, true, true, true];

        let grid = LabelGrid::from_scan(2, 3, labels).unwrap();

        assert_eq!(grid, self::grid(&["#.#", ".##"]));
    }

    #[test]
    fn from_scan_rejects_wrong_label_count() {
        assert!(matches!(
            LabelGrid::from_scan(2, 2, [true; 3]),
            Err(RoadSegError::ShapeMismatch { .. })
        ));
        assert!(LabelGrid::from_scan(2, 2, [true; 5]).is_err());
    }

    #[test]
    fn enclosed_hole_is_filled() {
        let mut g = grid(&["#####", "#...#", "#...#", "#####"]);

        g.fill_holes();

        assert_eq!(g.count_ones(), 20);
    }

    #[test]
    fn region_touching_the_border_is_kept() {
        let original = grid(&["#####", "#...#", "#....", "#####"]);
        let mut g = original.clone();

        g.fill_holes();

        assert_eq!(g, original);
    }

    #[test]
    fn diagonal_leak_keeps_the_region_open() {
        // The inner zeros reach the border zero at the top-right corner diagonally.
        let original = grid(&["###.", "#..#", "#..#", "####"]);
        let mut g = original.clone();

        g.fill_holes();

        assert_eq!(g, original);
    }

    #[test]
    fn fill_is_idempotent() {
        let mut once = grid(&[
            "..#####..",
            ".#.....#.",
            ".#.###.#.",
            ".#.#.#.#.",
            ".#.###.#.",
            ".#######.",
        ]);
        once.fill_holes();
        let mut twice = once.clone();
        twice.fill_holes();

        assert_eq!(once, twice);
    }

    #[test]
    fn inverted_swaps_classes() {
        let g = grid(&["#.", ".."]);

        let inverted = g.inverted();

        assert_eq!(inverted, grid(&[".#", "##"]));
        assert_eq!(inverted.inverted(), g);
    }

    #[test]
    fn luma_image_is_black_and_white() {
        let image = grid(&["#.", ".."]).to_luma_image();

        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0).0, [255]);
        assert_eq!(image.get_pixel(1, 0).0, [0]);
    }

    #[test]
    fn empty_grid_is_left_alone() {
        let mut g = LabelGrid::new(0, 4);
        g.fill_holes();
        assert_eq!(g.dims(), (0, 4));
    }
}
