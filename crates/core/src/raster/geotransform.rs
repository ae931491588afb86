//! Affine georeference shared by rasters and morphing grids

use serde::{Deserialize, Serialize};

/// Affine transformation coefficients for georeferencing grids.
///
/// Converts between pixel coordinates (px, py) and geographic coordinates (x, y):
/// ```text
/// x = origin_x + px * pixel_width + py * row_rotation
/// y = origin_y + px * col_rotation + py * pixel_height
/// ```
///
/// Pixel coordinates are continuous: `(0, 0)` is the top-left corner of the
/// first cell and `(cols, rows)` the bottom-right corner of the last one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner (`topleftx`)
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner (`toplefty`)
    pub origin_y: f64,
    /// Cell size in X direction (`weres`)
    pub pixel_width: f64,
    /// Cell size in Y direction, usually negative (`nsres`)
    pub pixel_height: f64,
    /// Contribution of the row index to X (`rot1`)
    pub row_rotation: f64,
    /// Contribution of the column index to Y (`rot2`)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a new GeoTransform with no rotation (north-up image)
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Pixel space is geographic space: unit cells, no offset, no flip
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// Create from the conventional six-term order
    /// `[topleftx, weres, rot1, toplefty, rot2, nsres]`
    pub fn from_coefficients(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Coefficients in `[topleftx, weres, rot1, toplefty, rot2, nsres]` order
    pub fn coefficients(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Determinant of the linear part; its magnitude is the map area of one cell
    pub fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation
    }

    /// Whether the transform can be inverted
    pub fn is_invertible(&self) -> bool {
        let det = self.determinant();
        det != 0.0 && det.is_finite()
    }

    /// Convert continuous pixel coordinates to geographic coordinates
    #[inline]
    pub fn pixel_to_geo(&self, px: f64, py: f64) -> (f64, f64) {
        let x = self.origin_x + px * self.pixel_width + py * self.row_rotation;
        let y = self.origin_y + px * self.col_rotation + py * self.pixel_height;
        (x, y)
    }

    /// Convert geographic coordinates to continuous pixel coordinates.
    ///
    /// Returns `(NaN, NaN)` for a non-invertible transform, which every
    /// bounds check downstream treats as "outside".
    #[inline]
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return (f64::NAN, f64::NAN);
        }

        let dx = x - self.origin_x;
        let dy = y - self.origin_y;

        let px = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let py = (self.pixel_width * dy - self.col_rotation * dx) / det;

        (px, py)
    }

    /// Map area covered by one cell
    pub fn cell_area(&self) -> f64 {
        self.determinant().abs()
    }

    /// Check if this is a north-up image (no rotation)
    pub fn is_north_up(&self) -> bool {
        self.row_rotation == 0.0 && self.col_rotation == 0.0 && self.pixel_height < 0.0
    }

    /// Bounding box (min_x, min_y, max_x, max_y) of a grid of the given size
    pub fn bounds(&self, cols: usize, rows: usize) -> (f64, f64, f64, f64) {
        let corners = [
            self.pixel_to_geo(0.0, 0.0),
            self.pixel_to_geo(cols as f64, 0.0),
            self.pixel_to_geo(0.0, rows as f64),
            self.pixel_to_geo(cols as f64, rows as f64),
        ];

        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}
