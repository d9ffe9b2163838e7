//! In-memory elevation raster on a regular lat/lon grid.

use serde::{Deserialize, Serialize};

use crate::error::ElevationUnavailable;
use crate::models::GeoPoint;
use crate::sampler::ElevationSampler;

/// Regular grid of elevation posts.
///
/// Posts are stored row-major, north to south then west to east. Post
/// (0, 0) sits on the north-west corner; the grid covers
/// `(height - 1) * cell_size` degrees of latitude southward from `north`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationGrid {
    /// Latitude of the first row (degrees).
    pub north: f64,
    /// Longitude of the first column (degrees).
    pub west: f64,
    /// Post spacing in degrees, same on both axes.
    pub cell_size: f64,
    pub width: usize,
    pub height: usize,
    pub elevations: Vec<f64>,
    /// Posts holding this value are treated as missing.
    #[serde(default)]
    pub no_data: Option<f64>,
}

impl ElevationGrid {
    /// A grid of `width` x `height` posts, all at the same elevation. A grid
    /// with no posts covers nothing.
    pub fn flat(
        north: f64,
        west: f64,
        cell_size: f64,
        width: usize,
        height: usize,
        elevation: f64,
    ) -> Self {
        ElevationGrid {
            north,
            west,
            cell_size,
            width,
            height,
            elevations: vec![elevation; width * height],
            no_data: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.width < 2 || self.height < 2 {
            return Err(format!(
                "grid needs at least 2x2 posts, got {}x{}",
                self.width, self.height
            ));
        }
        if self.cell_size.is_nan() || self.cell_size <= 0.0 {
            return Err(format!("cell size must be positive, got {}", self.cell_size));
        }
        if self.elevations.len() != self.width * self.height {
            return Err(format!(
                "expected {} elevations, got {}",
                self.width * self.height,
                self.elevations.len()
            ));
        }
        Ok(())
    }

    pub fn south(&self) -> f64 {
        self.north - self.height.saturating_sub(1) as f64 * self.cell_size
    }

    pub fn east(&self) -> f64 {
        self.west + self.width.saturating_sub(1) as f64 * self.cell_size
    }

    /// Set one post; rows count from the north edge.
    pub fn set(&mut self, row: usize, col: usize, elevation: f64) {
        if row < self.height && col < self.width {
            self.elevations[row * self.width + col] = elevation;
        }
    }

    fn post(&self, row: usize, col: usize) -> Option<f64> {
        let value = *self.elevations.get(row * self.width + col)?;
        match self.no_data {
            Some(nd) if value == nd => None,
            _ if value.is_nan() => None,
            _ => Some(value),
        }
    }

    /// Fractional (row, col) of a point, or `None` outside the grid.
    fn locate(&self, point: GeoPoint) -> Option<(f64, f64)> {
        let row = (self.north - point.lat) / self.cell_size;
        let col = (point.lon - self.west) / self.cell_size;
        let max_row = self.height.checked_sub(1)? as f64;
        let max_col = self.width.checked_sub(1)? as f64;
        if row < 0.0 || col < 0.0 || row > max_row || col > max_col {
            return None;
        }
        Some((row, col))
    }

    /// Bilinear elevation at a point. Missing posts make the result missing.
    pub fn elevation_at(&self, point: GeoPoint) -> Option<f64> {
        let (row, col) = self.locate(point)?;
        let r0 = (row.floor() as usize).min(self.height - 1);
        let c0 = (col.floor() as usize).min(self.width - 1);
        let r1 = (r0 + 1).min(self.height - 1);
        let c1 = (c0 + 1).min(self.width - 1);
        let fr = row - r0 as f64;
        let fc = col - c0 as f64;

        let e00 = self.post(r0, c0)?;
        let e01 = self.post(r0, c1)?;
        let e10 = self.post(r1, c0)?;
        let e11 = self.post(r1, c1)?;

        let top = e00 + (e01 - e00) * fc;
        let bottom = e10 + (e11 - e10) * fc;
        Some(top + (bottom - top) * fr)
    }
}

impl ElevationSampler for ElevationGrid {
    async fn lookup_batch(
        &self,
        points: &[GeoPoint],
    ) -> Result<Vec<Option<f64>>, ElevationUnavailable> {
        Ok(points.iter().map(|&p| self.elevation_at(p)).collect())
    }
}
