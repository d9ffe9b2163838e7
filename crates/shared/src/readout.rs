use serde::{Deserialize, Serialize};

use crate::error::CoordinateError;
use crate::local_grid::to_local_grid;
use crate::mgrs::{to_military_grid, MAX_PRECISION};
use crate::models::{GeoPoint, PlanarCoord};
use crate::utm::to_planar;

/// Easting/northing on the fixed local grid, meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalGridCoord {
    pub x: f64,
    pub y: f64,
}

/// Every supported notation for one point, as shown in the cursor readout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateReadout {
    pub point: GeoPoint,
    pub decimal: String,
    /// `None` outside the military grid latitude band.
    pub military_grid: Option<String>,
    pub planar: PlanarCoord,
    pub planar_text: String,
    pub local_grid: Option<LocalGridCoord>,
}

pub fn coordinates(point: GeoPoint) -> Result<CoordinateReadout, CoordinateError> {
    if !point.is_valid() {
        return Err(CoordinateError::OutOfRange(format!("point {}", point)));
    }
    let military_grid = match to_military_grid(point, MAX_PRECISION) {
        Ok(text) => Some(text),
        Err(CoordinateError::OutsideBand(_)) => None,
        Err(e) => return Err(e),
    };
    let planar = to_planar(point);
    let local_grid = to_local_grid(point)
        .ok()
        .map(|(x, y)| LocalGridCoord { x, y });

    Ok(CoordinateReadout {
        point,
        decimal: point.to_string(),
        military_grid,
        planar,
        planar_text: planar.to_string(),
        local_grid,
    })
}
