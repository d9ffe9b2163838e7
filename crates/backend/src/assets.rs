use std::path::Path;

use tacmap_shared::dem::ElevationGrid;

/// Load a terrain grid from a JSON file and check its dimensions.
pub fn load_grid(path: &Path) -> Result<ElevationGrid, String> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let grid: ElevationGrid = serde_json::from_str(&data)
        .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
    grid.validate()
        .map_err(|e| format!("Invalid grid in {}: {}", path.display(), e))?;

    tracing::info!(
        width = grid.width,
        height = grid.height,
        north = grid.north,
        west = grid.west,
        "Loaded elevation grid"
    );

    Ok(grid)
}
