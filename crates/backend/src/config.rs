use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tacmap_shared::visibility::{SamplingPolicy, VisibilityConfig};

pub const DEFAULT_ELEVATION_URL: &str = "https://api.open-elevation.com/api/v1/lookup";
pub const DEFAULT_WMS_BASE_URL: &str = "https://kaart.maaamet.ee/wms";

/// Where terrain heights come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ElevationSource {
    /// JSON `ElevationGrid` file loaded into memory at startup.
    Grid(PathBuf),
    /// Open-Elevation compatible lookup endpoint.
    Remote(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub elevation: ElevationSource,
    pub elevation_timeout: Duration,
    pub visibility: VisibilityConfig,
    pub wms_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(get: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = VisibilityConfig::default();

        let elevation = match get("DEM_GRID_PATH") {
            Some(path) if !path.is_empty() => ElevationSource::Grid(PathBuf::from(path)),
            _ => ElevationSource::Remote(
                get("ELEVATION_URL").unwrap_or_else(|| DEFAULT_ELEVATION_URL.to_string()),
            ),
        };

        let visibility = VisibilityConfig {
            ray_count: parse_var(&get, "RAY_COUNT", defaults.ray_count)?,
            ray_samples: parse_var(&get, "RAY_SAMPLES", defaults.ray_samples)?,
            sampling: SamplingPolicy {
                batch_size: parse_var(&get, "ELEVATION_BATCH_SIZE", defaults.sampling.batch_size)?,
                max_concurrency: parse_var(
                    &get,
                    "ELEVATION_CONCURRENCY",
                    defaults.sampling.max_concurrency,
                )?,
            },
            ..defaults
        };
        if visibility.ray_count == 0 || visibility.ray_samples == 0 {
            return Err("RAY_COUNT and RAY_SAMPLES must be at least 1".to_string());
        }
        if visibility.sampling.batch_size == 0 || visibility.sampling.max_concurrency == 0 {
            return Err("ELEVATION_BATCH_SIZE and ELEVATION_CONCURRENCY must be at least 1".to_string());
        }

        Ok(Config {
            port: parse_var(&get, "PORT", 3000)?,
            db_path: PathBuf::from(
                get("DB_PATH").unwrap_or_else(|| "data/tacmap.redb".to_string()),
            ),
            elevation,
            elevation_timeout: Duration::from_secs(parse_var(&get, "ELEVATION_TIMEOUT_SECS", 20)?),
            visibility,
            wms_base_url: get("WMS_BASE_URL")
                .unwrap_or_else(|| DEFAULT_WMS_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

fn parse_var<F, T>(get: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid {}={:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}
