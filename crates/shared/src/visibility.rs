//! Terrain visibility: elevation profiles, point-to-point line of sight and
//! radial raytracing around an observer.
//!
//! All elevation lookups for one request go through [`sample_elevations`],
//! which batches points, keeps a bounded number of batches in flight and
//! checks the cancellation token between batches. Any sampler failure aborts
//! the whole request; nothing partial is returned.
//!
//! Missing elevations (`None` from the sampler) stay missing in profiles and
//! count as sea level (0 m) in the visibility math.

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{ElevationUnavailable, VisibilityError};
use crate::measure::{destination, points_along_path};
use crate::models::{
    ElevationProfile, GeoPoint, Obstruction, PathSample, RadialVisibilityMap, Ray, RaySample,
    SectorShade, VisibilityResult,
};
use crate::sampler::ElevationSampler;

pub const DEFAULT_PROFILE_SAMPLES: usize = 50;
pub const DEFAULT_LOS_SAMPLES: usize = 100;
pub const DEFAULT_RAY_COUNT: usize = 16;
pub const DEFAULT_RAY_SAMPLES: usize = 5;
pub const DEFAULT_MAX_SAMPLES: usize = 1000;

/// Terrain must rise this far above the sightline to count as blocking.
pub const LOS_EPSILON_M: f64 = 1e-3;

/// How elevation lookups are grouped and fanned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPolicy {
    /// Points per `lookup_batch` call.
    pub batch_size: usize,
    /// Batches allowed in flight at once.
    pub max_concurrency: usize,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        SamplingPolicy {
            batch_size: 100,
            max_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityConfig {
    pub profile_samples: usize,
    pub los_samples: usize,
    pub ray_count: usize,
    pub ray_samples: usize,
    /// Upper bound on caller-requested sample counts.
    pub max_samples: usize,
    pub los_epsilon_m: f64,
    pub sampling: SamplingPolicy,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        VisibilityConfig {
            profile_samples: DEFAULT_PROFILE_SAMPLES,
            los_samples: DEFAULT_LOS_SAMPLES,
            ray_count: DEFAULT_RAY_COUNT,
            ray_samples: DEFAULT_RAY_SAMPLES,
            max_samples: DEFAULT_MAX_SAMPLES,
            los_epsilon_m: LOS_EPSILON_M,
            sampling: SamplingPolicy::default(),
        }
    }
}

async fn lookup_checked<S: ElevationSampler>(
    sampler: &S,
    batch: Vec<GeoPoint>,
    cancel: &CancellationToken,
) -> Result<Vec<Option<f64>>, VisibilityError> {
    if cancel.is_cancelled() {
        return Err(VisibilityError::Cancelled);
    }
    let values = sampler.lookup_batch(&batch).await?;
    if values.len() != batch.len() {
        return Err(ElevationUnavailable(format!(
            "sampler returned {} values for {} points",
            values.len(),
            batch.len()
        ))
        .into());
    }
    Ok(values)
}

/// Look up elevations for `points`, aligned one-to-one with the input.
pub async fn sample_elevations<S: ElevationSampler>(
    sampler: &S,
    points: &[GeoPoint],
    policy: SamplingPolicy,
    cancel: &CancellationToken,
) -> Result<Vec<Option<f64>>, VisibilityError> {
    if cancel.is_cancelled() {
        return Err(VisibilityError::Cancelled);
    }
    let batches: Vec<_> = points
        .chunks(policy.batch_size.max(1))
        .map(|chunk| lookup_checked(sampler, chunk.to_vec(), cancel))
        .collect();
    let mut lookups = stream::iter(batches).buffered(policy.max_concurrency.max(1));

    let mut elevations = Vec::with_capacity(points.len());
    while let Some(batch) = lookups.next().await {
        match batch {
            Ok(values) => elevations.extend(values),
            Err(err) => {
                if let VisibilityError::ElevationUnavailable(ref cause) = err {
                    tracing::warn!(error = %cause, "elevation lookup failed, aborting request");
                }
                return Err(err);
            }
        }
        if cancel.is_cancelled() {
            return Err(VisibilityError::Cancelled);
        }
    }
    Ok(elevations)
}

fn check_point(point: &GeoPoint, what: &str) -> Result<(), VisibilityError> {
    if point.is_valid() {
        Ok(())
    } else {
        Err(VisibilityError::InvalidRequest(format!(
            "{} {} is not a valid coordinate",
            what, point
        )))
    }
}

fn check_height(value: f64, what: &str) -> Result<(), VisibilityError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(VisibilityError::InvalidRequest(format!(
            "{} must be a finite number",
            what
        )))
    }
}

/// Elevation angle (radians) from an eye at `eye` meters to terrain at
/// `elevation`, `distance` meters away.
pub fn horizon_angle(eye: f64, elevation: f64, distance: f64) -> f64 {
    ((elevation - eye) / distance).atan()
}

/// Visibility computations over an injected elevation sampler.
#[derive(Debug, Clone)]
pub struct VisibilityEngine<S> {
    sampler: S,
    config: VisibilityConfig,
}

impl<S: ElevationSampler> VisibilityEngine<S> {
    pub fn new(sampler: S, config: VisibilityConfig) -> Self {
        VisibilityEngine { sampler, config }
    }

    fn resolve_samples(&self, requested: Option<usize>, default: usize) -> Result<usize, VisibilityError> {
        let n = requested.unwrap_or(default);
        if n < 2 || n > self.config.max_samples {
            return Err(VisibilityError::InvalidRequest(format!(
                "samples must be between 2 and {}, got {}",
                self.config.max_samples, n
            )));
        }
        Ok(n)
    }

    async fn sample(
        &self,
        points: &[GeoPoint],
        cancel: &CancellationToken,
    ) -> Result<Vec<Option<f64>>, VisibilityError> {
        sample_elevations(&self.sampler, points, self.config.sampling, cancel).await
    }

    /// Elevation profile of `samples` points spaced equally along `path`.
    pub async fn elevation_profile(
        &self,
        path: &[GeoPoint],
        samples: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<ElevationProfile, VisibilityError> {
        if path.is_empty() {
            return Err(VisibilityError::InvalidRequest(
                "path needs at least one point".to_string(),
            ));
        }
        for point in path {
            check_point(point, "path point")?;
        }
        let n = self.resolve_samples(samples, self.config.profile_samples)?;

        let along = points_along_path(path, n);
        let points: Vec<GeoPoint> = along.iter().map(|&(_, p)| p).collect();
        let elevations = self.sample(&points, cancel).await?;

        let samples: Vec<PathSample> = along
            .iter()
            .zip(elevations)
            .map(|(&(distance, point), elevation)| PathSample {
                distance,
                elevation,
                point,
            })
            .collect();

        let known = || samples.iter().filter_map(|s| s.elevation);
        let min_elevation = known().reduce(f64::min);
        let max_elevation = known().reduce(f64::max);
        let total_distance = along.last().map(|&(d, _)| d).unwrap_or(0.0);

        tracing::debug!(samples = n, total_distance, "elevation profile computed");

        Ok(ElevationProfile {
            samples,
            total_distance,
            min_elevation,
            max_elevation,
        })
    }

    /// Straight sightline test from an observer eye to a target on the ground.
    pub async fn line_of_sight(
        &self,
        observer: GeoPoint,
        observer_height: f64,
        target: GeoPoint,
        samples: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<VisibilityResult, VisibilityError> {
        check_point(&observer, "observer")?;
        check_point(&target, "target")?;
        check_height(observer_height, "observer_height")?;
        let n = self.resolve_samples(samples, self.config.los_samples)?;

        let along = points_along_path(&[observer, target], n);
        let points: Vec<GeoPoint> = along.iter().map(|&(_, p)| p).collect();
        let elevations = self.sample(&points, cancel).await?;

        let observer_elevation = elevations[0].unwrap_or(0.0);
        let target_elevation = elevations[n - 1].unwrap_or(0.0);
        let eye = observer_elevation + observer_height;
        let total_distance = along[n - 1].0;

        let mut obstruction = None;
        for i in 1..n - 1 {
            let fraction = i as f64 / (n - 1) as f64;
            let sightline = eye + (target_elevation - eye) * fraction;
            let terrain = elevations[i].unwrap_or(0.0);
            if terrain > sightline + self.config.los_epsilon_m {
                obstruction = Some(Obstruction {
                    distance: along[i].0,
                    elevation: terrain,
                    point: along[i].1,
                });
                break;
            }
        }

        let profile = along
            .iter()
            .zip(elevations)
            .map(|(&(distance, point), elevation)| PathSample {
                distance,
                elevation,
                point,
            })
            .collect();

        tracing::debug!(
            samples = n,
            total_distance,
            visible = obstruction.is_none(),
            "line of sight computed"
        );

        Ok(VisibilityResult {
            visible: obstruction.is_none(),
            obstruction,
            profile,
            observer_elevation,
            target_elevation,
            total_distance,
        })
    }

    /// Raytrace `ray_count` rays out to `radius` meters around the observer.
    ///
    /// Along each ray a sample is visible when its horizon angle is at least
    /// the largest angle seen so far on that ray; ties are visible.
    pub async fn radial_visibility(
        &self,
        observer: GeoPoint,
        radius: f64,
        observer_height: f64,
        cancel: &CancellationToken,
    ) -> Result<RadialVisibilityMap, VisibilityError> {
        check_point(&observer, "observer")?;
        check_height(observer_height, "observer_height")?;
        if !radius.is_finite() || radius <= 0.0 {
            return Err(VisibilityError::InvalidRequest(format!(
                "radius must be positive, got {}",
                radius
            )));
        }
        let ray_count = self.config.ray_count.max(1);
        let ray_samples = self.config.ray_samples.max(1);

        let bearings: Vec<f64> = (0..ray_count)
            .map(|i| i as f64 * 360.0 / ray_count as f64)
            .collect();
        let distances: Vec<f64> = (1..=ray_samples)
            .map(|j| radius * j as f64 / ray_samples as f64)
            .collect();

        let mut points = Vec::with_capacity(1 + ray_count * ray_samples);
        points.push(observer);
        for &bearing in &bearings {
            for &d in &distances {
                points.push(destination(observer, bearing, d));
            }
        }

        let elevations = self.sample(&points, cancel).await?;
        let observer_elevation = elevations[0].unwrap_or(0.0);
        let eye = observer_elevation + observer_height;

        let rays = bearings
            .iter()
            .enumerate()
            .map(|(i, &bearing)| {
                let offset = 1 + i * ray_samples;
                let mut max_angle = f64::NEG_INFINITY;
                let mut first_obstruction = None;
                let samples = distances
                    .iter()
                    .enumerate()
                    .map(|(j, &distance)| {
                        let elevation = elevations[offset + j];
                        let angle = horizon_angle(eye, elevation.unwrap_or(0.0), distance);
                        let visible = angle >= max_angle;
                        if visible {
                            max_angle = angle;
                        } else if first_obstruction.is_none() {
                            first_obstruction = Some(distance);
                        }
                        RaySample {
                            distance,
                            point: points[offset + j],
                            elevation,
                            visible,
                        }
                    })
                    .collect();
                Ray {
                    bearing,
                    samples,
                    first_obstruction,
                }
            })
            .collect();

        tracing::debug!(
            rays = ray_count,
            samples_per_ray = ray_samples,
            radius,
            "radial visibility computed"
        );

        Ok(RadialVisibilityMap {
            observer,
            observer_elevation,
            radius,
            rays,
        })
    }
}

/// Approximate shading for the wedges between adjacent rays.
///
/// The two rays' first-obstruction distances are averaged (an unobstructed
/// ray counts as the full radius) and the wedge is shaded visible when the
/// average reaches half the radius.
pub fn sector_shading(map: &RadialVisibilityMap) -> Vec<SectorShade> {
    let count = map.rays.len();
    (0..count)
        .map(|i| {
            let a = &map.rays[i];
            let b = &map.rays[(i + 1) % count];
            let da = a.first_obstruction.unwrap_or(map.radius);
            let db = b.first_obstruction.unwrap_or(map.radius);
            let mean = (da + db) / 2.0;
            SectorShade {
                start_bearing: a.bearing,
                end_bearing: if i + 1 == count { 360.0 } else { b.bearing },
                mean_obstruction_distance: mean,
                visible: mean >= map.radius / 2.0,
            }
        })
        .collect()
}
