use std::future::Future;

use crate::error::ElevationUnavailable;
use crate::models::GeoPoint;

/// Source of terrain elevation, queried by coordinate.
///
/// `Ok(None)` means the source has no data for that point (outside coverage,
/// open water on some services). `Err` means the lookup itself failed and
/// aborts whatever computation issued it.
pub trait ElevationSampler: Send + Sync {
    /// Elevations aligned one-to-one with `points`.
    fn lookup_batch(
        &self,
        points: &[GeoPoint],
    ) -> impl Future<Output = Result<Vec<Option<f64>>, ElevationUnavailable>> + Send;

    fn lookup(
        &self,
        point: GeoPoint,
    ) -> impl Future<Output = Result<Option<f64>, ElevationUnavailable>> + Send {
        async move {
            let values = self.lookup_batch(&[point]).await?;
            Ok(values.into_iter().next().flatten())
        }
    }
}
