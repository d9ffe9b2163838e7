pub mod api;
pub mod dem;
pub mod ellipsoid;
pub mod error;
pub mod local_grid;
pub mod measure;
pub mod mgrs;
pub mod models;
pub mod readout;
#[cfg(feature = "uuid-support")]
pub mod records;
pub mod sampler;
pub mod utm;
pub mod visibility;

pub use error::{CoordinateError, ElevationUnavailable, VisibilityError};
pub use models::GeoPoint;
pub use sampler::ElevationSampler;
