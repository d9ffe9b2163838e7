use std::sync::Arc;

use async_graphql::{Context, Enum, ErrorExtensions, InputObject, Json, Object, SimpleObject, ID};
use serde_json::Value;
use tacmap_shared::{
    local_grid, measure, mgrs,
    models::{GeoPoint, Measurement, PlanarCoord},
    readout,
    records::{self, Affiliation, FeatureType, DEFAULT_SIDC},
    utm, CoordinateError,
};

use crate::storage::Storage;

fn invalid_coordinate(err: CoordinateError) -> async_graphql::Error {
    async_graphql::Error::new(err.to_string()).extend_with(|_, e| e.set("code", "INVALID_COORDINATE"))
}

fn storage_error(err: String) -> async_graphql::Error {
    tracing::error!(error = %err, "Storage operation failed");
    async_graphql::Error::new(err).extend_with(|_, e| e.set("code", "STORAGE"))
}

fn not_found(what: &str, id: &str) -> async_graphql::Error {
    async_graphql::Error::new(format!("{} {} not found", what, id))
        .extend_with(|_, e| e.set("code", "NOT_FOUND"))
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum GqlAffiliation {
    Friendly,
    Hostile,
    Neutral,
    Unknown,
}

impl From<Affiliation> for GqlAffiliation {
    fn from(a: Affiliation) -> Self {
        match a {
            Affiliation::Friendly => GqlAffiliation::Friendly,
            Affiliation::Hostile => GqlAffiliation::Hostile,
            Affiliation::Neutral => GqlAffiliation::Neutral,
            Affiliation::Unknown => GqlAffiliation::Unknown,
        }
    }
}

impl From<GqlAffiliation> for Affiliation {
    fn from(a: GqlAffiliation) -> Self {
        match a {
            GqlAffiliation::Friendly => Affiliation::Friendly,
            GqlAffiliation::Hostile => Affiliation::Hostile,
            GqlAffiliation::Neutral => Affiliation::Neutral,
            GqlAffiliation::Unknown => Affiliation::Unknown,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum GqlFeatureType {
    Line,
    Polygon,
    Circle,
    Rectangle,
    Arrow,
    ElevationProfile,
    LineOfSight,
}

impl From<FeatureType> for GqlFeatureType {
    fn from(t: FeatureType) -> Self {
        match t {
            FeatureType::Line => GqlFeatureType::Line,
            FeatureType::Polygon => GqlFeatureType::Polygon,
            FeatureType::Circle => GqlFeatureType::Circle,
            FeatureType::Rectangle => GqlFeatureType::Rectangle,
            FeatureType::Arrow => GqlFeatureType::Arrow,
            FeatureType::ElevationProfile => GqlFeatureType::ElevationProfile,
            FeatureType::LineOfSight => GqlFeatureType::LineOfSight,
        }
    }
}

impl From<GqlFeatureType> for FeatureType {
    fn from(t: GqlFeatureType) -> Self {
        match t {
            GqlFeatureType::Line => FeatureType::Line,
            GqlFeatureType::Polygon => FeatureType::Polygon,
            GqlFeatureType::Circle => FeatureType::Circle,
            GqlFeatureType::Rectangle => FeatureType::Rectangle,
            GqlFeatureType::Arrow => FeatureType::Arrow,
            GqlFeatureType::ElevationProfile => FeatureType::ElevationProfile,
            GqlFeatureType::LineOfSight => FeatureType::LineOfSight,
        }
    }
}

// GraphQL output types

#[derive(SimpleObject, Clone, Copy)]
pub struct GqlGeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl From<GeoPoint> for GqlGeoPoint {
    fn from(p: GeoPoint) -> Self {
        GqlGeoPoint { lat: p.lat, lon: p.lon }
    }
}

#[derive(SimpleObject)]
pub struct GqlPlanar {
    pub zone: u32,
    pub letter: String,
    pub easting: f64,
    pub northing: f64,
    pub text: String,
}

impl From<PlanarCoord> for GqlPlanar {
    fn from(p: PlanarCoord) -> Self {
        GqlPlanar {
            zone: p.zone as u32,
            letter: p.letter.to_string(),
            easting: p.easting,
            northing: p.northing,
            text: p.to_string(),
        }
    }
}

#[derive(SimpleObject)]
pub struct GqlLocalGrid {
    pub x: f64,
    pub y: f64,
}

#[derive(SimpleObject)]
pub struct GqlTile {
    pub zoom: u32,
    pub column: i64,
    pub row: i64,
    /// Meters per pixel at this zoom.
    pub resolution: f64,
}

#[derive(SimpleObject)]
pub struct GqlCoordinates {
    pub decimal: String,
    pub military_grid: Option<String>,
    pub planar: GqlPlanar,
    pub local_grid: Option<GqlLocalGrid>,
}

#[derive(SimpleObject)]
pub struct GqlMeasurement {
    pub length: f64,
    pub perimeter: f64,
    pub area_m2: f64,
    pub hectares: f64,
    pub square_km: f64,
    pub length_text: String,
    pub area_text: String,
}

impl From<Measurement> for GqlMeasurement {
    fn from(m: Measurement) -> Self {
        GqlMeasurement {
            length: m.length,
            perimeter: m.perimeter,
            area_m2: m.area_m2,
            hectares: m.hectares,
            square_km: m.square_km,
            length_text: measure::format_distance(m.length),
            area_text: measure::format_area(m.area_m2),
        }
    }
}

#[derive(SimpleObject)]
pub struct GqlMarker {
    pub id: ID,
    pub name: String,
    pub sidc: String,
    pub affiliation: GqlAffiliation,
    pub affiliation_display: String,
    pub lat: f64,
    pub lon: f64,
    pub military_grid: Option<String>,
    pub properties: Json<Value>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<records::Marker> for GqlMarker {
    fn from(m: records::Marker) -> Self {
        GqlMarker {
            id: ID(m.id.to_string()),
            military_grid: mgrs::to_military_grid(m.point(), mgrs::MAX_PRECISION).ok(),
            name: m.name,
            sidc: m.sidc,
            affiliation: m.affiliation.into(),
            affiliation_display: m.affiliation.to_string(),
            lat: m.lat,
            lon: m.lon,
            properties: Json(m.properties),
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(SimpleObject)]
pub struct GqlFeature {
    pub id: ID,
    pub name: String,
    pub feature_type: GqlFeatureType,
    pub feature_type_display: String,
    pub geometry: Json<Value>,
    pub style: Json<Value>,
    pub properties: Json<Value>,
    pub measurement: GqlMeasurement,
    pub created_at: String,
    pub updated_at: String,
}

impl From<records::Feature> for GqlFeature {
    fn from(f: records::Feature) -> Self {
        GqlFeature {
            id: ID(f.id.to_string()),
            measurement: f.measurement().into(),
            feature_type_display: f.feature_type.to_string(),
            name: f.name,
            feature_type: f.feature_type.into(),
            geometry: Json(f.geometry),
            style: Json(f.style),
            properties: Json(f.properties),
            created_at: f.created_at,
            updated_at: f.updated_at,
        }
    }
}

// Input types

#[derive(InputObject, Clone, Copy)]
pub struct GeoPointInput {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPointInput {
    /// Reject out-of-range input rather than silently clamping it.
    fn checked(&self) -> async_graphql::Result<GeoPoint> {
        let point = GeoPoint {
            lat: self.lat,
            lon: self.lon,
        };
        if point.is_valid() {
            Ok(point)
        } else {
            Err(invalid_coordinate(CoordinateError::OutOfRange(format!(
                "point {}",
                point
            ))))
        }
    }
}

#[derive(InputObject)]
pub struct CreateMarkerInput {
    pub name: Option<String>,
    pub sidc: Option<String>,
    pub affiliation: Option<GqlAffiliation>,
    pub lat: f64,
    pub lon: f64,
    pub properties: Option<Json<Value>>,
}

#[derive(InputObject)]
pub struct UpdateMarkerInput {
    pub id: ID,
    pub name: Option<String>,
    pub sidc: Option<String>,
    pub affiliation: Option<GqlAffiliation>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub properties: Option<Json<Value>>,
}

#[derive(InputObject)]
pub struct CreateFeatureInput {
    pub name: Option<String>,
    pub feature_type: GqlFeatureType,
    pub geometry: Json<Value>,
    pub style: Option<Json<Value>>,
    pub properties: Option<Json<Value>>,
}

#[derive(InputObject)]
pub struct UpdateFeatureInput {
    pub id: ID,
    pub name: Option<String>,
    pub feature_type: Option<GqlFeatureType>,
    pub geometry: Option<Json<Value>>,
    pub style: Option<Json<Value>>,
    pub properties: Option<Json<Value>>,
}

// Query root

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Every notation for one point.
    async fn coordinates(&self, point: GeoPointInput) -> async_graphql::Result<GqlCoordinates> {
        let r = readout::coordinates(point.checked()?).map_err(invalid_coordinate)?;
        Ok(GqlCoordinates {
            decimal: r.decimal,
            military_grid: r.military_grid,
            planar: r.planar.into(),
            local_grid: r.local_grid.map(|g| GqlLocalGrid { x: g.x, y: g.y }),
        })
    }

    async fn to_military_grid(
        &self,
        point: GeoPointInput,
        precision: Option<u8>,
    ) -> async_graphql::Result<String> {
        mgrs::to_military_grid(point.checked()?, precision.unwrap_or(mgrs::MAX_PRECISION))
            .map_err(invalid_coordinate)
    }

    async fn from_military_grid(&self, reference: String) -> async_graphql::Result<GqlGeoPoint> {
        mgrs::from_military_grid(&reference)
            .map(GqlGeoPoint::from)
            .map_err(invalid_coordinate)
    }

    async fn to_planar(&self, point: GeoPointInput) -> async_graphql::Result<GqlPlanar> {
        Ok(utm::to_planar(point.checked()?).into())
    }

    async fn from_planar(&self, reference: String) -> async_graphql::Result<GqlGeoPoint> {
        let coord = utm::parse_planar(&reference).map_err(invalid_coordinate)?;
        utm::from_planar(&coord)
            .map(GqlGeoPoint::from)
            .map_err(invalid_coordinate)
    }

    async fn to_local_grid(&self, point: GeoPointInput) -> async_graphql::Result<GqlLocalGrid> {
        let (x, y) = local_grid::to_local_grid(point.checked()?).map_err(invalid_coordinate)?;
        Ok(GqlLocalGrid { x, y })
    }

    async fn from_local_grid(&self, x: f64, y: f64) -> async_graphql::Result<GqlGeoPoint> {
        local_grid::from_local_grid(x, y)
            .map(GqlGeoPoint::from)
            .map_err(invalid_coordinate)
    }

    /// Local grid tile holding a point, at `zoom` or else at the coarsest
    /// level at least as detailed as `metersPerPixel`.
    async fn local_grid_tile(
        &self,
        point: GeoPointInput,
        zoom: Option<u32>,
        meters_per_pixel: Option<f64>,
    ) -> async_graphql::Result<GqlTile> {
        let pyramid = local_grid::TilePyramid::lest97();
        let zoom = match (zoom, meters_per_pixel) {
            (Some(z), _) => z as usize,
            (None, Some(mpp)) if mpp > 0.0 => pyramid.zoom_for_resolution(mpp),
            _ => {
                return Err(invalid_coordinate(CoordinateError::OutOfRange(
                    "zoom or a positive metersPerPixel is required".to_string(),
                )))
            }
        };
        let (x, y) = local_grid::to_local_grid(point.checked()?).map_err(invalid_coordinate)?;
        let (resolution, (column, row)) = pyramid
            .resolution(zoom)
            .zip(pyramid.tile_at(x, y, zoom))
            .ok_or_else(|| {
                invalid_coordinate(CoordinateError::OutOfRange(format!(
                    "zoom {} outside 0-{}",
                    zoom,
                    local_grid::PYRAMID_LEVELS - 1
                )))
            })?;
        Ok(GqlTile {
            zoom: zoom as u32,
            column,
            row,
            resolution,
        })
    }

    /// Length, perimeter and area of a path or ring.
    async fn measure(
        &self,
        points: Vec<GeoPointInput>,
        closed: Option<bool>,
    ) -> async_graphql::Result<GqlMeasurement> {
        let points = points
            .iter()
            .map(GeoPointInput::checked)
            .collect::<async_graphql::Result<Vec<_>>>()?;
        Ok(measure::measure(&points, closed.unwrap_or(false)).into())
    }

    async fn markers(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<GqlMarker>> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let markers = storage.list_markers().map_err(storage_error)?;
        Ok(markers.into_iter().map(GqlMarker::from).collect())
    }

    async fn marker(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<GqlMarker>> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let marker = storage.get_marker(&id).map_err(storage_error)?;
        Ok(marker.map(GqlMarker::from))
    }

    async fn features(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<GqlFeature>> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let features = storage.list_features().map_err(storage_error)?;
        Ok(features.into_iter().map(GqlFeature::from).collect())
    }

    async fn feature(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<Option<GqlFeature>> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let feature = storage.get_feature(&id).map_err(storage_error)?;
        Ok(feature.map(GqlFeature::from))
    }
}

// Mutation root

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn create_marker(
        &self,
        ctx: &Context<'_>,
        input: CreateMarkerInput,
    ) -> async_graphql::Result<GqlMarker> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let point = GeoPointInput {
            lat: input.lat,
            lon: input.lon,
        }
        .checked()?;
        let now = now();

        let marker = records::Marker {
            id: uuid::Uuid::new_v4(),
            name: input.name.unwrap_or_else(|| "Unnamed Marker".to_string()),
            sidc: input.sidc.unwrap_or_else(|| DEFAULT_SIDC.to_string()),
            affiliation: input.affiliation.map(Affiliation::from).unwrap_or_default(),
            lat: point.lat,
            lon: point.lon,
            properties: input.properties.map(|j| j.0).unwrap_or_else(empty_object),
            created_at: now.clone(),
            updated_at: now,
        };

        storage.save_marker(&marker).map_err(storage_error)?;
        tracing::info!(id = %marker.id, name = %marker.name, "Marker created");

        Ok(GqlMarker::from(marker))
    }

    async fn update_marker(
        &self,
        ctx: &Context<'_>,
        input: UpdateMarkerInput,
    ) -> async_graphql::Result<GqlMarker> {
        let storage = ctx.data::<Arc<Storage>>()?;

        let mut marker = storage
            .get_marker(&input.id)
            .map_err(storage_error)?
            .ok_or_else(|| not_found("Marker", &input.id))?;

        if let Some(name) = input.name {
            marker.name = name;
        }
        if let Some(sidc) = input.sidc {
            marker.sidc = sidc;
        }
        if let Some(affiliation) = input.affiliation {
            marker.affiliation = affiliation.into();
        }
        if input.lat.is_some() || input.lon.is_some() {
            let point = GeoPointInput {
                lat: input.lat.unwrap_or(marker.lat),
                lon: input.lon.unwrap_or(marker.lon),
            }
            .checked()?;
            marker.lat = point.lat;
            marker.lon = point.lon;
        }
        if let Some(properties) = input.properties {
            marker.properties = properties.0;
        }

        marker.updated_at = now();

        storage.save_marker(&marker).map_err(storage_error)?;

        Ok(GqlMarker::from(marker))
    }

    async fn delete_marker(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let storage = ctx.data::<Arc<Storage>>()?;
        storage.delete_marker(&id).map_err(storage_error)
    }

    async fn create_feature(
        &self,
        ctx: &Context<'_>,
        input: CreateFeatureInput,
    ) -> async_graphql::Result<GqlFeature> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let now = now();

        let feature = records::Feature {
            id: uuid::Uuid::new_v4(),
            name: input.name.unwrap_or_else(|| "Unnamed Feature".to_string()),
            feature_type: input.feature_type.into(),
            geometry: input.geometry.0,
            style: input.style.map(|j| j.0).unwrap_or_else(empty_object),
            properties: input.properties.map(|j| j.0).unwrap_or_else(empty_object),
            created_at: now.clone(),
            updated_at: now,
        };

        storage.save_feature(&feature).map_err(storage_error)?;
        tracing::info!(id = %feature.id, kind = ?feature.feature_type, "Feature created");

        Ok(GqlFeature::from(feature))
    }

    async fn update_feature(
        &self,
        ctx: &Context<'_>,
        input: UpdateFeatureInput,
    ) -> async_graphql::Result<GqlFeature> {
        let storage = ctx.data::<Arc<Storage>>()?;

        let mut feature = storage
            .get_feature(&input.id)
            .map_err(storage_error)?
            .ok_or_else(|| not_found("Feature", &input.id))?;

        if let Some(name) = input.name {
            feature.name = name;
        }
        if let Some(feature_type) = input.feature_type {
            feature.feature_type = feature_type.into();
        }
        if let Some(geometry) = input.geometry {
            feature.geometry = geometry.0;
        }
        if let Some(style) = input.style {
            feature.style = style.0;
        }
        if let Some(properties) = input.properties {
            feature.properties = properties.0;
        }

        feature.updated_at = now();

        storage.save_feature(&feature).map_err(storage_error)?;

        Ok(GqlFeature::from(feature))
    }

    async fn delete_feature(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let storage = ctx.data::<Arc<Storage>>()?;
        storage.delete_feature(&id).map_err(storage_error)
    }
}

pub type Schema = async_graphql::Schema<QueryRoot, MutationRoot, async_graphql::EmptySubscription>;

pub fn build_schema(storage: Arc<Storage>) -> Schema {
    async_graphql::Schema::build(QueryRoot, MutationRoot, async_graphql::EmptySubscription)
        .data(storage)
        .finish()
}
