//! Military grid references built on top of the zoned planar coordinates.
//!
//! Display format: `"<zoneBand> <squareId> <easting digits> <northing digits>"`,
//! e.g. `"35V LF 71234 90123"`. Parsing also accepts the compact form without
//! spaces. A decoded reference resolves to the centre of its precision cell.

use crate::error::CoordinateError;
use crate::models::{GeoPoint, MilitaryGridRef, PlanarCoord};
use crate::utm::{self, BAND_LETTERS};

pub const MIN_LATITUDE: f64 = -80.0;
pub const MAX_LATITUDE: f64 = 84.0;
pub const MAX_PRECISION: u8 = 5;

const SQUARE_SIZE: f64 = 100_000.0;
const ROW_CYCLE: f64 = 2_000_000.0;
/// How far past its band edge a decoded cell centre may fall, about one
/// 100 km row of latitude.
const BAND_TOLERANCE_DEG: f64 = 1.0;

/// Column letters for the three repeating column sets.
const COLUMN_SETS: [&[u8; 8]; 3] = [b"ABCDEFGH", b"JKLMNPQR", b"STUVWXYZ"];
/// Row letters, cycling every 2 000 km.
const ROW_LETTERS: &[u8; 20] = b"ABCDEFGHJKLMNPQRSTUV";

/// Lowest northing of each latitude band, indexed like `BAND_LETTERS`.
const BAND_MIN_NORTHING: [f64; 20] = [
    1_100_000.0, // C
    2_000_000.0, // D
    2_800_000.0, // E
    3_700_000.0, // F
    4_600_000.0, // G
    5_500_000.0, // H
    6_400_000.0, // J
    7_300_000.0, // K
    8_200_000.0, // L
    9_100_000.0, // M
    0.0,         // N
    800_000.0,   // P
    1_700_000.0, // Q
    2_600_000.0, // R
    3_500_000.0, // S
    4_400_000.0, // T
    5_300_000.0, // U
    6_200_000.0, // V
    7_000_000.0, // W
    7_900_000.0, // X
];

fn zone_set(zone: u8) -> usize {
    match zone % 6 {
        0 => 6,
        s => s as usize,
    }
}

fn column_letters(zone: u8) -> &'static [u8; 8] {
    COLUMN_SETS[(zone_set(zone) - 1) % 3]
}

fn row_offset(zone: u8) -> usize {
    if zone_set(zone) % 2 == 0 {
        5
    } else {
        0
    }
}

/// Encode a point as a structured military grid reference.
pub fn to_military_grid_ref(
    point: GeoPoint,
    precision: u8,
) -> Result<MilitaryGridRef, CoordinateError> {
    if precision > MAX_PRECISION {
        return Err(CoordinateError::OutOfRange(format!(
            "precision {} exceeds {}",
            precision, MAX_PRECISION
        )));
    }
    if !point.is_valid() {
        return Err(CoordinateError::OutOfRange(format!("point {}", point)));
    }
    if point.lat < MIN_LATITUDE || point.lat > MAX_LATITUDE {
        return Err(CoordinateError::OutsideBand(point.lat));
    }

    let planar = utm::to_planar(point);
    let column = (planar.easting / SQUARE_SIZE).floor() as usize;
    let columns = column_letters(planar.zone);
    if column == 0 || column > columns.len() {
        return Err(CoordinateError::OutOfRange(format!(
            "easting {:.0} outside grid columns",
            planar.easting
        )));
    }
    let row = ((planar.northing / SQUARE_SIZE).floor() as usize + row_offset(planar.zone))
        % ROW_LETTERS.len();

    let square_id: String = [columns[column - 1] as char, ROW_LETTERS[row] as char]
        .iter()
        .collect();

    let divisor = 10f64.powi((MAX_PRECISION - precision) as i32);
    let (easting, northing) = if precision == 0 {
        (0, 0)
    } else {
        (
            ((planar.easting % SQUARE_SIZE) / divisor).floor() as u32,
            ((planar.northing % SQUARE_SIZE) / divisor).floor() as u32,
        )
    };

    Ok(MilitaryGridRef {
        zone_band: format!("{}{}", planar.zone, planar.letter),
        square_id,
        easting,
        northing,
        precision,
    })
}

/// Encode a point in the military grid display format.
pub fn to_military_grid(point: GeoPoint, precision: u8) -> Result<String, CoordinateError> {
    to_military_grid_ref(point, precision).map(|r| format_military_grid(&r))
}

/// `"<zoneBand> <squareId> <easting> <northing>"`, digits zero-padded to the precision.
pub fn format_military_grid(grid_ref: &MilitaryGridRef) -> String {
    grid_ref.to_string()
}

/// Parse a reference string, with or without separating spaces.
pub fn parse_military_grid(input: &str) -> Result<MilitaryGridRef, CoordinateError> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if !compact.is_ascii() {
        return Err(CoordinateError::malformed(input, "non-ASCII characters"));
    }
    let bytes = compact.as_bytes();

    let zone_len = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if zone_len == 0 || zone_len > 2 {
        return Err(CoordinateError::malformed(input, "expected a 1-2 digit zone"));
    }
    let zone: u8 = compact[..zone_len]
        .parse()
        .map_err(|_| CoordinateError::malformed(input, "zone is not a number"))?;
    if !(1..=60).contains(&zone) {
        return Err(CoordinateError::malformed(input, "zone must be 1-60"));
    }

    let rest = &bytes[zone_len..];
    if rest.len() < 3 {
        return Err(CoordinateError::malformed(
            input,
            "expected band letter and 100 km square",
        ));
    }
    let band = rest[0];
    if !BAND_LETTERS.contains(&band) {
        return Err(CoordinateError::malformed(input, "invalid latitude band"));
    }
    let (col, row) = (rest[1], rest[2]);
    if !column_letters(zone).contains(&col) {
        return Err(CoordinateError::malformed(
            input,
            "square column letter not valid for zone",
        ));
    }
    if !ROW_LETTERS.contains(&row) {
        return Err(CoordinateError::malformed(input, "invalid square row letter"));
    }

    let digits = &compact[zone_len + 3..];
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoordinateError::malformed(input, "offsets must be digits"));
    }
    if digits.len() % 2 != 0 || digits.len() > 2 * MAX_PRECISION as usize {
        return Err(CoordinateError::malformed(
            input,
            "offsets need an even number of digits, at most 10",
        ));
    }
    let precision = (digits.len() / 2) as u8;
    let (easting, northing) = if precision == 0 {
        (0, 0)
    } else {
        let (e, n) = digits.split_at(precision as usize);
        (
            e.parse()
                .map_err(|_| CoordinateError::malformed(input, "bad easting digits"))?,
            n.parse()
                .map_err(|_| CoordinateError::malformed(input, "bad northing digits"))?,
        )
    };

    Ok(MilitaryGridRef {
        zone_band: format!("{}{}", zone, band as char),
        square_id: [col as char, row as char].iter().collect(),
        easting,
        northing,
        precision,
    })
}

impl MilitaryGridRef {
    fn zone_and_band(&self) -> Result<(u8, u8), CoordinateError> {
        let text = self.zone_band.as_str();
        let band = *text
            .as_bytes()
            .last()
            .ok_or_else(|| CoordinateError::malformed(text, "empty zone band"))?;
        if !BAND_LETTERS.contains(&band) {
            return Err(CoordinateError::malformed(text, "invalid latitude band"));
        }
        let zone: u8 = text[..text.len() - 1]
            .parse()
            .map_err(|_| CoordinateError::malformed(text, "zone is not a number"))?;
        if !(1..=60).contains(&zone) {
            return Err(CoordinateError::malformed(text, "zone must be 1-60"));
        }
        Ok((zone, band))
    }

    /// Planar coordinate of the centre of the referenced cell.
    pub fn to_planar(&self) -> Result<PlanarCoord, CoordinateError> {
        let (zone, band) = self.zone_and_band()?;
        let square = self.square_id.as_bytes();
        if square.len() != 2 {
            return Err(CoordinateError::malformed(
                &self.square_id,
                "square id must be two letters",
            ));
        }
        if self.precision > MAX_PRECISION {
            return Err(CoordinateError::OutOfRange(format!(
                "precision {}",
                self.precision
            )));
        }

        let column = column_letters(zone)
            .iter()
            .position(|&c| c == square[0])
            .ok_or_else(|| {
                CoordinateError::malformed(&self.square_id, "column letter not valid for zone")
            })?;
        let row_idx = ROW_LETTERS
            .iter()
            .position(|&c| c == square[1])
            .ok_or_else(|| CoordinateError::malformed(&self.square_id, "invalid row letter"))?;
        let row = (row_idx + ROW_LETTERS.len() - row_offset(zone)) % ROW_LETTERS.len();

        let band_idx = BAND_LETTERS
            .iter()
            .position(|&c| c == band)
            .unwrap_or_default();
        let min_northing = BAND_MIN_NORTHING[band_idx];

        let mut northing_base = row as f64 * SQUARE_SIZE;
        while northing_base < min_northing {
            northing_base += ROW_CYCLE;
        }
        let easting_base = (column + 1) as f64 * SQUARE_SIZE;

        let resolution = 10f64.powi((MAX_PRECISION - self.precision) as i32);
        let limit = 10u32.pow(self.precision as u32);
        if self.precision > 0 && (self.easting >= limit || self.northing >= limit) {
            return Err(CoordinateError::OutOfRange(format!(
                "offsets {}/{} exceed precision {}",
                self.easting, self.northing, self.precision
            )));
        }

        let planar = PlanarCoord {
            zone,
            letter: band as char,
            easting: easting_base + self.easting as f64 * resolution + resolution / 2.0,
            northing: northing_base + self.northing as f64 * resolution + resolution / 2.0,
        };
        self.check_band(&planar, band_idx)?;
        Ok(planar)
    }

    /// The row letter only fixes the northing modulo 2 000 km, so a square
    /// that does not exist in the stated band lands in some other band.
    fn check_band(&self, planar: &PlanarCoord, band_idx: usize) -> Result<(), CoordinateError> {
        let lat = utm::from_planar(planar)?.lat;
        let south = MIN_LATITUDE + 8.0 * band_idx as f64;
        let north = if band_idx == BAND_LETTERS.len() - 1 {
            MAX_LATITUDE
        } else {
            south + 8.0
        };
        if lat < south - BAND_TOLERANCE_DEG || lat > north + BAND_TOLERANCE_DEG {
            return Err(CoordinateError::OutOfRange(format!(
                "square {} does not lie in band {}",
                self.square_id, self.zone_band
            )));
        }
        Ok(())
    }

    pub fn to_point(&self) -> Result<GeoPoint, CoordinateError> {
        utm::from_planar(&self.to_planar()?)
    }

    /// Ground size of the referenced cell in meters.
    pub fn resolution(&self) -> f64 {
        10f64.powi((MAX_PRECISION.saturating_sub(self.precision)) as i32)
    }
}

/// Decode a reference string to the centre of its cell.
pub fn from_military_grid(input: &str) -> Result<GeoPoint, CoordinateError> {
    parse_military_grid(input)?.to_point()
}
