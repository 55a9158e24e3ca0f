//! Geo validation and geohash (Crockford base32 without `i`, `l`, `o`),
//! spec §4.1 / §3 `GEO_POINT`/`GEO_POLYGON`/`GEO_LINESTRING`.

use crate::error::{Error, ValidationKind};
use serde::{Deserialize, Serialize};

/// Crockford base32 alphabet used by geohash, 32 symbols, excludes
/// `i`, `l`, `o` (and `u`, per the standard geohash alphabet).
const GEOHASH_ALPHABET: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// A validated lat/lng point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Result<Self, Error> {
        validate_lat_lng(lat, lng)?;
        Ok(GeoPoint { lat, lng })
    }
}

/// Validate latitude/longitude bounds and finiteness.
/// `lat` must be in `[-90, 90]`, `lng` in `[-180, 180]`, both finite.
pub fn validate_lat_lng(lat: f64, lng: f64) -> Result<(), Error> {
    if !lat.is_finite() || !lng.is_finite() {
        return Err(Error::validation(
            ValidationKind::InvalidGeo,
            &format!("lat={lat} lng={lng} (non-finite)"),
        ));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(Error::validation(
            ValidationKind::InvalidGeo,
            &format!("lat={lat} out of [-90, 90]"),
        ));
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(Error::validation(
            ValidationKind::InvalidGeo,
            &format!("lng={lng} out of [-180, 180]"),
        ));
    }
    Ok(())
}

/// A closed ring: first and last point implicitly coincide for validation
/// purposes (we require >= `min_points` distinct vertices, not literal
/// closure, matching how most ingestion pipelines hand in open rings).
fn validate_ring(points: &[GeoPoint], min_points: usize, what: &str) -> Result<(), Error> {
    if points.len() < min_points {
        return Err(Error::validation(
            ValidationKind::InvalidGeo,
            &format!("{what} needs >= {min_points} points, got {}", points.len()),
        ));
    }
    Ok(())
}

/// `GEO_POLYGON`: exterior ring of >= 4 points plus optional hole rings,
/// each hole also >= 4 points.
pub fn validate_polygon(exterior: &[GeoPoint], holes: &[Vec<GeoPoint>]) -> Result<(), Error> {
    validate_ring(exterior, 4, "polygon exterior ring")?;
    for hole in holes {
        validate_ring(hole, 4, "polygon hole ring")?;
    }
    Ok(())
}

/// `GEO_LINESTRING`: >= 2 points.
pub fn validate_linestring(points: &[GeoPoint]) -> Result<(), Error> {
    validate_ring(points, 2, "linestring")
}

/// Encode a geohash of `precision` characters for `(lat, lng)`.
pub fn encode_geohash(lat: f64, lng: f64, precision: usize) -> Result<String, Error> {
    validate_lat_lng(lat, lng)?;
    let mut lat_range = (-90.0f64, 90.0f64);
    let mut lng_range = (-180.0f64, 180.0f64);
    let mut is_even = true;
    let mut bit = 0u8;
    let mut ch = 0usize;
    let mut out = String::with_capacity(precision);

    while out.len() < precision {
        if is_even {
            let mid = (lng_range.0 + lng_range.1) / 2.0;
            if lng >= mid {
                ch |= 1 << (4 - bit);
                lng_range.0 = mid;
            } else {
                lng_range.1 = mid;
            }
        } else {
            let mid = (lat_range.0 + lat_range.1) / 2.0;
            if lat >= mid {
                ch |= 1 << (4 - bit);
                lat_range.0 = mid;
            } else {
                lat_range.1 = mid;
            }
        }
        is_even = !is_even;
        if bit < 4 {
            bit += 1;
        } else {
            out.push(GEOHASH_ALPHABET[ch] as char);
            bit = 0;
            ch = 0;
        }
    }
    Ok(out)
}

/// Decode a geohash to the center of its cell.
pub fn decode_geohash(hash: &str) -> Result<GeoPoint, Error> {
    let mut lat_range = (-90.0f64, 90.0f64);
    let mut lng_range = (-180.0f64, 180.0f64);
    let mut is_even = true;

    for c in hash.chars() {
        let idx = GEOHASH_ALPHABET
            .iter()
            .position(|&a| a as char == c)
            .ok_or_else(|| {
                Error::validation(ValidationKind::InvalidGeo, &format!("bad geohash char '{c}'"))
            })?;
        for shift in (0..5).rev() {
            let bit = (idx >> shift) & 1;
            if is_even {
                let mid = (lng_range.0 + lng_range.1) / 2.0;
                if bit == 1 {
                    lng_range.0 = mid;
                } else {
                    lng_range.1 = mid;
                }
            } else {
                let mid = (lat_range.0 + lat_range.1) / 2.0;
                if bit == 1 {
                    lat_range.0 = mid;
                } else {
                    lat_range.1 = mid;
                }
            }
            is_even = !is_even;
        }
    }

    Ok(GeoPoint {
        lat: (lat_range.0 + lat_range.1) / 2.0,
        lng: (lng_range.0 + lng_range.1) / 2.0,
    })
}

/// The 8 neighboring geohash cells (N, NE, E, SE, S, SW, W, NW), used for
/// radius-expansion queries. Computed by perturbing the decoded center by
/// one cell width/height in each direction and re-encoding at the same
/// precision.
pub fn neighbors(hash: &str) -> Result<[String; 8], Error> {
    let precision = hash.chars().count();
    let center = decode_geohash(hash)?;
    // Approximate cell size by decoding the bounding box via two adjacent
    // encodes; simpler and robust: derive half-width/half-height from the
    // encode loop bit budget.
    let (lat_err, lng_err) = cell_error(precision);

    let dirs: [(f64, f64); 8] = [
        (lat_err * 2.0, 0.0),           // N
        (lat_err * 2.0, lng_err * 2.0), // NE
        (0.0, lng_err * 2.0),           // E
        (-lat_err * 2.0, lng_err * 2.0),// SE
        (-lat_err * 2.0, 0.0),          // S
        (-lat_err * 2.0, -lng_err * 2.0),// SW
        (0.0, -lng_err * 2.0),          // W
        (lat_err * 2.0, -lng_err * 2.0),// NW
    ];

    let mut out: [String; 8] = Default::default();
    for (i, (dlat, dlng)) in dirs.iter().enumerate() {
        let lat = (center.lat + dlat).clamp(-90.0, 90.0);
        let lng = wrap_lng(center.lng + dlng);
        out[i] = encode_geohash(lat, lng, precision)?;
    }
    Ok(out)
}

fn wrap_lng(lng: f64) -> f64 {
    let mut l = lng;
    while l > 180.0 {
        l -= 360.0;
    }
    while l < -180.0 {
        l += 360.0;
    }
    l
}

/// Half-width/half-height of a geohash cell at the given precision.
fn cell_error(precision: usize) -> (f64, f64) {
    let bits = precision * 5;
    let lat_bits = bits / 2;
    let lng_bits = bits - lat_bits;
    let lat_err = 180.0 / 2f64.powi(lat_bits as i32 + 1);
    let lng_err = 360.0 / 2f64.powi(lng_bits as i32 + 1);
    (lat_err, lng_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_edge_valid() {
        assert!(validate_lat_lng(90.0, -180.0).is_ok());
        assert!(validate_lat_lng(-90.0, 180.0).is_ok());
    }

    #[test]
    fn bounds_just_over_invalid() {
        assert!(validate_lat_lng(90.0001, 0.0).is_err());
        assert!(validate_lat_lng(0.0, 180.0001).is_err());
    }

    #[test]
    fn non_finite_rejected() {
        assert!(validate_lat_lng(f64::NAN, 0.0).is_err());
        assert!(validate_lat_lng(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn geohash_roundtrip_close() {
        let hash = encode_geohash(37.8324, 112.5584, 9).unwrap();
        let back = decode_geohash(&hash).unwrap();
        assert!((back.lat - 37.8324).abs() < 1e-3);
        assert!((back.lng - 112.5584).abs() < 1e-3);
    }

    #[test]
    fn geohash_alphabet_excludes_ambiguous_letters() {
        for bad in [b'a', b'i', b'l', b'o'] {
            if bad == b'a' {
                continue; // 'a' is not excluded; only i,l,o per spec
            }
            assert!(!GEOHASH_ALPHABET.contains(&bad));
        }
    }

    #[test]
    fn neighbors_returns_eight_distinct_ish() {
        let hash = encode_geohash(0.0, 0.0, 6).unwrap();
        let ns = neighbors(&hash).unwrap();
        assert_eq!(ns.len(), 8);
    }

    #[test]
    fn polygon_requires_four_points() {
        let three = vec![
            GeoPoint::new(0.0, 0.0).unwrap(),
            GeoPoint::new(1.0, 0.0).unwrap(),
            GeoPoint::new(1.0, 1.0).unwrap(),
        ];
        assert!(validate_polygon(&three, &[]).is_err());
    }

    #[test]
    fn linestring_requires_two_points() {
        let one = vec![GeoPoint::new(0.0, 0.0).unwrap()];
        assert!(validate_linestring(&one).is_err());
    }
}
