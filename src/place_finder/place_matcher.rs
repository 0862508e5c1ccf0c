use failure::Fail;
use geojson::Error as GeoJsonError;
use geojson::GeoJson;

use std::convert::TryInto;
use std::fs::File;
use std::io;
use std::io::prelude::*;
use std::path;

use geo_types;
use serde;
use serde_json;

use super::place_finder_types::MatchResult;

use log::{debug, info};

const EARTH_RADIUS_KM: f64 = 6371.0;

// Six decimal places, roughly 11cm of longitude at the equator.
const COORDINATE_PRECISION: f64 = 1_000_000.0;

/**
 * Truncate a coordinate component to six decimals, toward zero: negative
 * values are ceiled at the 1e6 scale, non-negative values floored. The
 * [0,1) band follows the floor branch, so the whole rule reads as
 * "truncate toward zero".
 *
 * Coordinate range validity (longitude in [-180,180], latitude in
 * [-90,90]) is the caller's responsibility.
 */
#[inline]
pub fn parse_coordinate(coordinate: f64) -> f64 {
    if coordinate < 0.0 {
        (coordinate * COORDINATE_PRECISION).ceil() / COORDINATE_PRECISION
    } else {
        (coordinate * COORDINATE_PRECISION).floor() / COORDINATE_PRECISION
    }
}

/**
 * Haversine great-circle distance between two lat/lng pairs, in km.
 */
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/**
 * Binary nearest-value search over an ascending slice. Returns whichever
 * of the two bracketing values is absolutely closer to `num`. The slice
 * must be non-empty.
 */
fn closest(num: f64, sorted: &[f64]) -> f64 {
    let mut lo = 0;
    let mut hi = sorted.len() - 1;

    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if sorted[mid] < num {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    if num - sorted[lo] <= sorted[hi] - num {
        sorted[lo]
    } else {
        sorted[hi]
    }
}

#[derive(Debug, Fail)]
pub enum PlaceMatcherError {
    #[fail(display = "GeoJSON error: {}", _0)]
    Parse(GeoJsonError),
    #[fail(display = "Feature collection not found")]
    FeatureCollectionNotFound,
    #[fail(display = "Candidate has no point coordinates")]
    MissingCoordinates,
    #[fail(display = "Invalid point: {}", _0)]
    InvalidPoint(GeoJsonError),
    #[fail(display = "Candidate has no place_id property")]
    MissingPlaceId,
    #[fail(display = "I/O error: {}", _0)]
    Io(io::Error),
}

impl From<GeoJsonError> for PlaceMatcherError {
    fn from(err: GeoJsonError) -> PlaceMatcherError {
        info!("Error parsing geo-json: {}", err);
        PlaceMatcherError::Parse(err)
    }
}

impl From<io::Error> for PlaceMatcherError {
    fn from(err: io::Error) -> PlaceMatcherError {
        PlaceMatcherError::Io(err)
    }
}

/**
 * A place returned by the search provider: an opaque identifier plus its
 * point location ([lng, lat] ordering, as GeoJSON).
 */
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CandidatePlace {
    place_id: String,
    location: geo::Point<f64>,
}

impl CandidatePlace {
    pub fn new(feature: geojson::Feature) -> Result<CandidatePlace, PlaceMatcherError> {
        let geometry = feature
            .geometry
            .ok_or(PlaceMatcherError::MissingCoordinates)?;

        let location: geo::Point<f64> = match geometry.value {
            geojson::Value::Point(_) => {
                let point: Result<geo_types::Point<f64>, PlaceMatcherError> = geometry
                    .value
                    .try_into()
                    .map_err(PlaceMatcherError::InvalidPoint);
                point?
            }
            _ => return Err(PlaceMatcherError::MissingCoordinates),
        };

        let properties = feature.properties.unwrap_or_default();
        let place_id = match properties.get("place_id") {
            Some(serde_json::Value::String(id)) => id.clone(),
            _ => return Err(PlaceMatcherError::MissingPlaceId),
        };

        Ok(CandidatePlace { place_id, location })
    }

    #[inline]
    pub fn place_id(&self) -> &str {
        &self.place_id
    }

    #[inline]
    pub fn location(&self) -> &geo::Point<f64> {
        &self.location
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PlaceMatcher {
    candidates: Vec<CandidatePlace>,
}

impl PlaceMatcher {
    pub fn new<P: AsRef<path::Path>>(geojson_path: P) -> Result<PlaceMatcher, PlaceMatcherError> {
        let mut file = File::open(&geojson_path)?;
        let mut file_contents = String::new();
        file.read_to_string(&mut file_contents)?;

        PlaceMatcher::new_from_string(&file_contents)
    }

    pub fn new_from_string(geo_json_str: &str) -> Result<PlaceMatcher, PlaceMatcherError> {
        let geo_json = geo_json_str.parse::<GeoJson>()?;

        let feature_collection = if let GeoJson::FeatureCollection(ctn) = geo_json {
            ctn
        } else {
            return Err(PlaceMatcherError::FeatureCollectionNotFound);
        };

        let candidates: Result<Vec<_>, _> = feature_collection
            .features
            .into_iter()
            .map(CandidatePlace::new)
            .collect();
        let candidates = candidates?;

        info!("Loaded {} candidate places", candidates.len());

        Ok(PlaceMatcher { candidates })
    }

    pub fn candidate_count(&self) -> usize {
        return self.candidates.len();
    }

    /**
     * Resolve `target` against the candidate set. The first candidate
     * whose parsed coordinates equal the parsed target wins outright, in
     * scan order, even when a numerically closer non-exact candidate
     * exists. Otherwise every distance is collected, sorted, and the
     * nearest-to-zero one located by binary search; the first candidate
     * carrying that distance is returned. An empty candidate set is a
     * `None`, not an error.
     */
    pub fn find_match(&self, target: &geo::Point<f64>) -> Option<MatchResult> {
        if self.candidates.is_empty() {
            return None;
        }

        let lng = parse_coordinate(target.x());
        let lat = parse_coordinate(target.y());

        let mut distances = Vec::with_capacity(self.candidates.len());
        let mut places = Vec::with_capacity(self.candidates.len());

        for candidate in &self.candidates {
            let cand_lng = parse_coordinate(candidate.location.x());
            let cand_lat = parse_coordinate(candidate.location.y());

            let distance = distance_km(lat, lng, cand_lat, cand_lng);

            if cand_lat == lat && cand_lng == lng {
                info!(
                    "Found candidate with matching coordinates: {}",
                    candidate.place_id
                );
                return Some(MatchResult {
                    place_id: &candidate.place_id,
                    distance,
                });
            }

            debug!("Candidate {} at {} km", candidate.place_id, distance);

            distances.push(distance);
            places.push((distance, candidate));
        }

        debug!("No exact coordinate match, falling back to nearest distance");

        distances.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let closest_distance = closest(0.0, &distances);

        places
            .iter()
            .find(|(distance, _)| *distance == closest_distance)
            .map(|(distance, candidate)| MatchResult {
                place_id: &candidate.place_id,
                distance: *distance,
            })
    }
}

impl PlaceMatcher {
    pub fn find(&self, latitude: f64, longitude: f64) -> Option<MatchResult> {
        return self.find_match(&geo::Point::from((longitude, latitude)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const PASADENA_GEOJSON_STR: &str = include_str!("test_resources/pasadena_candidates.json");
    const SPREAD_GEOJSON_STR: &str = include_str!("test_resources/spread_candidates.json");
    const EMPTY_GEOJSON_STR: &str = include_str!("test_resources/empty_candidates.json");
    const ONE_FEATURE_GEOJSON_STR: &str = include_str!("test_resources/one_feature.json");
    const MALFORMED_GEOJSON_STR: &str = include_str!("test_resources/malformed.json");
    const MISSING_GEOMETRY_GEOJSON_STR: &str = include_str!("test_resources/missing_geometry.json");
    const MISSING_PLACE_ID_GEOJSON_STR: &str = include_str!("test_resources/missing_place_id.json");

    #[test]
    fn it_should_truncate_coordinates_to_six_decimals() {
        assert_eq!(parse_coordinate(34.1389702), 34.138970);
        assert_eq!(parse_coordinate(-118.1984241), -118.198424);
    }

    #[test]
    fn it_should_truncate_toward_zero_below_one() {
        assert_eq!(parse_coordinate(0.1234567), 0.123456);
        assert_eq!(parse_coordinate(0.0), 0.0);
        assert_eq!(parse_coordinate(-0.1234567), -0.123456);
    }

    #[test]
    fn it_should_leave_six_decimal_coordinates_unchanged() {
        assert_eq!(parse_coordinate(34.138970), 34.138970);
        assert_eq!(parse_coordinate(-118.198424), -118.198424);
    }

    #[test]
    fn it_should_compute_zero_distance_for_identical_points() {
        assert_eq!(distance_km(34.1389702, -118.1984241, 34.1389702, -118.1984241), 0.0);
        assert_eq!(distance_km(0.0, 0.0, 0.0, 0.0), 0.0);
        assert_eq!(distance_km(-33.8675, 151.207, -33.8675, 151.207), 0.0);
    }

    #[test]
    fn it_should_compute_symmetric_distances() {
        let forward = distance_km(34.1389702, -118.1984241, 39.57422, -105.01621);
        let backward = distance_km(39.57422, -105.01621, 34.1389702, -118.1984241);

        assert_eq!(forward, backward);
    }

    #[test]
    fn it_should_compute_a_known_distance() {
        // Pasadena to Denver area, roughly 1290 km.
        let distance = distance_km(34.1389702, -118.1984241, 39.57422, -105.01621);

        assert!(distance > 1250.0 && distance < 1350.0);
    }

    #[test]
    fn it_should_find_the_closest_value_by_binary_search() {
        assert_eq!(closest(0.0, &[0.5]), 0.5);
        assert_eq!(closest(0.0, &[0.2, 0.7, 1.4]), 0.2);
        assert_eq!(closest(1.0, &[0.2, 0.7, 1.4]), 0.7);
        assert_eq!(closest(1.2, &[0.2, 0.7, 1.4]), 1.4);
    }

    #[test]
    fn it_should_prefer_the_lower_bracket_on_ties() {
        assert_eq!(closest(1.0, &[0.5, 1.5]), 0.5);
    }

    #[test]
    fn it_should_parse_a_valid_candidate_file() {
        let matcher = PlaceMatcher::new_from_string(PASADENA_GEOJSON_STR).unwrap();

        assert_eq!(matcher.candidate_count(), 2);
    }

    #[test]
    fn it_should_fail_without_a_feature_collection() {
        let result = PlaceMatcher::new_from_string(ONE_FEATURE_GEOJSON_STR);

        assert_matches!(result, Err(PlaceMatcherError::FeatureCollectionNotFound));
    }

    #[test]
    fn it_should_fail_on_malformed_geojson() {
        let result = PlaceMatcher::new_from_string(MALFORMED_GEOJSON_STR);

        assert_matches!(result, Err(PlaceMatcherError::Parse(_)));
    }

    #[test]
    fn it_should_fail_when_a_candidate_has_no_coordinates() {
        let result = PlaceMatcher::new_from_string(MISSING_GEOMETRY_GEOJSON_STR);

        assert_matches!(result, Err(PlaceMatcherError::MissingCoordinates));
    }

    #[test]
    fn it_should_fail_when_a_candidate_has_no_place_id() {
        let result = PlaceMatcher::new_from_string(MISSING_PLACE_ID_GEOJSON_STR);

        assert_matches!(result, Err(PlaceMatcherError::MissingPlaceId));
    }

    #[test]
    fn it_should_short_circuit_on_an_exact_coordinate_match() {
        let matcher = PlaceMatcher::new_from_string(PASADENA_GEOJSON_STR).unwrap();

        // p1 is scanned first and is close, but p2 matches exactly.
        let result = matcher.find(34.1389702, -118.1984241).unwrap();

        assert_eq!(result.place_id, "p2");
    }

    #[test]
    fn it_should_fall_back_to_the_nearest_distance() {
        let matcher = PlaceMatcher::new_from_string(SPREAD_GEOJSON_STR).unwrap();

        let result = matcher.find(34.1389702, -118.1984241).unwrap();

        assert_eq!(result.place_id, "p2");
        assert!(result.distance > 0.0);
    }

    #[test]
    fn it_should_return_none_for_an_empty_candidate_set() {
        let matcher = PlaceMatcher::new_from_string(EMPTY_GEOJSON_STR).unwrap();

        assert!(matcher.find(34.1389702, -118.1984241).is_none());
    }

    #[test]
    fn it_should_return_the_first_exact_match_among_duplicates() {
        let geojson_str = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "place_id": "first" },
                    "geometry": { "type": "Point", "coordinates": [-118.1984241, 34.1389702] }
                },
                {
                    "type": "Feature",
                    "properties": { "place_id": "second" },
                    "geometry": { "type": "Point", "coordinates": [-118.1984241, 34.1389702] }
                }
            ]
        }"#;
        let matcher = PlaceMatcher::new_from_string(geojson_str).unwrap();

        let result = matcher.find(34.1389702, -118.1984241).unwrap();

        assert_eq!(result.place_id, "first");
    }
}
