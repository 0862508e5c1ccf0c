mod place_finder_types;
mod place_matcher;

pub use self::place_finder_types::MatchResult;
pub use self::place_matcher::{
    distance_km, parse_coordinate, CandidatePlace, PlaceMatcher, PlaceMatcherError,
};
