use std::path;

use super::cli_utils;
use super::place_finder;

use bincode::ErrorKind;

pub fn load_place_index(
    input_path: &path::Path,
) -> Result<place_finder::PlaceMatcher, Box<ErrorKind>> {
    let progress_bar = cli_utils::create_progress_bar_count(false, "Loading index...", None);
    progress_bar.enable_steady_tick(200);

    let file_reader = std::fs::File::open(input_path)?;
    let buf_reader = std::io::BufReader::new(file_reader);
    let result = bincode::deserialize_from(buf_reader);

    progress_bar.finish();
    result
}

pub fn save_place_index(
    matcher: &place_finder::PlaceMatcher,
    output_file: &path::Path,
) -> Result<(), Box<ErrorKind>> {
    let file_writer = std::fs::File::create(output_file)?;
    let buf_writer = std::io::BufWriter::new(file_writer);
    bincode::serialize_into(buf_writer, matcher)
}

pub fn create_place_index<P: AsRef<path::Path>>(
    geojson_path: P,
) -> Result<place_finder::PlaceMatcher, place_finder::PlaceMatcherError> {
    place_finder::PlaceMatcher::new(geojson_path)
}
