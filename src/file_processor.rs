use super::cli_utils;
use super::place_finder;

use csv;
use std::io;
use std::time;

use log::{info, warn};

use failure::Fail;

const MISSING_FIELD_VALUE: &'static str = "-";

#[derive(Debug)]
pub struct ProcessStats {
    pub total_lines: u32,
    pub matched_lines: u32,
    pub error_lines: u32,
}

#[allow(dead_code)]
#[derive(Debug, Fail)]
pub enum FileProcessorError {
    #[fail(display = "I/O error: {}", _0)]
    Io(io::Error),
    #[fail(display = "Csv error: {}", _0)]
    Csv(csv::Error),
}

#[inline]
fn record_size(record: &csv::StringRecord) -> u64 {
    use std::convert::TryInto;
    let size: usize = record.iter().map(|e| e.len()).sum();
    return size.try_into().unwrap_or(0);
}

#[inline]
fn fill_missing_row(new_record: &mut csv::StringRecord, status: &str, write_status: bool) {
    new_record.push_field(MISSING_FIELD_VALUE); // place_id
    new_record.push_field(MISSING_FIELD_VALUE); // distance_km
    if write_status {
        new_record.push_field(status);
    }
}

/**
 * Stream a CSV of coordinate rows and append the matched place for each
 * one. Rows with unparseable coordinates get placeholder columns and an
 * "error" status; rows without any candidate match get a "miss".
 */
pub fn match_places_join(
    matcher: &place_finder::PlaceMatcher,
    input_file: &mut io::Read,
    file_size: Option<u64>,
    output_file: &mut io::Write,
    delimiter: u8,
    latitude_idx: usize,
    longitude_idx: usize,
    no_header: bool,
    write_status: bool,
) -> Result<ProcessStats, FileProcessorError> {
    let progress_bar = cli_utils::create_progress_bar_bytes(false, "Matching...", file_size);

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false) // Headers are handled below.
        .flexible(true)
        .from_reader(input_file);

    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(output_file);

    let mut total_lines = 0;
    let mut matched_lines = 0;
    let mut error_lines = 0;

    let start_instant = time::Instant::now();

    let mut records = csv_reader.records();

    let has_header = !no_header;
    if has_header {
        // If the file has a header, process it first and append the columns we want
        if let Some(Ok(header)) = records.next() {
            let mut new_header: Vec<String> = header.iter().map(String::from).collect();

            new_header.push("place_id".to_owned());
            new_header.push("distance_km".to_owned());

            if write_status {
                new_header.push("status".to_owned());
            }

            csv_writer.write_record(new_header).ok();
        }
    }

    for (line_number, record_result) in records.enumerate() {
        total_lines += 1;

        match record_result {
            Err(e) => {
                warn!("Unable to read line {}: {}", line_number, e);
                error_lines += 1;
            }
            Ok(record) => {
                let mut new_record = record.clone();

                let latitude_opt = record
                    .get(latitude_idx)
                    .and_then(|v| v.parse::<f64>().ok());

                let longitude_opt = record
                    .get(longitude_idx)
                    .and_then(|v| v.parse::<f64>().ok());

                if latitude_opt.is_none() || longitude_opt.is_none() {
                    error_lines += 1;
                    fill_missing_row(&mut new_record, "error", write_status);
                } else {
                    let latitude = latitude_opt.unwrap();
                    let longitude = longitude_opt.unwrap();

                    match matcher.find(latitude, longitude) {
                        Some(match_result) => {
                            matched_lines += 1;

                            new_record.push_field(match_result.place_id);
                            new_record.push_field(&format!("{:.6}", match_result.distance));

                            if write_status {
                                new_record.push_field("success");
                            }
                        }
                        None => {
                            fill_missing_row(&mut new_record, "miss", write_status);
                        }
                    }
                }

                let write_result = csv_writer.write_record(&new_record);

                progress_bar.inc(record_size(&record));

                if write_result.is_err() {
                    break;
                }
            }
        };
    }

    #[allow(unused_must_use)]
    {
        csv_writer.flush();
    }

    progress_bar.finish();

    let end_instant = time::Instant::now();
    let elapsed_secs = (end_instant - start_instant).as_millis() as f32 / 1000.0f32;
    info!(
        "Matched {} of {} rows in {} seconds. Avg: {} rows/sec",
        matched_lines,
        total_lines,
        elapsed_secs,
        (total_lines as f32) / elapsed_secs
    );

    return Ok(ProcessStats {
        total_lines,
        matched_lines,
        error_lines,
    });
}
