#[macro_use]
extern crate clap;
use clap::{App, Arg, ArgGroup, SubCommand};

#[macro_use]
extern crate failure;
use failure::Error;

use log::{error, info, warn};
use simplelog;
use std::io;
use std::path::Path;

mod cli_utils;
mod file_processor;
mod index_utils;
mod permute;
mod place_finder;
mod record_paths;

use chrono::offset::Local;

#[derive(Debug, Fail)]
pub enum MainError {
    #[fail(display = "Delimiter must be exactly one character")]
    InvalidDelimiter,
}

fn main() {
    let local_time = Local::now();
    let time_offset = local_time.offset();
    // Configure logging
    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config {
            offset: time_offset.clone(),
            ..simplelog::Config::default()
        },
        simplelog::TerminalMode::Stderr,
    )
    .ok();

    match do_main() {
        Ok(_) => info!("Process finished OK"),
        Err(err) => {
            error!("Process finished with an error: {}", err);
            std::process::exit(1);
        }
    };
}

fn generate_index_command<P: AsRef<Path>>(
    dest_path: P,
    geo_json_path: P,
    force: bool,
) -> Result<(), Error> {
    info!(
        "Generating candidate index from geo-json {:?} ...",
        geo_json_path.as_ref()
    );

    let mut dest_file_buffer = dest_path.as_ref().to_path_buf();
    if dest_path.as_ref().is_dir() {
        dest_file_buffer.set_file_name("places.idx.bin");
    }
    let dest_file: &Path = dest_file_buffer.as_path();

    if dest_file.exists() && !force {
        warn!(
            "Index exist in {}. Skipping. Use --force to overwrite",
            dest_file.display()
        );
        return Ok(());
    }

    info!("Generating index into {} ...", dest_file.display());

    match index_utils::create_place_index(geo_json_path) {
        Ok(matcher) => {
            info!("Saving index information into {}", dest_file.display());
            index_utils::save_place_index(&matcher, dest_file)?;
        }
        Err(err) => {
            error!("Error creating place index: {}", err);
        }
    };

    Ok(())
}

fn match_command(
    matcher: &place_finder::PlaceMatcher,
    latitude: f64,
    longitude: f64,
) -> Result<(), Error> {
    match matcher.find(latitude, longitude) {
        Some(match_result) => {
            info!(
                "Matched place {} at {} km",
                match_result.place_id, match_result.distance
            );
            println!(
                "{}",
                serde_json::json!({
                    "place_id": match_result.place_id,
                    "distance_km": match_result.distance,
                })
            );
        }
        None => {
            warn!("No candidate matched ({}, {})", latitude, longitude);
            println!("{}", serde_json::json!({}));
        }
    };

    Ok(())
}

fn join_command(
    matcher: &place_finder::PlaceMatcher,
    input_file: &mut io::Read,
    file_size: Option<u64>,
    output_file: &mut io::Write,
    char_delimiter: u8,
    latitude_idx: usize,
    longitude_idx: usize,
    no_header: bool,
    write_status: bool,
) -> Result<(), Error> {
    let process_result = file_processor::match_places_join(
        &matcher,
        input_file,
        file_size,
        output_file,
        char_delimiter,
        latitude_idx,
        longitude_idx,
        no_header,
        write_status,
    );

    return match process_result {
        Ok(stats) => {
            info!("Stats: {:?}", stats);
            Ok(())
        }
        Err(err) => Err(Error::from(err)),
    };
}

fn permute_command(
    record_path: &Path,
    field_paths: Vec<&str>,
    output_path: Option<&str>,
    max_outputs: usize,
) -> Result<(), Error> {
    let record_str = std::fs::read_to_string(record_path)?;
    let record: serde_json::Value = serde_json::from_str(&record_str)?;

    let paths = permute::FieldPaths::from(
        field_paths
            .iter()
            .map(|path| path.to_string())
            .collect::<Vec<_>>(),
    );

    let permuter = permute::Permuter::new(max_outputs);
    let perms = permuter.permutations_of_fields_by_values(&record, &paths)?;

    let serialized = serde_json::to_string_pretty(&perms)?;

    match output_path {
        Some(path) => {
            info!("Writing {} permutations to {}", perms.len(), path);
            std::fs::write(path, serialized)?;
        }
        None => println!("{}", serialized),
    };

    Ok(())
}

fn load_matcher(run_matches: &clap::ArgMatches) -> Result<place_finder::PlaceMatcher, Error> {
    if run_matches.is_present("index") {
        let index_path = Path::new(run_matches.value_of("index").expect("index"));

        Ok(index_utils::load_place_index(index_path)?)
    } else if run_matches.is_present("geo-file") {
        let geo_json_path = Path::new(run_matches.value_of("geo-file").expect("geo-file"));

        Ok(index_utils::create_place_index(geo_json_path)?)
    } else {
        error!("Either geo-file or index must be indicated.");
        std::process::exit(1)
    }
}

fn do_main() -> Result<(), Error> {
    let matches = App::new("place_match")
                    .version("0.1.0")
                    .about("Match coordinates against a candidate place set, and expand record permutations")
                    .subcommand(
                        SubCommand::with_name("generate_index")
                            .about("Generate a candidate index file from geo-json")
                            .arg(Arg::with_name("output")
                                .short("o")
                                .help("Output path or file for the generated index")
                                .takes_value(true)
                                .default_value(".")
                            )
                            .arg(Arg::with_name("force")
                                .short("f")
                                .long("force")
                                .help("Overwrite indexes")
                                .takes_value(false)
                            )
                            .arg(Arg::with_name("geo-json")
                                .short("g")
                                .required(true)
                                .help("Path for the geo-json candidate file")
                                .takes_value(true)
                            )
                    )

                    .subcommand(
                        SubCommand::with_name("match")
                            .about("Resolve a single coordinate to the best-matching candidate place")
                            .group(ArgGroup::with_name("geo-file-arg")
                                .args(&["index", "geo-file"])
                                .required(true))
                            .arg(Arg::with_name("index")
                                .short("x")
                                .long("index")
                                .help("Use an index instead of a geo-json file.")
                                .takes_value(true)
                            )
                            .arg(Arg::with_name("geo-file")
                                .short("g")
                                .long("geo-file")
                                .help("Path for the geo-json candidate file. Index will be generated on the fly.")
                                .takes_value(true)
                            )
                            .arg(Arg::with_name("latitude")
                                .long("latitude")
                                .help("Target latitude.")
                                .takes_value(true)
                                .required(true)
                            )
                            .arg(Arg::with_name("longitude")
                                .long("longitude")
                                .help("Target longitude.")
                                .takes_value(true)
                                .required(true)
                            )
                    )

                    .subcommand(
                        SubCommand::with_name("join")
                            .about("Match every coordinate row of a delimited file")
                            .arg(Arg::with_name("output")
                                    .short("o")
                                    .long("output")
                                    .help("Sets the output file to create.")
                                    .takes_value(true)
                                    .required(false)
                            )
                            .group(ArgGroup::with_name("geo-file-arg")
                                .args(&["index", "geo-file"])
                                .required(true))
                            .arg(Arg::with_name("index")
                                .short("x")
                                .long("index")
                                .help("Use an index instead of a geo-json file.")
                                .takes_value(true)
                            )
                            .arg(Arg::with_name("geo-file")
                                .short("g")
                                .long("geo-file")
                                .help("Path for the geo-json candidate file. Index will be generated on the fly.")
                                .takes_value(true)
                            )
                            .arg(Arg::with_name("input")
                                .short("i")
                                .long("input")
                                .help("Sets the input file to use. If omitted, stdin will be used.")
                                .takes_value(true)
                            )
                            .arg(Arg::with_name("delimiter")
                                .short("d")
                                .long("delimiter")
                                .help("Delimiter for input file fields")
                                .takes_value(true)
                                .required(false)
                                .default_value("\t"),
                            )
                            .arg(Arg::with_name("latitude")
                                .long("latitude")
                                .help("Sets the column number that contains the latitude. 1 based.")
                                .takes_value(true)
                                .required(true)
                            )
                            .arg(Arg::with_name("longitude")
                                .long("longitude")
                                .help("Sets the column number that contains the longitude. 1 based.")
                                .takes_value(true)
                                .required(true)
                            )
                            .arg(Arg::with_name("with-header")
                                 .long("with-header")
                                 .help("Specifies that the input file contains a header.")
                                )
                            .arg(Arg::with_name("write-match-status")
                                .long("write-match-status")
                                .help("Write an extra column indicating whether the match succeeded for each row.")
                            )
                    )

                    .subcommand(
                        SubCommand::with_name("permute")
                            .about("Expand a JSON record over the candidate values of the given field paths")
                            .arg(Arg::with_name("record")
                                .short("r")
                                .long("record")
                                .help("Path for the JSON record file")
                                .takes_value(true)
                                .required(true)
                            )
                            .arg(Arg::with_name("paths")
                                .multiple(true)
                                .takes_value(true)
                                .required(true)
                                .help("Dotted field paths whose array values should be expanded.")
                                .long("paths")
                                .short("p")
                            )
                            .arg(Arg::with_name("output")
                                .short("o")
                                .long("output")
                                .help("Sets the output file to create. If omitted, stdout will be used.")
                                .takes_value(true)
                            )
                            .arg(Arg::with_name("max-outputs")
                                .long("max-outputs")
                                .help("Reject expansions with more than this many permutations.")
                                .takes_value(true)
                            )
                    )
                    .get_matches();

    if let Some(generate_matches) = matches.subcommand_matches("generate_index") {
        return generate_index_command(
            generate_matches.value_of("output").unwrap_or_default(),
            generate_matches.value_of("geo-json").unwrap_or_default(),
            generate_matches.is_present("force"),
        );
    }

    if let Some(match_matches) = matches.subcommand_matches("match") {
        let matcher = load_matcher(&match_matches)?;

        let latitude = value_t!(match_matches, "latitude", f64).expect("latitude");
        let longitude = value_t!(match_matches, "longitude", f64).expect("longitude");

        return match_command(&matcher, latitude, longitude);
    }

    if let Some(run_matches) = matches.subcommand_matches("join") {
        let input_file_path = run_matches.value_of("input");

        let matcher = load_matcher(&run_matches)?;

        // 1 based.
        let latitude_idx = value_t!(run_matches, "latitude", usize).expect("latitude") - 1;
        let longitude_idx = value_t!(run_matches, "longitude", usize).expect("longitude") - 1;

        // Parse the delimiter. Should be exactly one character.
        let delimiter = run_matches
            .value_of("delimiter")
            .unwrap_or_default()
            .replace("\\t", "\t");
        if delimiter.len() != 1 {
            return Err(Error::from(MainError::InvalidDelimiter));
        }
        let char_delimiter: u8 = delimiter.as_bytes()[0];
        info!("Using the following delimiter: {:?}", char_delimiter);

        let no_header = !run_matches.is_present("with-header");

        let stdin = io::stdin();
        let (mut input_file, input_file_size): (Box<io::Read>, Option<u64>) = match input_file_path
        {
            Some(path) => {
                let input_file = std::fs::File::open(path)?;
                let file_size = input_file.metadata()?.len();
                (Box::new(input_file), Some(file_size))
            }
            None => {
                info!("Reading from stdin");
                (Box::new(stdin.lock()), None)
            }
        };

        let output_file_path = run_matches.value_of("output");

        let stdout = io::stdout();
        let mut output_file: Box<io::Write> = match output_file_path {
            Some(path) => {
                info!("Writing to file {}.", path);
                Box::new(std::fs::File::create(path)?)
            }
            None => {
                info!("Writing to stdout");
                Box::new(stdout.lock())
            }
        };

        let write_status = run_matches.is_present("write-match-status");

        return join_command(
            &matcher,
            input_file.as_mut(),
            input_file_size,
            output_file.as_mut(),
            char_delimiter,
            latitude_idx,
            longitude_idx,
            no_header,
            write_status,
        );
    }

    if let Some(permute_matches) = matches.subcommand_matches("permute") {
        let record_path = Path::new(permute_matches.value_of("record").expect("record"));

        let field_paths: Vec<_> = permute_matches
            .values_of("paths")
            .unwrap_or_default()
            .collect();

        let max_outputs = if permute_matches.is_present("max-outputs") {
            value_t!(permute_matches, "max-outputs", usize).expect("max-outputs")
        } else {
            permute::DEFAULT_MAX_OUTPUTS
        };

        return permute_command(
            record_path,
            field_paths,
            permute_matches.value_of("output"),
            max_outputs,
        );
    }

    return Ok(());
}
