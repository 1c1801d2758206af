//! severecli
//!
//! Analyze a sounding for CAPE and the supercell composite parameter and write the results to a
//! JSON file. With no arguments the built in mock sounding is analyzed and written to
//! `weather_data.json` in the current directory.
use severecli::{SoundingSample, DEFAULT_OUTPUT};
use std::{error::Error, path::PathBuf};
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(e) = run() {
        println!("error: {}", e);

        let mut err = &*e;

        while let Some(cause) = err.source() {
            println!("caused by: {}", cause);
            err = cause;
        }

        ::std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = parse_args();
    init_logging(args.verbose);

    let sample = match &args.sample {
        Some(path) => SoundingSample::from_json_file(path)?,
        None => SoundingSample::mock(),
    };

    let record = severecli::export(&sample, &args.output)?;

    println!(
        "{} created with CAPE: {} and SCP: {}",
        args.output.display(),
        record.cape,
        record.scp
    );

    Ok(())
}

#[derive(Debug)]
struct CmdLineArgs {
    sample: Option<PathBuf>,
    output: PathBuf,
    verbose: bool,
}

fn parse_args() -> CmdLineArgs {
    let app = clap::App::new("severecli")
        .author("Ryan <rnleach@users.noreply.github.com>")
        .version(clap::crate_version!())
        .about("Sounding severe weather indexes.")
        .arg(
            clap::Arg::with_name("sample")
                .short("s")
                .long("sample")
                .takes_value(true)
                .help("JSON file with the sounding to analyze.")
                .long_help(concat!(
                    "JSON file with the sounding to analyze. It must have a location with lat and",
                    " lon, and equal length pressure, height, temperature, dew_point, wind_speed,",
                    " and wind_direction arrays ordered from the lowest level up. Default is to",
                    " use a built in mock sounding.",
                )),
        )
        .arg(
            clap::Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .default_value(DEFAULT_OUTPUT)
                .help("File to write the results to, it will be overwritten."),
        )
        .arg(
            clap::Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Log the intermediate analysis to stderr."),
        );

    let matches = app.get_matches();

    let sample = matches.value_of("sample").map(PathBuf::from);
    let output = matches
        .value_of("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    let verbose = matches.is_present("verbose");

    CmdLineArgs {
        sample,
        output,
        verbose,
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
