use clap::{Arg, Command};
use log::LevelFilter;
use postguard::config::AnalysisConfig;
use postguard::email::NormalizedEmail;
use postguard::pipeline::SecurityPipeline;
use std::io::Read;
use std::process;

fn main() {
    let matches = Command::new("postguard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Zero-trust email threat analysis")
        .long_about(
            "Classifies normalized emails as safe or suspicious through a \
             four-stage pipeline: phishing signal scoring, URL risk scanning, \
             attachment classification, and decision fusion.",
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (defaults used when omitted)"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Write the default configuration file and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Validate the configuration and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("analyze")
                .long("analyze")
                .value_name("FILE")
                .help("Analyze a normalized email (JSON), '-' for stdin")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("pretty")
                .long("pretty")
                .help("Pretty-print the analysis result")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging with per-stage traces")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(path) = matches.get_one::<String>("generate-config") {
        match AnalysisConfig::default().to_file(path) {
            Ok(()) => println!("Default configuration written to {path}"),
            Err(e) => {
                eprintln!("Error writing configuration file: {e}");
                process::exit(1);
            }
        }
        return;
    }

    let config = match matches.get_one::<String>("config") {
        Some(path) => match AnalysisConfig::from_file(path) {
            Ok(config) => {
                log::info!("Loaded configuration from {path}");
                config
            }
            Err(e) => {
                eprintln!("Error loading configuration: {e}");
                process::exit(1);
            }
        },
        None => AnalysisConfig::default(),
    };

    if matches.get_flag("test-config") {
        match SecurityPipeline::new(config) {
            Ok(_) => {
                println!("Configuration is valid; all patterns compiled successfully.");
                return;
            }
            Err(e) => {
                println!("Configuration validation failed: {e}");
                process::exit(1);
            }
        }
    }

    let Some(input) = matches.get_one::<String>("analyze") else {
        eprintln!("Nothing to do; pass --analyze, --test-config or --generate-config");
        process::exit(1);
    };

    let raw = if input == "-" {
        let mut buffer = String::new();
        if let Err(e) = std::io::stdin().read_to_string(&mut buffer) {
            eprintln!("Error reading stdin: {e}");
            process::exit(1);
        }
        buffer
    } else {
        match std::fs::read_to_string(input) {
            Ok(raw) => raw,
            Err(e) => {
                eprintln!("Error reading email file {input}: {e}");
                process::exit(1);
            }
        }
    };

    let email: NormalizedEmail = match serde_json::from_str(&raw) {
        Ok(email) => email,
        Err(e) => {
            eprintln!("Error parsing normalized email: {e}");
            process::exit(1);
        }
    };

    let pipeline = match SecurityPipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error building analysis pipeline: {e}");
            process::exit(1);
        }
    };

    let result = pipeline.analyze(&email);

    let serialized = if matches.get_flag("pretty") {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    };
    match serialized {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing analysis result: {e}");
            process::exit(1);
        }
    }
}
