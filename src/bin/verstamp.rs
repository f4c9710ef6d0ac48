use std::path::Path;
use std::process::ExitCode;

use log::{error, info};

use verstamp::config::Config;
use verstamp::patch;
use verstamp::pe::version_info::VersionInfo;
use verstamp::ParseOptions;

const USAGE: &str = "usage: verstamp [-v]... [-q] <config.json>
       verstamp [-v]... [-q] inspect <binary>";

enum Command {
    Stamp(String),
    Inspect(String),
}

struct Args {
    verbosity: usize,
    quiet: bool,
    command: Command,
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut verbosity = 2;
    let mut quiet = false;
    let mut positional = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-q" | "--quiet" => quiet = true,
            "-h" | "--help" => return Err(String::new()),
            flag if flag.starts_with("-v") && flag[1..].chars().all(|c| c == 'v') => {
                verbosity += flag.len() - 1;
            }
            flag if flag.starts_with('-') => return Err(format!("unknown option {}", flag)),
            _ => positional.push(arg.clone()),
        }
    }
    let command = match positional.as_slice() {
        [config] => Command::Stamp(config.clone()),
        [inspect, binary] if inspect == "inspect" => Command::Inspect(binary.clone()),
        _ => return Err("expected a configuration file or `inspect <binary>`".into()),
    };
    Ok(Args {
        verbosity,
        quiet,
        command,
    })
}

fn print_version_info(path: &Path, info: &VersionInfo) {
    println!("{}", path.display());
    match info.fixed_info() {
        Some(fixed) => {
            println!("  file version:    {}", fixed.file_version());
            println!("  product version: {}", fixed.product_version());
        }
        None => println!("  no fixed file info"),
    }
    if let Some(table) = info.string_table() {
        println!("  string table {}", table.key);
    }
    for (key, value) in info.strings() {
        println!("    {:<20} {}", key, value);
    }
}

fn inspect(binary: &str) -> ExitCode {
    let path = Path::new(binary);
    match patch::inspect(path, &ParseOptions::permissive()) {
        Ok(info) => {
            print_version_info(path, &info);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{}: {}", path.display(), err);
            ExitCode::FAILURE
        }
    }
}

fn stamp(config: &str) -> ExitCode {
    let config = match Config::load(Path::new(config)) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    let stamper = match config.build_stamper() {
        Ok(stamper) => stamper,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    let report = stamper.run(&config.target_set());
    let status = report.status();
    info!("Batch {}", status);
    if status.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("verstamp: {}", msg);
            }
            eprintln!("{}", USAGE);
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = stderrlog::new()
        .module("verstamp")
        .quiet(args.quiet)
        .verbosity(args.verbosity)
        .init()
    {
        eprintln!("verstamp: cannot initialize logging: {}", err);
    }
    match args.command {
        Command::Stamp(config) => stamp(&config),
        Command::Inspect(binary) => inspect(&binary),
    }
}
