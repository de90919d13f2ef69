//! Command-line front end: argument parsing, logging setup, SHEFPARM
//! discovery and exit-code mapping around [ShefParser].

use std::{
    io::Write,
    path::{Path, PathBuf},
    time::Instant,
};

use clap::Parser as ClapParser;

use shef::prelude::*;

#[derive(ClapParser, Debug)]
#[command(
    name = "shef",
    version,
    about = "Parses SHEF messages into different output formats"
)]
struct Cli {
    /// path of SHEFPARM file to use
    #[arg(short = 's', long, conflicts_with = "defaults")]
    shefparm: Option<PathBuf>,

    /// input file (defaults to <stdin>)
    #[arg(short = 'i', long = "in", value_name = "input_filename")]
    input: Option<PathBuf>,

    /// output file (defaults to <stdout>)
    #[arg(short = 'o', long = "out", value_name = "output_filename")]
    output: Option<PathBuf>,

    /// log file (defaults to <stderr>)
    #[arg(short = 'l', long, value_name = "log_filename")]
    log: Option<PathBuf>,

    /// output format (defaults to 1)
    #[arg(short = 'f', long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
    format: u8,

    /// verbosity/logging level (defaults to INFO)
    #[arg(
        short = 'v',
        long,
        default_value = "INFO",
        value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"]
    )]
    loglevel: String,

    /// use program defaults (ignore default SHEFPARM)
    #[arg(long)]
    defaults: bool,

    /// timestamp log output
    #[arg(long)]
    timestamps: bool,

    /// use shefit date/time logic
    #[arg(long)]
    shefit_times: bool,

    /// reject all values from messages that contain errors
    #[arg(long)]
    reject_problematic: bool,

    /// append to output file instead of overwriting
    #[arg(long)]
    append_out: bool,

    /// append to log file instead of overwriting
    #[arg(long)]
    append_log: bool,
}

fn level_name(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARNING",
        log::Level::Info => "INFO",
        log::Level::Debug | log::Level::Trace => "DEBUG",
    }
}

fn init_logging(cli: &Cli) -> Result<(), std::io::Error> {
    let level = match cli.loglevel.as_str() {
        "DEBUG" => log::LevelFilter::Debug,
        "WARNING" => log::LevelFilter::Warn,
        "ERROR" | "CRITICAL" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);

    let timestamps = cli.timestamps;
    builder.format(move |buf, record| {
        if timestamps {
            writeln!(
                buf,
                "{} {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                level_name(record.level()),
                record.args()
            )
        } else {
            writeln!(buf, "{}: {}", level_name(record.level()), record.args())
        }
    });

    if let Some(path) = &cli.log {
        let file = if cli.append_log {
            std::fs::OpenOptions::new().create(true).append(true).open(path)?
        } else {
            std::fs::File::create(path)?
        };
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

/// Locate a SHEFPARM file: an explicit path wins, `--defaults` suppresses
/// the search, otherwise `$rfs_sys_dir` (or the working directory) is
/// checked for a file named SHEFPARM.
fn resolve_shefparm(cli: &Cli) -> Option<PathBuf> {
    if cli.defaults {
        return None;
    }
    if let Some(path) = &cli.shefparm {
        return Some(path.clone());
    }
    let dir = std::env::var_os("rfs_sys_dir")
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())?;
    let candidate = dir.join("SHEFPARM");
    if candidate.exists() && !candidate.is_dir() {
        Some(candidate)
    } else {
        None
    }
}

fn run(cli: &Cli) -> Result<(), Error> {
    let start = Instant::now();
    let shefparm = resolve_shefparm(cli);
    let format = OutputFormat::from_number(cli.format).unwrap_or_default();

    log::info!("----------------------------------------------------------------------");
    log::info!(
        "Program shef version {} starting up",
        env!("CARGO_PKG_VERSION")
    );
    log::info!("----------------------------------------------------------------------");
    match &shefparm {
        Some(path) => log::debug!(
            "Will modify program defaults with content of file {}",
            path.display()
        ),
        None => log::debug!("Will use program defaults"),
    }

    let mut parser = ShefParser::new(
        format,
        shefparm.as_deref(),
        cli.shefit_times,
        cli.reject_problematic,
    )?;
    parser.set_input(cli.input.as_deref())?;
    parser.set_output(cli.output.as_deref(), cli.append_out)?;

    let summary = parser.run()?;
    parser.close_output()?;

    let input_name = cli
        .input
        .as_deref()
        .map(Path::display)
        .map(|d| d.to_string())
        .unwrap_or_else(|| "<stdin>".to_string());
    let output_name = cli
        .output
        .as_deref()
        .map(Path::display)
        .map(|d| d.to_string())
        .unwrap_or_else(|| "<stdout>".to_string());

    log::info!("");
    log::info!("--[Summary]-----------------------------------------------------------");
    log::info!("SHEFPARM   = {:?}", shefparm);
    log::info!("Run Time   = {:.3}s", start.elapsed().as_secs_f64());
    log::info!("{:6} lines read from {}", summary.lines_read, input_name);
    log::info!("{:6} messages processed", summary.message_count);
    log::info!("{:6} values output to {}", summary.value_count, output_name);
    log::info!(
        "{:6} warnings in {} messages",
        summary.warning_count,
        summary.messages_with_warnings
    );
    log::info!(
        "{:6} errors in {} messages",
        summary.error_count,
        summary.messages_with_errors
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli) {
        eprintln!("Cannot initialize logging: {}", e);
        std::process::exit(-1);
    }
    match run(&cli) {
        Ok(()) => {}
        Err(Error::MaxErrorsExceeded(_)) => std::process::exit(-2),
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(-1);
        }
    }
}
