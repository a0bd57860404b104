use std::path::PathBuf;
use std::process;

use clap::Parser;
use env_logger::WriteStyle;
use log::{error, LevelFilter};

use sipbag::xsd::validate_file;

/// Validates an XML document against an XML Schema
///
/// Prints whether the document is valid. Violations are logged as warnings. The exit code is 0
/// whenever a verdict was reached, and 1 when either file cannot be read or the schema cannot
/// be compiled.
#[derive(Debug, Parser)]
#[clap(name = "validate-xsd")]
pub struct ValidateArgs {
    /// Path to the XML document to validate
    #[clap(value_name = "DOCUMENT")]
    pub document: PathBuf,

    /// Path to the XML Schema to validate against
    #[clap(value_name = "SCHEMA")]
    pub schema: PathBuf,

    /// Suppress error messages and violations
    #[clap(short, long)]
    pub quiet: bool,

    /// Increase log level
    #[clap(short = 'V', long)]
    pub verbose: bool,

    /// Disable all output styling
    #[clap(short = 'S', long)]
    pub no_styles: bool,
}

fn main() {
    let mut args = ValidateArgs::parse();

    // If the output is being piped then we should disable styling
    if atty::isnt(atty::Stream::Stdout) {
        args.no_styles = true;
    }

    init_logging(&args);

    let name = args
        .document
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_else(|| args.document.to_string_lossy());

    match validate_file(&args.document, &args.schema) {
        Ok(report) => println!(
            "Is {} valid:  {}",
            name,
            if report.is_valid() { "True" } else { "False" }
        ),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}

fn init_logging(args: &ValidateArgs) {
    let log_level = if args.quiet {
        LevelFilter::Off
    } else if args.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };

    env_logger::builder()
        .filter_level(log_level)
        .write_style(if args.no_styles {
            WriteStyle::Never
        } else {
            WriteStyle::Auto
        })
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();
}
