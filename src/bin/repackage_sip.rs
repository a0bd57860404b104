use std::path::{Path, PathBuf};
use std::process;

use chrono::NaiveDate;
use clap::Parser;
use env_logger::WriteStyle;
use log::{error, info, LevelFilter};

use sipbag::bagit::consts::BAGIT_TXT;
use sipbag::sip::{repackage_sip_with, RepackageOptions};

/// Repackages a SIP directory as a BagIt bag
///
/// The SIP must contain `content` and `header` directories, and `header/metadata.xml` must
/// declare the MD5 checksum of every file in the package. The bag is only finalized when the
/// declared checksums match the copied files. The path of the new bag is printed on success.
#[derive(Debug, Parser)]
#[clap(name = "repackage-sip")]
pub struct RepackageArgs {
    /// Absolute or relative path to the SIP's base directory
    #[clap(value_name = "SIP_DIR")]
    pub sip_dir: PathBuf,

    /// Directory to create the bag in, which must not exist
    ///
    /// By default, this is a sibling of the SIP named `<SIP_DIR>_bag`.
    #[clap(short, long, value_name = "BAG_DIR")]
    pub output: Option<PathBuf>,

    /// bagit.txt file to copy into the bag
    ///
    /// By default, `bagit.txt` in the current directory is used if it exists. Otherwise, a
    /// BagIt 1.0 declaration is written.
    #[clap(short = 't', long, value_name = "PATH")]
    pub bagit_template: Option<PathBuf>,

    /// Bagging-Date to write to bag-info.txt, formatted as YYYY-MM-DD
    ///
    /// By default, this is the current date.
    #[clap(long, value_name = "DATE")]
    pub bagging_date: Option<NaiveDate>,

    /// Bag-Software-Agent to write to bag-info.txt
    #[clap(long, value_name = "AGENT")]
    pub software_agent: Option<String>,

    /// Suppress error messages and other logging
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
    let mut args = RepackageArgs::parse();

    // If the output is being piped then we should disable styling
    if atty::isnt(atty::Stream::Stdout) {
        args.no_styles = true;
    }

    init_logging(&args);

    let mut options = RepackageOptions::new()
        .with_bagging_date(args.bagging_date)
        .with_software_agent(args.software_agent.clone());

    if let Some(output) = &args.output {
        options = options.with_destination(output);
    }
    if let Some(template) = resolve_template(args.bagit_template.as_deref()) {
        options = options.with_bagit_template(template);
    }

    match repackage_sip_with(&args.sip_dir, &options) {
        Ok(bag_dir) => println!("{}", bag_dir.display()),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}

/// An explicit template, or `./bagit.txt` when there is one
fn resolve_template(template: Option<&Path>) -> Option<PathBuf> {
    match template {
        Some(template) => Some(template.to_path_buf()),
        None => {
            let default = PathBuf::from(BAGIT_TXT);
            if default.is_file() {
                info!("Using {} in the current directory as template", BAGIT_TXT);
                Some(default)
            } else {
                None
            }
        }
    }
}

fn init_logging(args: &RepackageArgs) {
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
