use std::path::PathBuf;

use snafu::prelude::*;

use crate::bagit::bag::BagItVersion;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Error creating file {}: {}", path.display(), source))]
    IoCreate {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Error writing to file {}: {}", path.display(), source))]
    IoWrite {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Error reading file {}: {}", path.display(), source))]
    IoRead {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Error deleting file {}: {}", path.display(), source))]
    IoDelete {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Error reading directory {}: {}", path.display(), source))]
    IoReadDir {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Error reading metadata for {}: {}", path.display(), source))]
    IoStat {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("IO error: {}", source))]
    IoGeneral { source: std::io::Error },
    #[snafu(display("Error walking files: {}", source))]
    WalkFile { source: walkdir::Error },
    #[snafu(display("Path {} is not valid UTF-8", path.display()))]
    InvalidUtf8Path { path: PathBuf },
    #[snafu(display("Invalid UTF-8 string: {}", source))]
    InvalidString { source: std::string::FromUtf8Error },
    #[snafu(display("Invalid tag line {} in {}: {}", num, path.display(), details))]
    InvalidTagLine {
        path: PathBuf,
        num: usize,
        details: String,
    },
    #[snafu(display("Missing required tag {}", tag))]
    MissingTag { tag: String },
    #[snafu(display("Invalid BagIt version: {}", value))]
    InvalidBagItVersion { value: String },
    #[snafu(display("Unsupported BagIt version: {}", version))]
    UnsupportedVersion { version: BagItVersion },
    #[snafu(display("Unsupported tag file encoding: {}", encoding))]
    UnsupportedEncoding { encoding: String },
    #[snafu(display("Unsupported file type at {}", path.display()))]
    UnsupportedFile { path: PathBuf },
    #[snafu(display("Invalid manifest line {} in {}: {}", num, path.display(), details))]
    InvalidManifestLine {
        path: PathBuf,
        num: usize,
        details: String,
    },
}
