use std::path::PathBuf;

use snafu::prelude::*;

use crate::bagit;

pub type Result<T, E = RepackageError> = core::result::Result<T, E>;

/// Failure to read the file inventory out of a package's metadata.xml
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetadataError {
    #[snafu(display("Error reading metadata file {}: {}", path.display(), source))]
    ReadMetadata {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Metadata is not well-formed XML: {}", source))]
    ParseMetadata { source: roxmltree::Error },
    #[snafu(display("Metadata does not contain an inhaltsverzeichnis element"))]
    MissingInventory,
    #[snafu(display("Metadata does not declare any file checksums"))]
    EmptyInventory,
    #[snafu(display("Metadata entry on line {} is missing its {} element", line, element))]
    MissingElement { line: u32, element: String },
    #[snafu(display("Metadata entry on line {} has an invalid name '{}'", line, name))]
    InvalidName { line: u32, name: String },
    #[snafu(display("File {} declares an invalid MD5 checksum '{}'", path, checksum))]
    InvalidChecksum { path: String, checksum: String },
    #[snafu(display("File {} declares unsupported checksum algorithm '{}'", path, algorithm))]
    UnsupportedAlgorithm { path: String, algorithm: String },
    #[snafu(display("File {} is declared more than once", path))]
    DuplicatePath { path: String },
}

/// Failure while creating the bag's directory structure and copying the payload
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StructureError {
    #[snafu(display("Source package {} does not contain a {} directory", path.display(), name))]
    MissingSourceDir { path: PathBuf, name: String },
    #[snafu(display("Destination {} already exists", path.display()))]
    DestinationExists { path: PathBuf },
    #[snafu(display("Error creating directory {}: {}", path.display(), source))]
    CreateDir {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Error copying {} to {}: {}", from.display(), to.display(), source))]
    CopyFile {
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },
    #[snafu(display("Error walking {}: {}", path.display(), source))]
    WalkSource {
        source: walkdir::Error,
        path: PathBuf,
    },
    #[snafu(display("Unsupported file type at {}", path.display()))]
    UnsupportedSourceFile { path: PathBuf },
    #[snafu(display("Invalid bagit.txt template {}: {}", path.display(), source))]
    InvalidTemplate {
        source: bagit::Error,
        path: PathBuf,
    },
    #[snafu(display("Error writing bag declaration: {}", source))]
    WriteDeclaration { source: bagit::Error },
}

/// Failure while writing the payload manifest from the package metadata
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ManifestError {
    #[snafu(display("{}", source))]
    Metadata { source: MetadataError },
    #[snafu(display("Error calculating checksum of {}: {}", path.display(), source))]
    DigestMetadata {
        source: bagit::Error,
        path: PathBuf,
    },
    #[snafu(display("Error writing manifest: {}", source))]
    WriteManifest { source: bagit::Error },
}

/// Failure while validating and finalizing the bag
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum FinalizeError {
    #[snafu(display("Error opening bag {}: {}", path.display(), source))]
    OpenBag {
        source: bagit::Error,
        path: PathBuf,
    },
    #[snafu(display("Error validating bag {}: {}", path.display(), source))]
    ValidateBag {
        source: bagit::Error,
        path: PathBuf,
    },
    #[snafu(display("Bag {} is not valid: {}", path.display(), issues.join("; ")))]
    InvalidBag { path: PathBuf, issues: Vec<String> },
    #[snafu(display("Error saving bag {}: {}", path.display(), source))]
    SaveBag {
        source: bagit::Error,
        path: PathBuf,
    },
}

/// The phase a repackaging failed in, with the underlying cause
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RepackageError {
    #[snafu(display("Could not make bag structure: {}", source))]
    Structure { source: StructureError },
    #[snafu(display("Checksum File could not be created: {}", source))]
    Manifest { source: ManifestError },
    #[snafu(display("Something went wrong when repackaging the Bag: {}", source))]
    Finalize { source: FinalizeError },
}
