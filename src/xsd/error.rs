use std::path::PathBuf;

use snafu::prelude::*;

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Error reading file {}: {}", path.display(), source))]
    IoRead {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Schema {} is not well-formed XML: {}", path.display(), source))]
    ParseSchema {
        source: roxmltree::Error,
        path: PathBuf,
    },
    #[snafu(display("Document is not well-formed XML: {}", source))]
    ParseDocument { source: roxmltree::Error },
    #[snafu(display("{} is not an XML Schema: root element is {}", path.display(), root))]
    NotASchema { path: PathBuf, root: String },
    #[snafu(display("Invalid schema {} line {}: {}", path.display(), line, message))]
    InvalidSchema {
        path: PathBuf,
        line: u32,
        message: String,
    },
    #[snafu(display("Unsupported schema construct xs:{} in {} line {}", name, path.display(), line))]
    UnsupportedConstruct {
        path: PathBuf,
        line: u32,
        name: String,
    },
    #[snafu(display("Schema {} includes a schema with target namespace {}", path.display(), namespace))]
    IncludeNamespaceMismatch { path: PathBuf, namespace: String },
    #[snafu(display("Schema refers to undefined {} {}", kind, name))]
    UndefinedReference { kind: String, name: String },
    #[snafu(display("Schema defines {} {} more than once", kind, name))]
    DuplicateDefinition { kind: String, name: String },
    #[snafu(display("Definition of {} {} refers to itself", kind, name))]
    CircularDefinition { kind: String, name: String },
}
