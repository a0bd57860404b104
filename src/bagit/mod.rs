pub use crate::bagit::bag::{
    open_bag, validate_bag, write_payload_manifest, Bag, BagItVersion, BagUpdater,
};
pub use crate::bagit::digest::{digest_file, DigestAlgorithm, HexDigest};
pub use crate::bagit::error::*;
pub use crate::bagit::manifest::ManifestEntry;
pub use crate::bagit::tag::{
    read_bag_declaration_file, write_bag_declaration, BagDeclaration, BagInfo,
};
pub use crate::bagit::validate::{
    IssueLevel, ValidationIssue, ValidationResult, ValidationVerdict,
};

pub mod consts;

mod bag;
mod digest;
mod encoding;
mod error;
mod io;
mod manifest;
mod tag;
mod validate;
