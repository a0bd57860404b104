pub use crate::xsd::compile::Schema;
pub use crate::xsd::error::*;
pub use crate::xsd::validate::{validate_file, ValidationReport, Violation};

mod builtin;
mod compile;
mod error;
mod model;
mod validate;
