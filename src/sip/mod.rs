//! Repackaging of Submission Information Packages (SIPs) as BagIt bags.
//!
//! A SIP is a directory with `content` and `header` subdirectories, where
//! `header/metadata.xml` declares the MD5 checksum of every file in the package. Repackaging
//! happens in three phases, and a failure reports the phase it happened in:
//!
//! 1. the bag structure is created and the payload copied
//! 2. the payload manifest is written from the declared checksums
//! 3. the bag is validated and finalized

pub use crate::sip::error::*;
pub use crate::sip::metadata::{
    parse_inventory, read_inventory, Inventory, InventoryEntry, ARELDA_NS,
};
pub use crate::sip::repackage::{
    default_bag_dir, repackage_sip, repackage_sip_with, RepackageOptions,
};

mod error;
mod metadata;
mod repackage;
