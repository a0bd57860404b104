pub mod bagit;
pub mod sip;
pub mod xsd;
