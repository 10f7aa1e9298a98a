//! Output files.
pub mod bin;
pub mod json;
