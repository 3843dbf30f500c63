//! Manifest payload handling
//!
//! The manifest is opaque to the versioning core except for the structural
//! checks performed before a version number is claimed.

pub mod validation;

pub use validation::{validate_manifest, ValidationErrors, Violation};
