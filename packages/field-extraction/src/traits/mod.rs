//! Core trait abstractions for the extraction library.
//!
//! These traits define the interfaces that applications implement
//! to provide storage, model, and document capabilities.

pub mod document;
pub mod model;
pub mod store;
