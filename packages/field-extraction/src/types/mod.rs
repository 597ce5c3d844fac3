//! Data types for the field extraction library.

pub mod config;
pub mod decision;
pub mod document;
pub mod request;
pub mod result;
