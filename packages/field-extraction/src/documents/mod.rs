//! Document source implementations.

pub mod text;

pub use text::TextFileSource;
