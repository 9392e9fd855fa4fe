//! Utility functions and helpers.

pub mod id_generator;
pub mod pattern;

pub use id_generator::IdGenerator;
pub use pattern::SearchPattern;
