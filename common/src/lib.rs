//! Shared building blocks for the dashboard services.
//!
//! Everything that crosses a crate boundary lives here: the normalized row
//! model, query specifications, widget results, saved-search documents, the
//! error taxonomy, configuration loading and the HTTP response envelope.

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
