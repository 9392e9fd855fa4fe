//! Unique ID generator.

use uuid::Uuid;

/// Generates unique identifiers.
pub struct IdGenerator;

impl IdGenerator {
    /// UUID v4 for a saved search document.
    pub fn saved_search_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Request ID when the caller did not send one.
    pub fn request_id() -> String {
        Uuid::new_v4().simple().to_string()
    }
}
