//! UUID utilities
//!
//! Entity ids are UUIDv7 so that lexical order of the stored text matches
//! creation order.

use uuid::Uuid;

/// Generate a new time-sortable identifier (UUIDv7)
pub fn generate() -> Uuid {
    Uuid::now_v7()
}

/// Generate a random correlation identifier (UUIDv4)
pub fn generate_random() -> Uuid {
    Uuid::new_v4()
}

/// Parse UUID from string
pub fn parse(s: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(s)
}
