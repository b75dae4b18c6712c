//! Common identifier types.
//!
//! All entity IDs are UUIDs wrapped in type aliases for better type safety:
//!
//! - [`OrderId`]: Order identifier
//! - [`OrderItemId`]: Order item identifier
//! - [`IssuerId`]: Credential issuer identifier
//! - [`RequestId`]: Client-chosen id grouping one credential batch

use uuid::Uuid;

// Type aliases for IDs
pub type OrderId = Uuid;
pub type OrderItemId = Uuid;
pub type IssuerId = Uuid;
pub type RequestId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbrev_uuid_takes_first_eight() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }
}
