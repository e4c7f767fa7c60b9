//! Shared OData wire types and helpers.

use serde::Deserialize;
use uuid::Uuid;

/// Wrapper for OData collection responses: `{ "value": [ … ] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ODataList<T> {
    /// The returned records.
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

/// Response shape of the `CreateMultiple` action.
///
/// `Ids` preserves the order of the submitted `Targets`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMultipleResponse {
    /// Created record ids, in input order.
    #[serde(rename = "Ids", default)]
    pub ids: Vec<Uuid>,
}

/// Build an `@odata.bind` reference for a lookup column.
///
/// Example: `bind("contacts", id)` → `"/contacts(5f…)"`.
pub fn bind(entity_set: &str, id: Uuid) -> String {
    format!("/{entity_set}({id})")
}

/// Escape a string literal for use inside an OData `$filter`.
///
/// OData escapes embedded single quotes by doubling them.
pub fn escape_odata(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_formats_reference() {
        let id: Uuid = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
        assert_eq!(
            bind("contacts", id),
            "/contacts(550e8400-e29b-41d4-a716-446655440000)"
        );
    }

    #[test]
    fn escape_odata_doubles_quotes() {
        assert_eq!(escape_odata("O'Brien"), "O''Brien");
        assert_eq!(escape_odata("plain"), "plain");
        assert_eq!(escape_odata("a''b"), "a''''b");
    }

    #[test]
    fn odata_list_defaults_to_empty() {
        let parsed: ODataList<serde_json::Value> = serde_json::from_str("{}").unwrap();
        assert!(parsed.value.is_empty());
    }
}
