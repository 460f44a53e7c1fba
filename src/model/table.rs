//! Replicated table configuration.

use serde::{Deserialize, Serialize};

/// A table taking part in replication.
///
/// Static configuration: owned by [`crate::config::SyncConfig`] and never
/// mutated while the engine runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name, identical in both stores.
    pub name: String,

    /// Primary-key column used to match rows across stores.
    #[serde(default = "default_primary_key", alias = "primaryKey")]
    pub primary_key: String,
}

fn default_primary_key() -> String {
    "id".to_string()
}

impl TableDescriptor {
    /// Create a descriptor.
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
        }
    }
}

/// Registry entry: the authoritative DDL for a replicated table.
///
/// Used to create the table in a store that lacks it, instead of inferring
/// a schema from a sample row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Schema version, starting at 1. Recorded when the table is created.
    pub version: u32,

    /// A single `CREATE TABLE` statement for the table.
    pub ddl: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_primary_key_defaults_to_id() {
        let desc: TableDescriptor = serde_json::from_str(r#"{"name":"customers"}"#).unwrap();
        assert_eq!(desc, TableDescriptor::new("customers", "id"));
    }

    #[test]
    fn test_descriptor_accepts_camel_case_key() {
        let desc: TableDescriptor =
            serde_json::from_str(r#"{"name":"quotes","primaryKey":"quote_no"}"#).unwrap();
        assert_eq!(desc.primary_key, "quote_no");
    }
}
