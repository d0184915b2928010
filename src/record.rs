// Storable record abstraction shared by the store and its JSONL log

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Anything the store can persist
pub trait Record: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync + 'static {
    /// Unique identifier for this record
    fn id(&self) -> &str;

    /// Last write time in milliseconds since epoch; newest wins on replay
    fn updated_at(&self) -> i64;

    /// Collection name, which is also the JSONL file stem: {collection}.jsonl
    fn collection_name() -> &'static str
    where
        Self: Sized;

    /// Fields mirrored into the SQLite index table for `Filter` queries
    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        HashMap::new()
    }
}

/// Value types that can be indexed for filtering
#[derive(Debug, Clone, PartialEq)]
pub enum IndexValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl IndexValue {
    /// Name of the `record_indexes` column holding this kind of value
    pub(crate) fn column(&self) -> &'static str {
        match self {
            IndexValue::String(_) => "field_value_str",
            IndexValue::Int(_) => "field_value_int",
            IndexValue::Bool(_) => "field_value_bool",
        }
    }
}

impl From<&str> for IndexValue {
    fn from(s: &str) -> Self {
        IndexValue::String(s.to_string())
    }
}

impl std::fmt::Display for IndexValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexValue::String(s) => write!(f, "{}", s),
            IndexValue::Int(i) => write!(f, "{}", i),
            IndexValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Note {
        id: String,
        body: String,
        updated_at: i64,
    }

    impl Record for Note {
        fn id(&self) -> &str {
            &self.id
        }

        fn updated_at(&self) -> i64 {
            self.updated_at
        }

        fn collection_name() -> &'static str {
            "notes"
        }
    }

    #[test]
    fn test_record_default_has_no_indexes() {
        let note = Note {
            id: "note-1".to_string(),
            body: "Comprar pan".to_string(),
            updated_at: 1000,
        };

        assert_eq!(note.id(), "note-1");
        assert_eq!(note.updated_at(), 1000);
        assert_eq!(Note::collection_name(), "notes");
        assert!(note.indexed_fields().is_empty());
    }

    #[test]
    fn test_index_value_column() {
        assert_eq!(IndexValue::from("papa").column(), "field_value_str");
        assert_eq!(IndexValue::Int(3).column(), "field_value_int");
        assert_eq!(IndexValue::Bool(true).column(), "field_value_bool");
    }

    #[test]
    fn test_index_value_display() {
        assert_eq!(IndexValue::String("2024-06-15".to_string()).to_string(), "2024-06-15");
        assert_eq!(IndexValue::Int(42).to_string(), "42");
        assert_eq!(IndexValue::Bool(true).to_string(), "true");
    }
}
