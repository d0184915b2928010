// Indexed field queries against the store

use crate::record::IndexValue;

/// Equality condition on one indexed field
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Field name as returned by `Record::indexed_fields`
    pub field: String,
    pub value: IndexValue,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<IndexValue>) -> Self {
        Self {
            field: field.to_string(),
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.field, self.value)
    }
}
