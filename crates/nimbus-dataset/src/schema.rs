//! Schema validation for tables.

use crate::table::Table;
use serde_json::Value;
use tracing::warn;

/// Validates a table before load completes or save begins.
///
/// Implementations report failure via the boolean result; the dataset layer
/// turns a `false` into a typed validation error with context attached.
pub trait Schema: Send + Sync {
    /// Returns `true` when the table satisfies the schema.
    fn validate(&self, table: &Table) -> bool;

    /// Human-readable description used in validation error messages.
    fn describe(&self) -> String;
}

/// Requires a fixed set of columns, optionally with no null cells in them.
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    required: Vec<String>,
    forbid_nulls: bool,
}

impl ColumnSchema {
    /// Creates a schema requiring the given columns to exist.
    #[must_use]
    pub fn new(required: Vec<String>) -> Self {
        Self { required, forbid_nulls: false }
    }

    /// Additionally rejects null cells in the required columns.
    #[must_use]
    pub fn forbid_nulls(mut self) -> Self {
        self.forbid_nulls = true;
        self
    }
}

impl Schema for ColumnSchema {
    fn validate(&self, table: &Table) -> bool {
        for name in &self.required {
            let Some(column) = table.column(name) else {
                warn!(column = %name, "schema validation failed: column missing");
                return false;
            };
            if self.forbid_nulls && column.values().iter().any(Value::is_null) {
                warn!(column = %name, "schema validation failed: null cell");
                return false;
            }
        }
        true
    }

    fn describe(&self) -> String {
        format!("required columns {:?}", self.required)
    }
}
