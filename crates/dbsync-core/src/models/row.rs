//! Row model

use serde::{Deserialize, Serialize};

use super::SqlValue;

/// One table row: an ordered mapping from column name to value.
///
/// Column order is kept as read from the database so that rows can be written
/// back with the same column list. Equality ignores order: two rows are equal
/// when they hold the same columns with the same values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    /// Create an empty row
    #[must_use]
    pub const fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Builder-style column setter
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column, replacing any existing value in place.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        let column = column.into();
        let value = value.into();
        if let Some(slot) = self.columns.iter_mut().find(|(name, _)| *name == column) {
            slot.1 = value;
        } else {
            self.columns.push((column, value));
        }
    }

    /// Look up a column by name
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Column names in order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// `(column, value)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Split into column names and values, preserving order.
    pub fn into_parts(self) -> (Vec<String>, Vec<SqlValue>) {
        self.columns.into_iter().unzip()
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Self::new();
        for (column, value) in iter {
            row.set(column, value);
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_replaces_existing_column_in_place() {
        let mut row = Row::new().with("id", 1).with("name", "a");
        row.set("id", 2);
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "name"]);
        assert_eq!(row.get("id"), Some(&SqlValue::Integer(2)));
    }

    #[test]
    fn equality_ignores_column_order() {
        let left = Row::new().with("id", 1).with("name", "a");
        let right = Row::new().with("name", "a").with("id", 1);
        assert_eq!(left, right);
        assert_ne!(left, right.with("extra", SqlValue::Null));
    }

    #[test]
    fn into_parts_keeps_order() {
        let (columns, values) = Row::new().with("b", 2).with("a", "x").into_parts();
        assert_eq!(columns, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(values, vec![SqlValue::Integer(2), SqlValue::from("x")]);
    }
}
