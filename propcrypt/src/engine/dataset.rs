//! In-memory tabular data the engine transforms.

use std::collections::HashSet;

use crate::error::{ConfigurationError, Error};

/// A named column of string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    values: Vec<String>,
}

impl Column {
    /// Creates a column.
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { name: name.into(), values: values.into_iter().map(Into::into).collect() }
    }

    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cells in row order.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the column has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Ordered columns of equal length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    columns: Vec<Column>,
}

impl Dataset {
    /// Creates a dataset.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if two columns share a name and
    /// `Error::InvalidParameter` if the columns differ in length.
    pub fn new(columns: Vec<Column>) -> Result<Self, Error> {
        let mut seen = HashSet::new();
        let duplicates: Vec<String> = columns
            .iter()
            .filter(|c| !seen.insert(c.name()))
            .map(|c| c.name().to_string())
            .collect();
        if !duplicates.is_empty() {
            return Err(ConfigurationError::DuplicateColumns(duplicates).into());
        }

        if let Some(first) = columns.first() {
            if let Some(ragged) = columns.iter().find(|c| c.len() != first.len()) {
                return Err(Error::InvalidParameter(format!(
                    "column `{}` has {} rows, `{}` has {}",
                    ragged.name(),
                    ragged.len(),
                    first.name(),
                    first.len()
                )));
            }
        }

        Ok(Self { columns })
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// All columns in order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(Column::name)
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    /// Replaces the cells of the column with the same name.
    pub(crate) fn replace_column(&mut self, column: Column) {
        if let Some(slot) = self.columns.iter_mut().find(|c| c.name == column.name) {
            *slot = column;
        }
    }
}
