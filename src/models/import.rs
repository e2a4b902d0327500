//! Import session models.
//!
//! Parsed spreadsheet rows enter the engine as [`RawRow`]s, are projected onto
//! canonical fields through an [`ImportMapping`] and become [`MappedRow`]s. A
//! mapping can be saved as a reusable [`MappingProfile`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The declared kind of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// A list of restaurants (centres) with their external site identifiers.
    Restaurant,
    /// A payroll extract with hours and cost per employee.
    Payroll,
}

impl FileKind {
    /// Returns the wire name of the file kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Restaurant => "restaurant",
            FileKind::Payroll => "payroll",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "restaurant" => Ok(FileKind::Restaurant),
            "payroll" => Ok(FileKind::Payroll),
            other => Err(format!("unknown file kind: {other}")),
        }
    }
}

/// One parsed row of an uploaded file: an ordered map of raw column name to
/// optional cell value.
///
/// Serializes as a JSON object; deserialization keeps the document order of
/// the keys and accepts numbers and booleans as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    cells: Vec<(String, Option<String>)>,
}

impl RawRow {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a cell, replacing an earlier cell with the same column name.
    pub fn push(&mut self, column: impl Into<String>, value: Option<String>) {
        let column = column.into();
        match self.cells.iter_mut().find(|(name, _)| *name == column) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column, value)),
        }
    }

    /// Builder-style variant of [`RawRow::push`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(column, Some(value.into()));
        self
    }

    /// Returns the value of a column, if present and non-null.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Iterates over the cells in column order.
    pub fn cells(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.cells
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }
}

impl Serialize for RawRow {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// A scalar cell as produced by an upstream spreadsheet parser.
#[derive(Deserialize)]
#[serde(untagged)]
enum CellValue {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl From<CellValue> for String {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Text(text) => text,
            CellValue::Number(number) => number.to_string(),
            CellValue::Flag(flag) => flag.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for RawRow {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RawRowVisitor;

        impl<'de> serde::de::Visitor<'de> for RawRowVisitor {
            type Value = RawRow;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of column name to cell value")
            }

            fn visit_map<A: serde::de::MapAccess<'de>>(
                self,
                mut access: A,
            ) -> Result<RawRow, A::Error> {
                let mut row = RawRow::new();
                while let Some((column, value)) =
                    access.next_entry::<String, Option<CellValue>>()?
                {
                    row.push(column, value.map(String::from));
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RawRowVisitor)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, Option<V>)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        let mut row = RawRow::new();
        for (column, value) in iter {
            row.push(column, value.map(Into::into));
        }
        row
    }
}

/// A row projected onto canonical field keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappedRow {
    fields: BTreeMap<String, Option<String>>,
}

impl MappedRow {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a canonical field.
    pub fn set(&mut self, field: impl Into<String>, value: Option<String>) {
        self.fields.insert(field.into(), value);
    }

    /// Builder-style variant of [`MappedRow::set`].
    pub fn with(mut self, field: impl Into<String>, value: Option<&str>) -> Self {
        self.set(field, value.map(str::to_string));
        self
    }

    /// Returns the value of a field, if present and non-null.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|value| value.as_deref())
    }

    /// Iterates over the fields in key order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    /// Applies `f` to every value in place.
    pub(crate) fn map_values(&mut self, mut f: impl FnMut(Option<String>) -> Option<String>) {
        for value in self.fields.values_mut() {
            *value = f(value.take());
        }
    }

    /// Sets a field to null if it is present.
    pub(crate) fn clear(&mut self, field: &str) {
        if let Some(value) = self.fields.get_mut(field) {
            *value = None;
        }
    }
}

/// One raw column bound to a canonical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnBinding {
    /// Raw header as it appeared in the file.
    pub column: String,
    /// Canonical field key.
    pub field: String,
}

/// The raw column to canonical field mapping of one import session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMapping {
    /// Bindings in header order.
    pub bindings: Vec<ColumnBinding>,
}

impl ImportMapping {
    /// Returns the canonical field bound to a raw column.
    pub fn field_for(&self, column: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|binding| binding.column == column)
            .map(|binding| binding.field.as_str())
    }

    /// Returns the raw column bound to a canonical field.
    pub fn column_for(&self, field: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|binding| binding.field == field)
            .map(|binding| binding.column.as_str())
    }

    /// Returns the required fields that no column is bound to.
    pub fn missing_required<S: AsRef<str>>(&self, required: &[S]) -> Vec<String> {
        required
            .iter()
            .map(AsRef::as_ref)
            .filter(|field| self.column_for(field).is_none())
            .map(str::to_string)
            .collect()
    }

    /// Returns the number of bound columns.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if no column is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// A named, reusable snapshot of an [`ImportMapping`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingProfile {
    /// Profile identifier.
    pub id: Uuid,
    /// The user who owns the profile.
    pub owner: String,
    /// The file kind the profile applies to.
    pub file_kind: FileKind,
    /// Profile name, unique per owner and file kind.
    pub name: String,
    /// The saved mapping.
    pub mapping: ImportMapping,
    /// When the profile was last saved.
    pub saved_at: DateTime<Utc>,
}

/// How the batch reconciler treats rows whose natural key already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategy {
    /// Always attempt creation; existing keys become row errors.
    Insert,
    /// Update existing rows, create missing ones.
    #[default]
    Upsert,
    /// Leave existing rows untouched, create missing ones.
    Skip,
}

impl fmt::Display for WriteStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteStrategy::Insert => "insert",
            WriteStrategy::Upsert => "upsert",
            WriteStrategy::Skip => "skip",
        };
        f.write_str(name)
    }
}

/// The confirmed write step of an import.
///
/// Imports are validated first; the caller then commits with an
/// `ImportRequest` that states the write strategy and whether non-critical
/// violations were acknowledged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    /// Write strategy for the batch reconciler.
    #[serde(default)]
    pub strategy: WriteStrategy,
    /// Import rows with non-critical violations, nulling the offending fields.
    #[serde(default)]
    pub force_non_critical: bool,
}
