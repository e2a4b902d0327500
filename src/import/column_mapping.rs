//! Column mapping resolver.
//!
//! Maps the free-form headers of an uploaded spreadsheet onto canonical
//! field keys using a per-file-kind alias dictionary. Resolution runs in two
//! passes: exact alias matches first, then a bidirectional substring match
//! for the headers that found no exact alias. Exact matches always win; a
//! field claimed in the first pass is never handed out again.

use std::collections::HashSet;

use crate::config::FieldAliases;
use crate::models::{ColumnBinding, ImportMapping, MappedRow, RawRow};

/// Lowercases, trims and joins whitespace runs with `_`.
///
/// # Examples
///
/// ```
/// use workforce_sync::import::normalize_header;
///
/// assert_eq!(normalize_header("  Código   Centro "), "código_centro");
/// assert_eq!(normalize_header("EMAIL"), "email");
/// ```
pub fn normalize_header(header: &str) -> String {
    header
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// Canonical fields and their normalized aliases in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasDictionary {
    entries: Vec<(String, Vec<String>)>,
}

impl AliasDictionary {
    /// Creates an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dictionary from configured alias lists.
    pub fn from_rules(aliases: &[FieldAliases]) -> Self {
        aliases.iter().fold(Self::new(), |dictionary, entry| {
            dictionary.with_field(&entry.field, &entry.aliases)
        })
    }

    /// Appends a field. The field key itself is always accepted as an alias.
    pub fn with_field<S: AsRef<str>>(mut self, field: &str, aliases: &[S]) -> Self {
        let mut normalized = vec![normalize_header(field)];
        for alias in aliases {
            let alias = normalize_header(alias.as_ref());
            if !alias.is_empty() && !normalized.contains(&alias) {
                normalized.push(alias);
            }
        }
        self.entries.push((field.to_string(), normalized));
        self
    }

    /// Iterates over fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(field, _)| field.as_str())
    }

    fn exact(&self, header: &str) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |(_, aliases)| aliases.iter().any(|alias| alias == header))
            .map(|(field, _)| field.as_str())
    }

    fn partial(&self, header: &str) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |(_, aliases)| {
                aliases
                    .iter()
                    .any(|alias| header.contains(alias.as_str()) || alias.contains(header))
            })
            .map(|(field, _)| field.as_str())
    }
}

/// Resolves headers to canonical fields.
///
/// Headers that match nothing are left out of the mapping. Within a pass the
/// first header claiming a field wins; ties between fields go to the one
/// declared first in the dictionary.
///
/// # Example
///
/// ```
/// use workforce_sync::import::{AliasDictionary, resolve_columns};
///
/// let dictionary = AliasDictionary::new()
///     .with_field("code", &["codigo"])
///     .with_field("name", &["nombre", "nombre_centro"]);
///
/// let mapping = resolve_columns(&["Nombre del centro", "Código"], &dictionary);
/// assert_eq!(mapping.field_for("Nombre del centro"), Some("name"));
/// assert_eq!(mapping.field_for("Código"), None);
/// ```
pub fn resolve_columns<S: AsRef<str>>(headers: &[S], dictionary: &AliasDictionary) -> ImportMapping {
    let normalized: Vec<String> = headers
        .iter()
        .map(|header| normalize_header(header.as_ref()))
        .collect();

    let mut assigned: Vec<Option<&str>> = vec![None; headers.len()];
    let mut claimed: HashSet<&str> = HashSet::new();

    for (slot, header) in assigned.iter_mut().zip(&normalized) {
        if header.is_empty() {
            continue;
        }
        if let Some(field) = dictionary.exact(header).find(|field| !claimed.contains(field)) {
            claimed.insert(field);
            *slot = Some(field);
        }
    }

    for (index, header) in normalized.iter().enumerate() {
        if header.is_empty() || assigned[index].is_some() || dictionary.exact(header).next().is_some() {
            continue;
        }
        if let Some(field) = dictionary.partial(header).find(|field| !claimed.contains(field)) {
            claimed.insert(field);
            assigned[index] = Some(field);
        }
    }

    let bindings = headers
        .iter()
        .zip(assigned)
        .filter_map(|(header, field)| {
            field.map(|field| ColumnBinding {
                column: header.as_ref().to_string(),
                field: field.to_string(),
            })
        })
        .collect();

    ImportMapping { bindings }
}

/// Projects raw rows onto the canonical fields of a mapping.
///
/// Every mapped field is present in every output row; a column missing from
/// a raw row yields null.
pub fn apply_mapping(mapping: &ImportMapping, rows: &[RawRow]) -> Vec<MappedRow> {
    rows.iter()
        .map(|row| {
            let mut mapped = MappedRow::new();
            for binding in &mapping.bindings {
                mapped.set(
                    binding.field.clone(),
                    row.get(&binding.column).map(str::to_string),
                );
            }
            mapped
        })
        .collect()
}
