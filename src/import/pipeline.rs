//! The validate → confirm → write import protocol.
//!
//! [`Importer::preview`] resolves the column mapping and validates the rows
//! without writing anything. The caller inspects the preview and confirms
//! with [`Importer::commit`], passing an [`ImportRequest`] that carries the
//! write strategy and the force flag.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{FileKindRules, ImportConfig};
use crate::error::{EngineError, EngineResult};
use crate::models::{FileKind, ImportMapping, ImportRequest, MappedRow, RawRow, WriteStrategy};
use crate::reconcile::{BatchReconciler, CentreRow, Keyed, PayrollRow, ReconcileReport, UpsertTarget};
use crate::store::{MemoryStore, StoreError};

use super::column_mapping::{AliasDictionary, apply_mapping, resolve_columns};
use super::validation::{ValidationReport, validate_rows};

/// The result of the validation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportPreview {
    /// Declared file kind.
    pub file_kind: FileKind,
    /// Column mapping used.
    pub mapping: ImportMapping,
    /// Headers that map to no canonical field.
    pub unmapped_columns: Vec<String>,
    /// Normalized rows and their violations.
    pub validation: ValidationReport,
}

impl ImportPreview {
    /// Returns true if `request` would pass the import policy.
    pub fn can_commit(&self, request: &ImportRequest) -> bool {
        self.validation.critical_count() == 0
            && (self.validation.non_critical_count() == 0 || request.force_non_critical)
    }
}

/// The result of the write step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    /// Imported file kind.
    pub file_kind: FileKind,
    /// Strategy used.
    pub strategy: WriteStrategy,
    /// Fields written as null because of forced non-critical violations.
    pub nulled_fields: usize,
    /// Reconciler counters; conversion failures count as errored rows.
    pub report: ReconcileReport,
}

/// Returns the distinct column names of `rows` in first-seen order.
pub fn headers_of(rows: &[RawRow]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for row in rows {
        for (column, _) in row.cells() {
            if !headers.iter().any(|known| known == column) {
                headers.push(column.to_string());
            }
        }
    }
    headers
}

/// Runs file imports against the record store.
#[derive(Debug, Clone)]
pub struct Importer {
    config: ImportConfig,
    store: Arc<MemoryStore>,
    reconciler: BatchReconciler,
}

impl Importer {
    /// Creates an importer.
    pub fn new(config: ImportConfig, store: Arc<MemoryStore>, reconciler: BatchReconciler) -> Self {
        Self {
            config,
            store,
            reconciler,
        }
    }

    fn rules(&self, file_kind: FileKind) -> &FileKindRules {
        self.config.rules_for(file_kind)
    }

    /// Suggests a mapping for the headers of a file.
    pub fn resolve(&self, file_kind: FileKind, headers: &[String]) -> ImportMapping {
        let dictionary = AliasDictionary::from_rules(&self.rules(file_kind).aliases);
        resolve_columns(headers, &dictionary)
    }

    /// Maps and validates a parsed file without writing.
    ///
    /// Uses `mapping` when given (e.g. a saved profile), otherwise resolves
    /// one from the headers. Fails if a required field has no column.
    pub fn preview(
        &self,
        file_kind: FileKind,
        headers: &[String],
        rows: &[RawRow],
        mapping: Option<ImportMapping>,
    ) -> EngineResult<ImportPreview> {
        let headers = if headers.is_empty() {
            headers_of(rows)
        } else {
            headers.to_vec()
        };
        let mapping = mapping.unwrap_or_else(|| self.resolve(file_kind, &headers));
        let rules = self.rules(file_kind);

        let missing = mapping.missing_required(&rules.required);
        if !missing.is_empty() {
            warn!(file_kind = %file_kind, missing = ?missing, "Required fields not mapped");
            return Err(EngineError::UnmappedRequiredFields {
                file_kind: file_kind.to_string(),
                fields: missing,
            });
        }

        let unmapped_columns = headers
            .iter()
            .filter(|header| mapping.field_for(header).is_none())
            .cloned()
            .collect();

        let validation = validate_rows(apply_mapping(&mapping, rows), rules);
        info!(
            file_kind = %file_kind,
            rows = rows.len(),
            critical = validation.critical_count(),
            non_critical = validation.non_critical_count(),
            "Import validated"
        );

        Ok(ImportPreview {
            file_kind,
            mapping,
            unmapped_columns,
            validation,
        })
    }

    /// Writes a validated file.
    ///
    /// Fails without writing if the preview does not pass the import policy
    /// for `request`.
    pub fn commit(&self, preview: &ImportPreview, request: ImportRequest) -> EngineResult<ImportOutcome> {
        let rows = preview.validation.rows_to_write(&request)?;
        let nulled_fields = if request.force_non_critical {
            preview.validation.non_critical_count()
        } else {
            0
        };

        let report = match preview.file_kind {
            FileKind::Restaurant => self.write::<CentreRow>(&rows, request.strategy),
            FileKind::Payroll => self.write::<PayrollRow>(&rows, request.strategy),
        };

        info!(
            file_kind = %preview.file_kind,
            strategy = %request.strategy,
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            errored = report.errored,
            nulled_fields,
            "Import committed"
        );

        Ok(ImportOutcome {
            file_kind: preview.file_kind,
            strategy: request.strategy,
            nulled_fields,
            report,
        })
    }

    fn write<R>(&self, rows: &[MappedRow], strategy: WriteStrategy) -> ReconcileReport
    where
        R: Keyed + for<'a> TryFrom<&'a MappedRow, Error = StoreError>,
        MemoryStore: UpsertTarget<R>,
    {
        let mut typed = Vec::with_capacity(rows.len());
        let mut positions = Vec::with_capacity(rows.len());
        let mut conversions = ReconcileReport::default();

        for (index, row) in rows.iter().enumerate() {
            match R::try_from(row) {
                Ok(converted) => {
                    typed.push(converted);
                    positions.push(index);
                }
                Err(error) => conversions.record_error(index, format!("row {}", index + 1), error.to_string()),
            }
        }

        let mut report = self.reconciler.reconcile(self.store.as_ref(), &typed, strategy);
        report.remap_rows(&positions);
        report.merge(conversions);
        report
    }
}
