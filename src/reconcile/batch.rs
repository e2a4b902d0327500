//! Chunked, partially-failable upserts.
//!
//! The [`BatchReconciler`] writes typed rows into any [`UpsertTarget`] in
//! fixed-size chunks. Every row ends in exactly one of four outcomes and a
//! failing row never aborts the batch, so
//! `inserted + updated + skipped + errored == total_rows` holds for every
//! report.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::WriteStrategy;
use crate::store::StoreError;

use super::rows::Keyed;

/// Rows per chunk when no chunk size is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 50;

/// A table the reconciler can write rows of type `R` into.
pub trait UpsertTarget<R> {
    /// Returns true if a row with the same natural key already exists.
    fn exists(&self, row: &R) -> bool;

    /// Creates the row; fails if it already exists.
    fn insert(&self, row: &R) -> Result<(), StoreError>;

    /// Replaces the existing row with the same natural key.
    fn update(&self, row: &R) -> Result<(), StoreError>;
}

/// What happened to a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOutcome {
    /// A new row was created.
    Inserted,
    /// An existing row was replaced.
    Updated,
    /// An existing row was left untouched.
    Skipped,
    /// The write failed.
    Errored,
}

/// A failed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// Zero-based position of the row in the caller's input.
    pub row_index: usize,
    /// Natural key of the row.
    pub key: String,
    /// Why the write failed.
    pub message: String,
}

/// Counters and errors of one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Rows attempted.
    pub total_rows: u64,
    /// Rows created.
    pub inserted: u64,
    /// Rows replaced.
    pub updated: u64,
    /// Rows left untouched.
    pub skipped: u64,
    /// Rows that failed.
    pub errored: u64,
    /// Chunks processed.
    pub chunks: usize,
    /// Failed rows in input order.
    pub errors: Vec<RowError>,
}

impl ReconcileReport {
    fn record(&mut self, outcome: RowOutcome) {
        self.total_rows += 1;
        match outcome {
            RowOutcome::Inserted => self.inserted += 1,
            RowOutcome::Updated => self.updated += 1,
            RowOutcome::Skipped => self.skipped += 1,
            RowOutcome::Errored => self.errored += 1,
        }
    }

    /// Records a row that failed before it reached the target, e.g. because
    /// it could not be converted into a typed row.
    pub fn record_error(
        &mut self,
        row_index: usize,
        key: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.record(RowOutcome::Errored);
        self.errors.push(RowError {
            row_index,
            key: key.into(),
            message: message.into(),
        });
    }

    /// Rewrites row indexes through `positions`, where `positions[i]` is the
    /// caller-facing index of reconciled row `i`.
    pub fn remap_rows(&mut self, positions: &[usize]) {
        for error in &mut self.errors {
            if let Some(&original) = positions.get(error.row_index) {
                error.row_index = original;
            }
        }
    }

    /// Folds another report into this one. Errors stay sorted by row index.
    pub fn merge(&mut self, other: ReconcileReport) {
        self.total_rows += other.total_rows;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.errored += other.errored;
        self.chunks += other.chunks;
        self.errors.extend(other.errors);
        self.errors.sort_by_key(|error| error.row_index);
    }

    /// Rows written or deliberately left untouched.
    pub fn succeeded(&self) -> u64 {
        self.inserted + self.updated + self.skipped
    }

    /// Returns true if the counters add up to the attempted total.
    pub fn is_consistent(&self) -> bool {
        self.succeeded() + self.errored == self.total_rows
            && self.errors.len() as u64 == self.errored
    }
}

/// Writes typed rows in sequential chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReconciler {
    chunk_size: usize,
}

impl Default for BatchReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl BatchReconciler {
    /// Creates a reconciler. A zero chunk size is raised to one.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Returns the chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Writes `rows` into `target` with the given strategy.
    ///
    /// Chunks run in order, so row indexes in the report match the input.
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use std::sync::Mutex;
    /// use workforce_sync::models::WriteStrategy;
    /// use workforce_sync::reconcile::{BatchReconciler, Keyed, UpsertTarget};
    /// use workforce_sync::store::StoreError;
    ///
    /// struct Code(&'static str);
    ///
    /// impl Keyed for Code {
    ///     fn natural_key(&self) -> String {
    ///         self.0.to_string()
    ///     }
    /// }
    ///
    /// #[derive(Default)]
    /// struct Table(Mutex<HashMap<String, ()>>);
    ///
    /// impl UpsertTarget<Code> for Table {
    ///     fn exists(&self, row: &Code) -> bool {
    ///         self.0.lock().unwrap().contains_key(row.0)
    ///     }
    ///     fn insert(&self, row: &Code) -> Result<(), StoreError> {
    ///         self.0.lock().unwrap().insert(row.0.to_string(), ());
    ///         Ok(())
    ///     }
    ///     fn update(&self, _row: &Code) -> Result<(), StoreError> {
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let table = Table::default();
    /// let reconciler = BatchReconciler::new(2);
    /// let rows = [Code("a"), Code("b"), Code("a")];
    ///
    /// let report = reconciler.reconcile(&table, &rows, WriteStrategy::Upsert);
    /// assert_eq!(report.inserted, 2);
    /// assert_eq!(report.updated, 1);
    /// assert_eq!(report.chunks, 2);
    /// ```
    pub fn reconcile<R, T>(&self, target: &T, rows: &[R], strategy: WriteStrategy) -> ReconcileReport
    where
        R: Keyed,
        T: UpsertTarget<R> + ?Sized,
    {
        let mut report = ReconcileReport::default();

        for (chunk_index, chunk) in rows.chunks(self.chunk_size).enumerate() {
            let offset = chunk_index * self.chunk_size;
            let errors_before = report.errored;

            for (position, row) in chunk.iter().enumerate() {
                match Self::write_row(target, row, strategy) {
                    Ok(outcome) => report.record(outcome),
                    Err(error) => {
                        let key = row.natural_key();
                        warn!(
                            row_index = offset + position,
                            key = %key,
                            error = %error,
                            "Row write failed"
                        );
                        report.record_error(offset + position, key, error.to_string());
                    }
                }
            }

            report.chunks += 1;
            debug!(
                chunk = chunk_index,
                rows = chunk.len(),
                errors = report.errored - errors_before,
                "Chunk reconciled"
            );
        }

        info!(
            strategy = %strategy,
            total = report.total_rows,
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            errored = report.errored,
            "Batch reconciled"
        );

        report
    }

    fn write_row<R, T>(target: &T, row: &R, strategy: WriteStrategy) -> Result<RowOutcome, StoreError>
    where
        T: UpsertTarget<R> + ?Sized,
    {
        match strategy {
            WriteStrategy::Insert => target.insert(row).map(|()| RowOutcome::Inserted),
            WriteStrategy::Upsert if target.exists(row) => {
                target.update(row).map(|()| RowOutcome::Updated)
            }
            WriteStrategy::Skip if target.exists(row) => Ok(RowOutcome::Skipped),
            WriteStrategy::Upsert | WriteStrategy::Skip => {
                target.insert(row).map(|()| RowOutcome::Inserted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct TestRow {
        key: String,
        value: u32,
    }

    impl Keyed for TestRow {
        fn natural_key(&self) -> String {
            self.key.clone()
        }
    }

    /// Rejects rows whose key starts with "bad".
    #[derive(Default)]
    struct TestTable {
        rows: Mutex<BTreeMap<String, u32>>,
    }

    impl TestTable {
        fn snapshot(&self) -> BTreeMap<String, u32> {
            self.rows.lock().unwrap().clone()
        }

        fn check(row: &TestRow) -> Result<(), StoreError> {
            if row.key.starts_with("bad") {
                return Err(StoreError::Invalid {
                    message: format!("rejected {}", row.key),
                });
            }
            Ok(())
        }
    }

    impl UpsertTarget<TestRow> for TestTable {
        fn exists(&self, row: &TestRow) -> bool {
            self.rows.lock().unwrap().contains_key(&row.key)
        }

        fn insert(&self, row: &TestRow) -> Result<(), StoreError> {
            Self::check(row)?;
            let mut rows = self.rows.lock().unwrap();
            if rows.contains_key(&row.key) {
                return Err(StoreError::DuplicateKey {
                    key: row.key.clone(),
                });
            }
            rows.insert(row.key.clone(), row.value);
            Ok(())
        }

        fn update(&self, row: &TestRow) -> Result<(), StoreError> {
            Self::check(row)?;
            self.rows.lock().unwrap().insert(row.key.clone(), row.value);
            Ok(())
        }
    }

    fn row(key: &str, value: u32) -> TestRow {
        TestRow {
            key: key.to_string(),
            value,
        }
    }

    #[test]
    fn test_upsert_inserts_then_updates() {
        let table = TestTable::default();
        let reconciler = BatchReconciler::default();

        let first = reconciler.reconcile(&table, &[row("a", 1), row("b", 2)], WriteStrategy::Upsert);
        assert_eq!(first.inserted, 2);

        let second = reconciler.reconcile(&table, &[row("a", 10)], WriteStrategy::Upsert);
        assert_eq!(second.updated, 1);
        assert_eq!(table.snapshot()["a"], 10);
    }

    #[test]
    fn test_insert_strategy_reports_duplicates() {
        let table = TestTable::default();
        let reconciler = BatchReconciler::default();
        reconciler.reconcile(&table, &[row("a", 1)], WriteStrategy::Insert);

        let report = reconciler.reconcile(&table, &[row("a", 2), row("c", 3)], WriteStrategy::Insert);

        assert_eq!(report.inserted, 1);
        assert_eq!(report.errored, 1);
        assert_eq!(report.errors[0].row_index, 0);
        assert_eq!(report.errors[0].key, "a");
        assert_eq!(table.snapshot()["a"], 1);
    }

    #[test]
    fn test_skip_strategy_leaves_existing_rows() {
        let table = TestTable::default();
        let reconciler = BatchReconciler::default();
        reconciler.reconcile(&table, &[row("a", 1)], WriteStrategy::Upsert);

        let report = reconciler.reconcile(&table, &[row("a", 5), row("b", 6)], WriteStrategy::Skip);

        assert_eq!(report.skipped, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(table.snapshot()["a"], 1);
    }

    #[test]
    fn test_failing_row_does_not_abort_batch() {
        let table = TestTable::default();
        let reconciler = BatchReconciler::new(2);
        let rows = vec![row("a", 1), row("bad-1", 2), row("c", 3), row("bad-2", 4), row("e", 5)];

        let report = reconciler.reconcile(&table, &rows, WriteStrategy::Upsert);

        assert_eq!(report.chunks, 3);
        assert_eq!(report.inserted, 3);
        assert_eq!(report.errored, 2);
        let indexes: Vec<usize> = report.errors.iter().map(|e| e.row_index).collect();
        assert_eq!(indexes, vec![1, 3]);
        assert!(report.is_consistent());
    }

    #[test]
    fn test_zero_chunk_size_is_raised() {
        assert_eq!(BatchReconciler::new(0).chunk_size(), 1);
    }

    #[test]
    fn test_remap_rows_and_merge() {
        let mut report = ReconcileReport::default();
        report.record_error(0, "x", "bad");
        report.remap_rows(&[4]);
        assert_eq!(report.errors[0].row_index, 4);

        let mut conversions = ReconcileReport::default();
        conversions.record_error(1, "y", "unparseable");
        report.merge(conversions);

        assert_eq!(report.total_rows, 2);
        assert_eq!(report.errors[0].row_index, 1);
        assert!(report.is_consistent());
    }

    fn arb_rows() -> impl Strategy<Value = Vec<TestRow>> {
        prop::collection::vec(
            (
                prop::sample::select(vec!["a", "b", "c", "bad-x", "d", "e"]),
                0u32..100,
            ),
            0..40,
        )
        .prop_map(|pairs| pairs.into_iter().map(|(key, value)| row(key, value)).collect())
    }

    fn arb_strategy() -> impl Strategy<Value = WriteStrategy> {
        prop::sample::select(vec![
            WriteStrategy::Insert,
            WriteStrategy::Upsert,
            WriteStrategy::Skip,
        ])
    }

    proptest! {
        #[test]
        fn prop_counters_sum_to_total(
            rows in arb_rows(),
            strategy in arb_strategy(),
            chunk_size in 1usize..8,
        ) {
            let table = TestTable::default();
            let report = BatchReconciler::new(chunk_size).reconcile(&table, &rows, strategy);

            prop_assert_eq!(report.total_rows, rows.len() as u64);
            prop_assert!(report.is_consistent());
        }

        #[test]
        fn prop_upsert_is_idempotent(rows in arb_rows(), chunk_size in 1usize..8) {
            let table = TestTable::default();
            let reconciler = BatchReconciler::new(chunk_size);

            reconciler.reconcile(&table, &rows, WriteStrategy::Upsert);
            let after_first = table.snapshot();
            let second = reconciler.reconcile(&table, &rows, WriteStrategy::Upsert);

            prop_assert_eq!(second.inserted, 0);
            prop_assert_eq!(table.snapshot(), after_first);
        }
    }
}
