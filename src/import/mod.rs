//! Spreadsheet import pipeline.
//!
//! Uploaded files arrive already parsed into [`RawRow`](crate::models::RawRow)s.
//! The pipeline maps their headers onto canonical fields, validates the
//! mapped rows and, once the caller confirms, writes them through the batch
//! reconciler.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use workforce_sync::config::ConfigLoader;
//! use workforce_sync::import::Importer;
//! use workforce_sync::models::{FileKind, ImportRequest, RawRow};
//! use workforce_sync::reconcile::BatchReconciler;
//! use workforce_sync::store::MemoryStore;
//!
//! let config = ConfigLoader::load("./config/default").unwrap();
//! let importer = Importer::new(
//!     config.import().clone(),
//!     Arc::new(MemoryStore::new()),
//!     BatchReconciler::new(config.sync().chunk_size),
//! );
//!
//! let rows = vec![RawRow::new().with("Código", "MAD01").with("Nombre", "Madrid")];
//! let preview = importer.preview(FileKind::Restaurant, &[], &rows, None).unwrap();
//! let outcome = importer.commit(&preview, ImportRequest::default()).unwrap();
//! println!("Inserted {} centres", outcome.report.inserted);
//! ```

mod column_mapping;
mod pipeline;
mod profiles;
mod rows;
mod validation;

pub use column_mapping::{AliasDictionary, apply_mapping, normalize_header, resolve_columns};
pub use pipeline::{ImportOutcome, ImportPreview, Importer, headers_of};
pub use profiles::MappingProfileStore;
pub use validation::{
    DATE_FORMATS, NULL_SENTINELS, ValidationReport, Violation, ViolationKind, ViolationLevel,
    normalize_cell, parse_date, parse_decimal, validate_rows,
};
