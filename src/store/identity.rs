//! Identity mapping store.
//!
//! Binds internal employee IDs to the identifiers used by the external
//! scheduling and payroll systems. Each non-null external identifier can be
//! held by at most one employee; the conflict check and the write happen
//! under the same lock, so concurrent writers cannot bind one identifier
//! twice. Lookups by either identifier go through hash indexes maintained on
//! every write.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::EmployeeRecord;

/// The two external identifier namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Scheduling system employee ID.
    SchedulingId,
    /// Payroll system employee code.
    PayrollCode,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::SchedulingId => f.write_str("scheduling ID"),
            IdentifierKind::PayrollCode => f.write_str("payroll code"),
        }
    }
}

/// An external identifier is already bound to a different employee.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} '{identifier}' is already bound to employee {bound_to}")]
pub struct IdentityConflict {
    /// Which identifier namespace collided.
    pub kind: IdentifierKind,
    /// The contested identifier.
    pub identifier: String,
    /// The employee currently holding the identifier.
    pub bound_to: Uuid,
    /// The employee the caller tried to bind it to.
    pub requested_for: Uuid,
}

/// Failures of identity store writes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The identifier belongs to another employee.
    #[error(transparent)]
    Conflict(#[from] IdentityConflict),

    /// No employee has the given internal ID.
    #[error("Employee not found: {employee_id}")]
    UnknownEmployee {
        /// The missing internal ID.
        employee_id: Uuid,
    },

    /// An employee with the given internal ID already exists.
    #[error("Employee already exists: {employee_id}")]
    DuplicateEmployee {
        /// The existing internal ID.
        employee_id: Uuid,
    },
}

#[derive(Debug, Default)]
struct IdentityIndex {
    records: HashMap<Uuid, EmployeeRecord>,
    by_scheduling_id: HashMap<String, Uuid>,
    by_payroll_code: HashMap<String, Uuid>,
}

impl IdentityIndex {
    fn namespace(&self, kind: IdentifierKind) -> &HashMap<String, Uuid> {
        match kind {
            IdentifierKind::SchedulingId => &self.by_scheduling_id,
            IdentifierKind::PayrollCode => &self.by_payroll_code,
        }
    }

    fn namespace_mut(&mut self, kind: IdentifierKind) -> &mut HashMap<String, Uuid> {
        match kind {
            IdentifierKind::SchedulingId => &mut self.by_scheduling_id,
            IdentifierKind::PayrollCode => &mut self.by_payroll_code,
        }
    }

    fn check(
        &self,
        employee_id: Uuid,
        kind: IdentifierKind,
        identifier: Option<&str>,
    ) -> Result<(), IdentityConflict> {
        let Some(identifier) = identifier else {
            return Ok(());
        };
        match self.namespace(kind).get(identifier) {
            Some(&holder) if holder != employee_id => Err(IdentityConflict {
                kind,
                identifier: identifier.to_string(),
                bound_to: holder,
                requested_for: employee_id,
            }),
            _ => Ok(()),
        }
    }

    /// Moves the binding of `employee_id` in one namespace to `identifier`.
    fn rebind(&mut self, employee_id: Uuid, kind: IdentifierKind, identifier: Option<&str>) {
        let Some(identifier) = identifier else {
            return;
        };
        let previous = self.records.get_mut(&employee_id).and_then(|record| {
            let slot = match kind {
                IdentifierKind::SchedulingId => &mut record.scheduling_id,
                IdentifierKind::PayrollCode => &mut record.payroll_code,
            };
            slot.replace(identifier.to_string())
        });
        let namespace = self.namespace_mut(kind);
        if let Some(previous) = previous.filter(|previous| previous != identifier) {
            namespace.remove(&previous);
        }
        namespace.insert(identifier.to_string(), employee_id);
    }
}

/// Trims an identifier and treats blank values as absent.
fn clean(identifier: Option<&str>) -> Option<&str> {
    identifier.map(str::trim).filter(|value| !value.is_empty())
}

/// Thread-safe store of employee identities.
#[derive(Debug, Default)]
pub struct IdentityMappingStore {
    index: Mutex<IdentityIndex>,
}

impl IdentityMappingStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, IdentityIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a new employee, binding whatever external identifiers it carries.
    ///
    /// # Example
    ///
    /// ```
    /// use workforce_sync::models::EmployeeRecord;
    /// use workforce_sync::store::{IdentityError, IdentityMappingStore};
    ///
    /// let store = IdentityMappingStore::new();
    ///
    /// let mut first = EmployeeRecord::new("Marta");
    /// first.scheduling_id = Some("S-1".to_string());
    /// store.insert(first).unwrap();
    ///
    /// let mut second = EmployeeRecord::new("Marta (copy)");
    /// second.scheduling_id = Some("S-1".to_string());
    /// assert!(matches!(store.insert(second), Err(IdentityError::Conflict(_))));
    /// ```
    pub fn insert(&self, record: EmployeeRecord) -> Result<EmployeeRecord, IdentityError> {
        let mut index = self.lock();
        if index.records.contains_key(&record.id) {
            return Err(IdentityError::DuplicateEmployee {
                employee_id: record.id,
            });
        }

        let scheduling_id = clean(record.scheduling_id.as_deref()).map(str::to_string);
        let payroll_code = clean(record.payroll_code.as_deref()).map(str::to_string);
        index.check(record.id, IdentifierKind::SchedulingId, scheduling_id.as_deref())?;
        index.check(record.id, IdentifierKind::PayrollCode, payroll_code.as_deref())?;

        let id = record.id;
        index.records.insert(
            id,
            EmployeeRecord {
                scheduling_id: None,
                payroll_code: None,
                ..record
            },
        );
        index.rebind(id, IdentifierKind::SchedulingId, scheduling_id.as_deref());
        index.rebind(id, IdentifierKind::PayrollCode, payroll_code.as_deref());

        Ok(index.records[&id].clone())
    }

    /// Binds external identifiers to an existing employee.
    ///
    /// `None` leaves the current binding of that namespace unchanged. A new
    /// value replaces the employee's previous identifier in that namespace.
    /// Fails with [`IdentityConflict`] if either identifier is held by a
    /// different employee; in that case nothing is written.
    pub fn upsert_identity(
        &self,
        internal_id: Uuid,
        scheduling_id: Option<&str>,
        payroll_code: Option<&str>,
    ) -> Result<EmployeeRecord, IdentityError> {
        self.apply(internal_id, scheduling_id, payroll_code, |_| {})
    }

    /// Binds identifiers and updates the profile of an employee atomically.
    ///
    /// The profile closure only runs once both identifiers passed the
    /// conflict check; identifier fields it changes are ignored.
    pub fn apply<F>(
        &self,
        internal_id: Uuid,
        scheduling_id: Option<&str>,
        payroll_code: Option<&str>,
        update: F,
    ) -> Result<EmployeeRecord, IdentityError>
    where
        F: FnOnce(&mut EmployeeRecord),
    {
        let scheduling_id = clean(scheduling_id);
        let payroll_code = clean(payroll_code);

        let mut index = self.lock();
        if !index.records.contains_key(&internal_id) {
            return Err(IdentityError::UnknownEmployee {
                employee_id: internal_id,
            });
        }
        index.check(internal_id, IdentifierKind::SchedulingId, scheduling_id)?;
        index.check(internal_id, IdentifierKind::PayrollCode, payroll_code)?;

        index.rebind(internal_id, IdentifierKind::SchedulingId, scheduling_id);
        index.rebind(internal_id, IdentifierKind::PayrollCode, payroll_code);

        let record = index
            .records
            .get_mut(&internal_id)
            .ok_or(IdentityError::UnknownEmployee {
                employee_id: internal_id,
            })?;
        let bound = (record.scheduling_id.clone(), record.payroll_code.clone());
        update(record);
        record.id = internal_id;
        (record.scheduling_id, record.payroll_code) = bound;

        Ok(record.clone())
    }

    /// Unbinds a scheduling ID from whichever employee holds it.
    ///
    /// Returns the employee that held it.
    pub fn release_scheduling_id(&self, identifier: &str) -> Option<Uuid> {
        self.release(IdentifierKind::SchedulingId, identifier)
    }

    /// Unbinds a payroll code from whichever employee holds it.
    ///
    /// Returns the employee that held it.
    pub fn release_payroll_code(&self, identifier: &str) -> Option<Uuid> {
        self.release(IdentifierKind::PayrollCode, identifier)
    }

    fn release(&self, kind: IdentifierKind, identifier: &str) -> Option<Uuid> {
        let mut index = self.lock();
        let holder = index.namespace_mut(kind).remove(identifier.trim())?;
        if let Some(record) = index.records.get_mut(&holder) {
            match kind {
                IdentifierKind::SchedulingId => record.scheduling_id = None,
                IdentifierKind::PayrollCode => record.payroll_code = None,
            }
        }
        Some(holder)
    }

    /// Returns an employee by internal ID.
    pub fn get(&self, id: Uuid) -> Option<EmployeeRecord> {
        self.lock().records.get(&id).cloned()
    }

    /// Returns the internal ID bound to a scheduling ID.
    pub fn id_for_scheduling_id(&self, identifier: &str) -> Option<Uuid> {
        self.lock().by_scheduling_id.get(identifier.trim()).copied()
    }

    /// Returns the internal ID bound to a payroll code.
    pub fn id_for_payroll_code(&self, identifier: &str) -> Option<Uuid> {
        self.lock().by_payroll_code.get(identifier.trim()).copied()
    }

    /// Returns the employee bound to a scheduling ID.
    pub fn find_by_scheduling_id(&self, identifier: &str) -> Option<EmployeeRecord> {
        let index = self.lock();
        let id = index.by_scheduling_id.get(identifier.trim())?;
        index.records.get(id).cloned()
    }

    /// Returns the employee bound to a payroll code.
    pub fn find_by_payroll_code(&self, identifier: &str) -> Option<EmployeeRecord> {
        let index = self.lock();
        let id = index.by_payroll_code.get(identifier.trim())?;
        index.records.get(id).cloned()
    }

    /// Returns every employee, ordered by display name then ID.
    pub fn all(&self) -> Vec<EmployeeRecord> {
        let mut records: Vec<EmployeeRecord> = self.lock().records.values().cloned().collect();
        records.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.id.cmp(&b.id))
        });
        records
    }

    /// Returns the number of employees.
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Returns true if the store holds no employees.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
