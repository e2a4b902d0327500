//! In-memory record store.
//!
//! Holds employees (through the [`IdentityMappingStore`]), centres and the
//! three fact tables. Every table implements [`UpsertTarget`] for its row
//! type so file imports and sync jobs write through the same reconciler.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::models::{
    AbsenceEntry, Centre, EmployeeRecord, PayrollPeriod, PeriodWindow, ScheduleEntry,
};
use crate::reconcile::{
    AbsenceRow, CentreRow, EmployeeRef, EmployeeRow, Keyed, PayrollRow, ScheduleRow,
    UpsertTarget,
};

use super::error::StoreError;
use super::identity::IdentityMappingStore;

type PayrollKey = (Uuid, NaiveDate, NaiveDate);

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The facts of a period, optionally narrowed to one centre.
///
/// Employees are never narrowed; rules that need the home centre filter
/// them themselves.
#[derive(Debug, Clone, Default)]
pub struct FactSnapshot {
    /// Every employee.
    pub employees: Vec<EmployeeRecord>,
    /// Schedule entries dated inside the window.
    pub schedules: Vec<ScheduleEntry>,
    /// Absences overlapping the window.
    pub absences: Vec<AbsenceEntry>,
    /// Payroll periods overlapping the window.
    pub payroll: Vec<PayrollPeriod>,
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    identities: IdentityMappingStore,
    centres: Mutex<BTreeMap<String, Centre>>,
    schedules: Mutex<BTreeMap<String, ScheduleEntry>>,
    absences: Mutex<BTreeMap<String, AbsenceEntry>>,
    payroll: Mutex<BTreeMap<PayrollKey, PayrollPeriod>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identity mapping store.
    pub fn identities(&self) -> &IdentityMappingStore {
        &self.identities
    }

    /// Returns every employee.
    pub fn employees(&self) -> Vec<EmployeeRecord> {
        self.identities.all()
    }

    /// Returns every centre ordered by code.
    pub fn centres(&self) -> Vec<Centre> {
        guard(&self.centres).values().cloned().collect()
    }

    /// Returns a centre by code.
    pub fn centre(&self, code: &str) -> Option<Centre> {
        guard(&self.centres).get(code).cloned()
    }

    /// Adds a manually entered schedule entry. Entries without an external
    /// ID get a generated key.
    pub fn add_schedule(&self, entry: ScheduleEntry) -> Result<(), StoreError> {
        self.require_employee(entry.employee_id)?;
        let key = entry
            .external_id
            .clone()
            .unwrap_or_else(|| format!("manual:{}", Uuid::new_v4()));
        guard(&self.schedules).insert(key, entry);
        Ok(())
    }

    /// Adds a manually entered absence.
    pub fn add_absence(&self, entry: AbsenceEntry) -> Result<(), StoreError> {
        self.require_employee(entry.employee_id)?;
        let key = entry
            .external_id
            .clone()
            .unwrap_or_else(|| format!("manual:{}", Uuid::new_v4()));
        guard(&self.absences).insert(key, entry);
        Ok(())
    }

    /// Adds or replaces a payroll period.
    pub fn add_payroll(&self, entry: PayrollPeriod) -> Result<(), StoreError> {
        self.require_employee(entry.employee_id)?;
        let key = (entry.employee_id, entry.period.start, entry.period.end);
        guard(&self.payroll).insert(key, entry);
        Ok(())
    }

    /// Collects the facts of `window`, narrowed to `centre_code` if given.
    pub fn snapshot(&self, window: &PeriodWindow, centre_code: Option<&str>) -> FactSnapshot {
        let employees = self.identities.all();
        let in_centre = |code: Option<&str>| centre_code.is_none_or(|wanted| code == Some(wanted));

        let schedules = guard(&self.schedules)
            .values()
            .filter(|entry| window.contains(entry.date))
            .filter(|entry| in_centre(entry.centre_code.as_deref()))
            .cloned()
            .collect();

        let absences = guard(&self.absences)
            .values()
            .filter(|entry| entry.days_within(window) > 0)
            .filter(|entry| {
                centre_code.is_none()
                    || employees
                        .iter()
                        .find(|employee| employee.id == entry.employee_id)
                        .is_some_and(|employee| in_centre(employee.centre_code.as_deref()))
            })
            .cloned()
            .collect();

        let payroll = guard(&self.payroll)
            .values()
            .filter(|entry| entry.period.overlaps(window))
            .filter(|entry| in_centre(entry.centre_code.as_deref()))
            .cloned()
            .collect();

        FactSnapshot {
            employees,
            schedules,
            absences,
            payroll,
        }
    }

    fn require_employee(&self, employee_id: Uuid) -> Result<(), StoreError> {
        match self.identities.get(employee_id) {
            Some(_) => Ok(()),
            None => Err(StoreError::UnknownEmployee {
                reference: EmployeeRef::Internal(employee_id).to_string(),
            }),
        }
    }

    fn resolve(&self, reference: &EmployeeRef) -> Result<Uuid, StoreError> {
        let found = match reference {
            EmployeeRef::Internal(id) => self.identities.get(*id).map(|record| record.id),
            EmployeeRef::SchedulingId(id) => self.identities.id_for_scheduling_id(id),
            EmployeeRef::PayrollCode(code) => self.identities.id_for_payroll_code(code),
        };
        found.ok_or_else(|| StoreError::UnknownEmployee {
            reference: reference.to_string(),
        })
    }

    /// Finds the employee holding a payroll code, creating one bound to the
    /// code if none exists.
    fn resolve_or_create_payee(&self, row: &PayrollRow) -> Result<Uuid, StoreError> {
        if let Some(id) = self.identities.id_for_payroll_code(&row.payroll_code) {
            return Ok(id);
        }
        let mut record = EmployeeRecord::new(
            row.employee_name
                .clone()
                .unwrap_or_else(|| row.payroll_code.clone()),
        );
        record.payroll_code = Some(row.payroll_code.clone());
        record.centre_code = row.centre_code.clone();
        let record = self.identities.insert(record)?;
        info!(
            employee_id = %record.id,
            payroll_code = %row.payroll_code,
            "Created employee for unknown payroll code"
        );
        Ok(record.id)
    }

    /// Looks an employee up by scheduling ID, then by payroll code.
    ///
    /// An unbound scheduling ID falls through to the payroll code, so an
    /// employee first created by a payroll import is matched by the first
    /// sync that reports both identifiers; `update` then binds the new ID.
    fn employee_id_for(&self, row: &EmployeeRow) -> Option<Uuid> {
        if let Some(id) = row
            .scheduling_id
            .as_deref()
            .and_then(|id| self.identities.id_for_scheduling_id(id))
        {
            return Some(id);
        }
        row.payroll_code
            .as_deref()
            .and_then(|code| self.identities.id_for_payroll_code(code))
    }
}

impl UpsertTarget<EmployeeRow> for MemoryStore {
    fn exists(&self, row: &EmployeeRow) -> bool {
        self.employee_id_for(row).is_some()
    }

    fn insert(&self, row: &EmployeeRow) -> Result<(), StoreError> {
        if row.scheduling_id.is_none() && row.payroll_code.is_none() {
            return Err(StoreError::Invalid {
                message: format!("employee '{}' has no external identifier", row.display_name),
            });
        }
        if self.exists(row) {
            return Err(StoreError::DuplicateKey {
                key: row.natural_key(),
            });
        }
        let record = EmployeeRecord {
            centre_code: row.centre_code.clone(),
            scheduling_id: row.scheduling_id.clone(),
            payroll_code: row.payroll_code.clone(),
            email: row.email.clone(),
            active_from: row.active_from,
            active_to: row.active_to,
            ..EmployeeRecord::new(row.display_name.clone())
        };
        self.identities.insert(record)?;
        Ok(())
    }

    fn update(&self, row: &EmployeeRow) -> Result<(), StoreError> {
        let id = self.employee_id_for(row).ok_or_else(|| StoreError::NotFound {
            key: row.natural_key(),
        })?;
        self.identities.apply(
            id,
            row.scheduling_id.as_deref(),
            row.payroll_code.as_deref(),
            |record| {
                record.display_name = row.display_name.clone();
                record.centre_code = row.centre_code.clone();
                record.email = row.email.clone();
                record.active_from = row.active_from;
                record.active_to = row.active_to;
            },
        )?;
        Ok(())
    }
}

impl From<&CentreRow> for Centre {
    fn from(row: &CentreRow) -> Self {
        Centre {
            code: row.code.clone(),
            name: row.name.clone(),
            scheduling_site_id: row.scheduling_site_id.clone(),
            payroll_site_code: row.payroll_site_code.clone(),
            city: row.city.clone(),
            email: row.email.clone(),
            opened_on: row.opened_on,
        }
    }
}

impl UpsertTarget<CentreRow> for MemoryStore {
    fn exists(&self, row: &CentreRow) -> bool {
        guard(&self.centres).contains_key(&row.code)
    }

    fn insert(&self, row: &CentreRow) -> Result<(), StoreError> {
        let mut centres = guard(&self.centres);
        if centres.contains_key(&row.code) {
            return Err(StoreError::DuplicateKey {
                key: row.natural_key(),
            });
        }
        centres.insert(row.code.clone(), Centre::from(row));
        Ok(())
    }

    fn update(&self, row: &CentreRow) -> Result<(), StoreError> {
        let mut centres = guard(&self.centres);
        let existing = centres.get_mut(&row.code).ok_or_else(|| StoreError::NotFound {
            key: row.natural_key(),
        })?;
        *existing = Centre::from(row);
        Ok(())
    }
}

impl MemoryStore {
    fn schedule_entry(&self, row: &ScheduleRow) -> Result<ScheduleEntry, StoreError> {
        if row.planned_hours < Decimal::ZERO {
            return Err(StoreError::Invalid {
                message: format!("negative planned hours {}", row.planned_hours),
            });
        }
        Ok(ScheduleEntry {
            employee_id: self.resolve(&row.employee)?,
            external_id: Some(row.external_id.clone()),
            centre_code: row.centre_code.clone(),
            date: row.date,
            planned_hours: row.planned_hours,
            provenance: row.provenance,
        })
    }

    fn absence_entry(&self, row: &AbsenceRow) -> Result<AbsenceEntry, StoreError> {
        if row.start_date > row.end_date {
            return Err(StoreError::Invalid {
                message: format!("absence ends {} before it starts {}", row.end_date, row.start_date),
            });
        }
        Ok(AbsenceEntry {
            employee_id: self.resolve(&row.employee)?,
            external_id: Some(row.external_id.clone()),
            kind: row.kind.clone(),
            start_date: row.start_date,
            end_date: row.end_date,
            provenance: row.provenance,
        })
    }

    fn payroll_key(&self, row: &PayrollRow) -> Option<PayrollKey> {
        self.identities
            .id_for_payroll_code(&row.payroll_code)
            .map(|id| (id, row.period.start, row.period.end))
    }

    fn payroll_entry(&self, employee_id: Uuid, row: &PayrollRow) -> PayrollPeriod {
        PayrollPeriod {
            employee_id,
            centre_code: row.centre_code.clone(),
            period: row.period,
            worked_hours: row.worked_hours,
            gross_cost: row.gross_cost,
            provenance: row.provenance,
        }
    }
}

impl UpsertTarget<ScheduleRow> for MemoryStore {
    fn exists(&self, row: &ScheduleRow) -> bool {
        guard(&self.schedules).contains_key(&row.external_id)
    }

    fn insert(&self, row: &ScheduleRow) -> Result<(), StoreError> {
        let entry = self.schedule_entry(row)?;
        let mut schedules = guard(&self.schedules);
        if schedules.contains_key(&row.external_id) {
            return Err(StoreError::DuplicateKey {
                key: row.natural_key(),
            });
        }
        schedules.insert(row.external_id.clone(), entry);
        Ok(())
    }

    fn update(&self, row: &ScheduleRow) -> Result<(), StoreError> {
        let entry = self.schedule_entry(row)?;
        let mut schedules = guard(&self.schedules);
        let existing = schedules
            .get_mut(&row.external_id)
            .ok_or_else(|| StoreError::NotFound {
                key: row.natural_key(),
            })?;
        *existing = entry;
        Ok(())
    }
}

impl UpsertTarget<AbsenceRow> for MemoryStore {
    fn exists(&self, row: &AbsenceRow) -> bool {
        guard(&self.absences).contains_key(&row.external_id)
    }

    fn insert(&self, row: &AbsenceRow) -> Result<(), StoreError> {
        let entry = self.absence_entry(row)?;
        let mut absences = guard(&self.absences);
        if absences.contains_key(&row.external_id) {
            return Err(StoreError::DuplicateKey {
                key: row.natural_key(),
            });
        }
        absences.insert(row.external_id.clone(), entry);
        Ok(())
    }

    fn update(&self, row: &AbsenceRow) -> Result<(), StoreError> {
        let entry = self.absence_entry(row)?;
        let mut absences = guard(&self.absences);
        let existing = absences
            .get_mut(&row.external_id)
            .ok_or_else(|| StoreError::NotFound {
                key: row.natural_key(),
            })?;
        *existing = entry;
        Ok(())
    }
}

impl UpsertTarget<PayrollRow> for MemoryStore {
    fn exists(&self, row: &PayrollRow) -> bool {
        self.payroll_key(row)
            .is_some_and(|key| guard(&self.payroll).contains_key(&key))
    }

    fn insert(&self, row: &PayrollRow) -> Result<(), StoreError> {
        if self.exists(row) {
            return Err(StoreError::DuplicateKey {
                key: row.natural_key(),
            });
        }
        let employee_id = self.resolve_or_create_payee(row)?;
        let entry = self.payroll_entry(employee_id, row);
        guard(&self.payroll).insert((employee_id, row.period.start, row.period.end), entry);
        Ok(())
    }

    fn update(&self, row: &PayrollRow) -> Result<(), StoreError> {
        let key = self.payroll_key(row).ok_or_else(|| StoreError::NotFound {
            key: row.natural_key(),
        })?;
        let mut payroll = guard(&self.payroll);
        let existing = payroll.get_mut(&key).ok_or_else(|| StoreError::NotFound {
            key: row.natural_key(),
        })?;
        *existing = self.payroll_entry(key.0, row);
        Ok(())
    }
}
