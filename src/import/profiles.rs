//! Saved column mappings.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{FileKind, ImportMapping, MappingProfile};

type ProfileKey = (String, FileKind, String);

/// Mapping profiles keyed by owner, file kind and name.
///
/// Saving under an existing key replaces the mapping but keeps the profile
/// ID.
#[derive(Debug, Default)]
pub struct MappingProfileStore {
    profiles: Mutex<BTreeMap<ProfileKey, MappingProfile>>,
}

impl MappingProfileStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ProfileKey, MappingProfile>> {
        self.profiles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Saves a mapping under `(owner, file_kind, name)`.
    pub fn save(
        &self,
        owner: &str,
        file_kind: FileKind,
        name: &str,
        mapping: ImportMapping,
    ) -> MappingProfile {
        let key = (owner.to_string(), file_kind, name.to_string());
        let mut profiles = self.lock();
        let id = profiles.get(&key).map_or_else(Uuid::new_v4, |existing| existing.id);
        let profile = MappingProfile {
            id,
            owner: owner.to_string(),
            file_kind,
            name: name.to_string(),
            mapping,
            saved_at: Utc::now(),
        };
        profiles.insert(key, profile.clone());
        info!(owner, file_kind = %file_kind, name, profile_id = %id, "Mapping profile saved");
        profile
    }

    /// Loads a profile.
    pub fn load(&self, owner: &str, file_kind: FileKind, name: &str) -> EngineResult<MappingProfile> {
        self.lock()
            .get(&(owner.to_string(), file_kind, name.to_string()))
            .cloned()
            .ok_or_else(|| EngineError::ProfileNotFound {
                owner: owner.to_string(),
                file_kind: file_kind.to_string(),
                name: name.to_string(),
            })
    }

    /// Lists the profiles of an owner for a file kind, ordered by name.
    pub fn list(&self, owner: &str, file_kind: FileKind) -> Vec<MappingProfile> {
        self.lock()
            .values()
            .filter(|profile| profile.owner == owner && profile.file_kind == file_kind)
            .cloned()
            .collect()
    }

    /// Deletes a profile, returning it.
    pub fn delete(&self, owner: &str, file_kind: FileKind, name: &str) -> EngineResult<MappingProfile> {
        self.lock()
            .remove(&(owner.to_string(), file_kind, name.to_string()))
            .ok_or_else(|| EngineError::ProfileNotFound {
                owner: owner.to_string(),
                file_kind: file_kind.to_string(),
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnBinding;

    fn mapping(column: &str) -> ImportMapping {
        ImportMapping {
            bindings: vec![ColumnBinding {
                column: column.to_string(),
                field: "code".to_string(),
            }],
        }
    }

    #[test]
    fn test_save_and_load() {
        let store = MappingProfileStore::new();
        store.save("ana", FileKind::Restaurant, "Proveedor A", mapping("Cod."));

        let profile = store.load("ana", FileKind::Restaurant, "Proveedor A").unwrap();
        assert_eq!(profile.mapping.field_for("Cod."), Some("code"));
    }

    #[test]
    fn test_profiles_are_scoped_by_owner_and_kind() {
        let store = MappingProfileStore::new();
        store.save("ana", FileKind::Restaurant, "default", mapping("A"));

        assert!(store.load("luis", FileKind::Restaurant, "default").is_err());
        assert!(matches!(
            store.load("ana", FileKind::Payroll, "default"),
            Err(EngineError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn test_resave_keeps_id() {
        let store = MappingProfileStore::new();
        let first = store.save("ana", FileKind::Payroll, "nomina", mapping("A"));
        let second = store.save("ana", FileKind::Payroll, "nomina", mapping("B"));

        assert_eq!(first.id, second.id);
        assert_eq!(store.list("ana", FileKind::Payroll).len(), 1);
        assert_eq!(
            store.load("ana", FileKind::Payroll, "nomina").unwrap().mapping,
            mapping("B")
        );
    }

    #[test]
    fn test_delete() {
        let store = MappingProfileStore::new();
        store.save("ana", FileKind::Payroll, "nomina", mapping("A"));
        store.delete("ana", FileKind::Payroll, "nomina").unwrap();
        assert!(store.delete("ana", FileKind::Payroll, "nomina").is_err());
    }
}
