//! Application state for the workforce sync API.
//!
//! This module wires the engine components around one record store and
//! exposes them to the request handlers.

use std::sync::Arc;

use crate::alerts::{AlertEvaluator, AlertRuleRepository, NotificationRepository, NotificationSink};
use crate::config::ConfigLoader;
use crate::import::{Importer, MappingProfileStore};
use crate::quality::{IssueRepository, QualityEngine};
use crate::reconcile::BatchReconciler;
use crate::store::MemoryStore;
use crate::sync::{SchedulingApi, SyncJobRepository, SyncOrchestrator};

/// Shared application state.
///
/// Every component shares the same [`MemoryStore`], so imports, sync jobs,
/// quality recalculations and alert evaluations see each other's writes.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ConfigLoader>,
    store: Arc<MemoryStore>,
    importer: Arc<Importer>,
    profiles: Arc<MappingProfileStore>,
    sync: Arc<SyncOrchestrator>,
    quality: Arc<QualityEngine>,
    alert_rules: Arc<AlertRuleRepository>,
    notifications: Arc<NotificationRepository>,
    alerts: Arc<AlertEvaluator>,
}

impl AppState {
    /// Builds the state from configuration, the external scheduling API and
    /// the notification sink.
    pub fn new(
        config: ConfigLoader,
        api: Arc<dyn SchedulingApi>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let reconciler = BatchReconciler::new(config.sync().chunk_size);
        let importer = Importer::new(config.import().clone(), Arc::clone(&store), reconciler);
        let sync = SyncOrchestrator::new(
            api,
            Arc::clone(&store),
            config.sync().clone(),
            Arc::new(SyncJobRepository::new()),
        );
        let issues = Arc::new(IssueRepository::new());
        let quality = QualityEngine::new(
            Arc::clone(&store),
            Arc::clone(&issues),
            config.quality().clone(),
        );
        let alert_rules = Arc::new(AlertRuleRepository::new());
        let notifications = Arc::new(NotificationRepository::new());
        let alerts = AlertEvaluator::new(
            Arc::clone(&store),
            issues,
            Arc::clone(&alert_rules),
            Arc::clone(&notifications),
            sink,
        );

        Self {
            config: Arc::new(config),
            store,
            importer: Arc::new(importer),
            profiles: Arc::new(MappingProfileStore::new()),
            sync: Arc::new(sync),
            quality: Arc::new(quality),
            alert_rules,
            notifications,
            alerts: Arc::new(alerts),
        }
    }

    /// Returns a reference to the configuration loader.
    pub fn config(&self) -> &ConfigLoader {
        &self.config
    }

    /// The shared record store.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// File imports.
    pub fn importer(&self) -> &Importer {
        &self.importer
    }

    /// Saved mapping profiles.
    pub fn profiles(&self) -> &MappingProfileStore {
        &self.profiles
    }

    /// The sync orchestrator.
    pub fn sync(&self) -> &Arc<SyncOrchestrator> {
        &self.sync
    }

    /// The data quality engine.
    pub fn quality(&self) -> &QualityEngine {
        &self.quality
    }

    /// Alert rule definitions.
    pub fn alert_rules(&self) -> &AlertRuleRepository {
        &self.alert_rules
    }

    /// Fired notifications.
    pub fn notifications(&self) -> &NotificationRepository {
        &self.notifications
    }

    /// The alert evaluator.
    pub fn alerts(&self) -> &AlertEvaluator {
        &self.alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone + Send + Sync>() {}
        assert_clone::<AppState>();
    }
}
