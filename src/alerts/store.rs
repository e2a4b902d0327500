//! Alert rule and notification repositories.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    AlertKind, AlertNotification, AlertRule, Channel, ComparisonOperator, EvaluationPeriod,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn default_active() -> bool {
    true
}

/// The user-supplied part of an alert rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AlertRuleDraft {
    /// Display name.
    pub name: String,
    /// The watched metric.
    pub kind: AlertKind,
    /// Optional centre scope.
    #[serde(default)]
    pub centre_code: Option<String>,
    /// Threshold.
    pub threshold: Decimal,
    /// Comparison.
    pub operator: ComparisonOperator,
    /// Aggregation period.
    pub period: EvaluationPeriod,
    /// Delivery channels.
    pub channels: Vec<Channel>,
    /// Whether the rule is evaluated.
    #[serde(default = "default_active")]
    pub active: bool,
}

impl AlertRuleDraft {
    fn into_rule(self, id: Uuid) -> EngineResult<AlertRule> {
        if self.name.trim().is_empty() {
            return Err(EngineError::InvalidAlertRule {
                message: "name must not be empty".to_string(),
            });
        }
        if self.channels.is_empty() {
            return Err(EngineError::InvalidAlertRule {
                message: "at least one channel is required".to_string(),
            });
        }
        let mut channels: Vec<Channel> = Vec::with_capacity(self.channels.len());
        for channel in self.channels {
            if !channels.contains(&channel) {
                channels.push(channel);
            }
        }
        Ok(AlertRule {
            id,
            name: self.name.trim().to_string(),
            kind: self.kind,
            centre_code: self.centre_code,
            threshold: self.threshold,
            operator: self.operator,
            period: self.period,
            channels,
            active: self.active,
        })
    }
}

/// Stores alert rules in creation order.
#[derive(Debug, Default)]
pub struct AlertRuleRepository {
    rules: Mutex<Vec<AlertRule>>,
}

impl AlertRuleRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a rule.
    pub fn create(&self, draft: AlertRuleDraft) -> EngineResult<AlertRule> {
        let rule = draft.into_rule(Uuid::new_v4())?;
        lock(&self.rules).push(rule.clone());
        info!(rule_id = %rule.id, kind = ?rule.kind, "Alert rule created");
        Ok(rule)
    }

    /// Replaces a rule's definition, keeping its ID.
    pub fn update(&self, rule_id: Uuid, draft: AlertRuleDraft) -> EngineResult<AlertRule> {
        let updated = draft.into_rule(rule_id)?;
        let mut rules = lock(&self.rules);
        let slot = rules
            .iter_mut()
            .find(|rule| rule.id == rule_id)
            .ok_or(EngineError::AlertRuleNotFound { rule_id })?;
        *slot = updated.clone();
        Ok(updated)
    }

    /// Turns a rule on or off.
    pub fn set_active(&self, rule_id: Uuid, active: bool) -> EngineResult<AlertRule> {
        let mut rules = lock(&self.rules);
        let rule = rules
            .iter_mut()
            .find(|rule| rule.id == rule_id)
            .ok_or(EngineError::AlertRuleNotFound { rule_id })?;
        rule.active = active;
        Ok(rule.clone())
    }

    /// Deletes a rule.
    pub fn delete(&self, rule_id: Uuid) -> EngineResult<()> {
        let mut rules = lock(&self.rules);
        let before = rules.len();
        rules.retain(|rule| rule.id != rule_id);
        if rules.len() == before {
            return Err(EngineError::AlertRuleNotFound { rule_id });
        }
        Ok(())
    }

    /// Returns a rule by ID.
    pub fn get(&self, rule_id: Uuid) -> EngineResult<AlertRule> {
        lock(&self.rules)
            .iter()
            .find(|rule| rule.id == rule_id)
            .cloned()
            .ok_or(EngineError::AlertRuleNotFound { rule_id })
    }

    /// Lists every rule.
    pub fn list(&self) -> Vec<AlertRule> {
        lock(&self.rules).clone()
    }

    /// Lists the rules that take part in evaluation.
    pub fn active(&self) -> Vec<AlertRule> {
        lock(&self.rules)
            .iter()
            .filter(|rule| rule.active)
            .cloned()
            .collect()
    }
}

/// Stores fired notifications. Only the read flag ever changes.
#[derive(Debug, Default)]
pub struct NotificationRepository {
    notifications: Mutex<Vec<AlertNotification>>,
}

impl NotificationRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a notification.
    pub fn push(&self, notification: AlertNotification) {
        lock(&self.notifications).push(notification);
    }

    /// Lists notifications newest first.
    pub fn list(&self, unread_only: bool) -> Vec<AlertNotification> {
        lock(&self.notifications)
            .iter()
            .rev()
            .filter(|notification| !unread_only || !notification.read)
            .cloned()
            .collect()
    }

    /// Marks a notification read. Marking twice is a no-op.
    pub fn mark_read(&self, notification_id: Uuid) -> EngineResult<AlertNotification> {
        let mut notifications = lock(&self.notifications);
        let notification = notifications
            .iter_mut()
            .find(|notification| notification.id == notification_id)
            .ok_or(EngineError::NotificationNotFound { notification_id })?;
        notification.read = true;
        Ok(notification.clone())
    }

    /// Marks every notification read and returns how many changed.
    pub fn mark_all_read(&self) -> usize {
        let mut notifications = lock(&self.notifications);
        let mut changed = 0;
        for notification in notifications.iter_mut().filter(|n| !n.read) {
            notification.read = true;
            changed += 1;
        }
        changed
    }

    /// Number of unread notifications.
    pub fn unread_count(&self) -> usize {
        lock(&self.notifications).iter().filter(|n| !n.read).count()
    }
}
