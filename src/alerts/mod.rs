//! Threshold alerts over aggregate workforce metrics.
//!
//! Users define [`AlertRule`](crate::models::AlertRule)s; the
//! [`AlertEvaluator`] computes each active rule's metric for its period and
//! centre, and every satisfied rule produces one notification that is
//! stored and handed to a [`NotificationSink`] per enabled channel.

mod evaluator;
mod sink;
mod store;

pub use evaluator::{AlertEvaluator, EvaluationReport, compute_metric};
pub use sink::{DeliveryError, NotificationSink, OutboxSink};
pub use store::{AlertRuleDraft, AlertRuleRepository, NotificationRepository};
