//! Emergency lifecycle orchestration.
//!
//! Operations are stateless and take an explicit [`DispatchContext`]
//! with the store, cache and broadcaster handles. Only the primary
//! persistence path aborts a trigger; assignment, the customer-info
//! snapshot, auto-dispatch and notification are best-effort and never
//! fail the call that started them.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cache::DispatchCache;
use crate::database::{CustomerStore, EmergencyStore};
use crate::error::{Result, SentraError};
use crate::events::{EventSink, ServerEvent};
use crate::model::{Emergency, EmergencyInput, EmergencyResponse, EmergencyStatus, ProcessingMarker};

/// Fixed note attached to auto-dispatch audit rows.
pub const AUTO_DISPATCH_NOTE: &str = "Auto-dispatched by system";

/// Upper bound on any single cache round-trip inside dispatch.
const CACHE_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Handles the orchestrator operates on. Built per call by the
/// server; nothing is captured implicitly.
pub struct DispatchContext<'a> {
    pub emergencies: &'a dyn EmergencyStore,
    pub customers: &'a dyn CustomerStore,
    pub cache: &'a dyn DispatchCache,
    pub events: &'a dyn EventSink,
}

impl fmt::Debug for DispatchContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchContext").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmergencyStatusView {
    pub emergency: Emergency,
    pub responses: Vec<EmergencyResponse>,
    pub processing_info: Option<ProcessingMarker>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_count: i64,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmergencyHistoryPage {
    pub emergencies: Vec<Emergency>,
    pub pagination: Pagination,
}

/// Ingest a trigger: persist the emergency, mark it as processing,
/// snapshot customer info, attempt operator assignment, derive
/// auto-dispatch actions and fan the trigger out to both audiences.
pub async fn process_emergency(
    ctx: &DispatchContext<'_>,
    input: EmergencyInput,
) -> Result<Emergency> {
    warn!(
        customer_id = %input.customer_id,
        device_id = ?input.device_id,
        kind = %input.kind,
        severity = %input.severity,
        "emergency triggered"
    );

    let emergency = ctx.emergencies.insert(&input).await?;

    let marker = ProcessingMarker::new(emergency.severity);
    bounded(ctx.cache.put_processing_marker(emergency.id, &marker)).await?;

    if let Err(e) = snapshot_customer_info(ctx, emergency.customer_id).await {
        warn!(customer_id = %emergency.customer_id, error = %e, "customer info snapshot failed");
    }

    let mut current = emergency.clone();
    match ctx.emergencies.claim_operator(emergency.id).await {
        Ok(operator) => {
            info!(emergency_id = %emergency.id, operator_id = %operator.id, "emergency assigned");
            current.status = EmergencyStatus::InProgress;
        }
        Err(SentraError::CapacityExhausted(msg)) => {
            // Non-fatal: the emergency stays pending and the next
            // trigger re-attempts assignment.
            warn!(emergency_id = %emergency.id, %msg, "operator capacity exhausted");
        }
        Err(e) => {
            error!(emergency_id = %emergency.id, error = %e, "operator assignment failed");
        }
    }

    if emergency.severity.requires_auto_dispatch()
        && let Err(e) = auto_dispatch(ctx, &emergency).await
    {
        error!(emergency_id = %emergency.id, error = %e, "auto-dispatch failed");
    }

    ctx.events.notify_customer(
        emergency.customer_id,
        ServerEvent::EmergencyTriggered {
            emergency_id: emergency.id,
            kind: emergency.kind,
            severity: emergency.severity,
            timestamp: emergency.created_at,
        },
    );
    ctx.events.notify_operators(ServerEvent::NewEmergency {
        emergency_id: emergency.id,
        customer_id: emergency.customer_id,
        kind: emergency.kind,
        severity: emergency.severity,
        timestamp: emergency.created_at,
    });

    Ok(current)
}

/// Gate a sensor trigger on arm state. A disarmed system swallows the
/// trigger with no writes and no fan-out; an armed one escalates it
/// through [`process_emergency`].
pub async fn escalate_if_armed(
    ctx: &DispatchContext<'_>,
    armed: bool,
    input: EmergencyInput,
) -> Result<Option<Emergency>> {
    if !armed {
        info!(
            customer_id = %input.customer_id,
            device_id = ?input.device_id,
            "sensor trigger ignored while disarmed"
        );
        return Ok(None);
    }

    process_emergency(ctx, input).await.map(Some)
}

/// Resolve a non-terminal emergency. A terminal current state yields
/// `StateConflict` with no additional writes.
pub async fn resolve_emergency(
    ctx: &DispatchContext<'_>,
    id: Uuid,
    operator_id: Option<Uuid>,
    notes: Option<&str>,
) -> Result<Emergency> {
    let emergency = ctx
        .emergencies
        .transition_to_terminal(id, EmergencyStatus::Resolved)
        .await?;

    ctx.emergencies
        .append_response(
            id,
            operator_id,
            "resolved",
            None,
            notes.unwrap_or("Emergency resolved"),
        )
        .await?;

    // Advisory cleanup; the marker would expire on its own.
    if let Err(e) = bounded(ctx.cache.clear_processing_marker(id)).await {
        warn!(emergency_id = %id, error = %e, "processing marker cleanup failed");
    }

    let resolved_at = emergency.resolved_at.unwrap_or_else(Utc::now);
    let resolved_by = if operator_id.is_some() {
        "operator"
    } else {
        "customer"
    };

    ctx.events.notify_customer(
        emergency.customer_id,
        ServerEvent::EmergencyResolved {
            emergency_id: id,
            customer_id: None,
            resolved_at,
            resolved_by: resolved_by.to_string(),
        },
    );
    ctx.events.notify_operators(ServerEvent::EmergencyResolved {
        emergency_id: id,
        customer_id: Some(emergency.customer_id),
        resolved_at,
        resolved_by: resolved_by.to_string(),
    });

    info!(emergency_id = %id, ?operator_id, "emergency resolved");
    Ok(emergency)
}

/// Cancel a non-terminal emergency.
pub async fn cancel_emergency(ctx: &DispatchContext<'_>, id: Uuid) -> Result<Emergency> {
    let emergency = ctx
        .emergencies
        .transition_to_terminal(id, EmergencyStatus::Cancelled)
        .await?;

    ctx.emergencies
        .append_response(id, None, "cancelled", None, "Emergency cancelled by customer")
        .await?;

    let cancelled_at = emergency.resolved_at.unwrap_or_else(Utc::now);

    ctx.events.notify_customer(
        emergency.customer_id,
        ServerEvent::EmergencyCancelled {
            emergency_id: id,
            customer_id: None,
            cancelled_at,
        },
    );
    ctx.events.notify_operators(ServerEvent::EmergencyCancelled {
        emergency_id: id,
        customer_id: Some(emergency.customer_id),
        cancelled_at,
    });

    info!(emergency_id = %id, "emergency cancelled");
    Ok(emergency)
}

/// Durable rows plus the live processing marker, if any.
pub async fn get_emergency_status(
    ctx: &DispatchContext<'_>,
    id: Uuid,
) -> Result<EmergencyStatusView> {
    let emergency = ctx
        .emergencies
        .get(id)
        .await?
        .ok_or_else(|| SentraError::NotFound(format!("emergency {id}")))?;

    let responses = ctx.emergencies.list_responses(id).await?;

    let processing_info = match bounded(ctx.cache.processing_marker(id)).await {
        Ok(marker) => marker,
        Err(e) => {
            warn!(emergency_id = %id, error = %e, "processing marker fetch failed");
            None
        }
    };

    Ok(EmergencyStatusView {
        emergency,
        responses,
        processing_info,
    })
}

pub async fn get_emergency_history(
    ctx: &DispatchContext<'_>,
    customer_id: Uuid,
    page: i64,
    limit: i64,
) -> Result<EmergencyHistoryPage> {
    let page = page.max(1);
    let limit = limit.clamp(1, 100);
    let offset = (page - 1) * limit;

    let (emergencies, total_count) = ctx.emergencies.history(customer_id, limit, offset).await?;

    // Stable equivalent of `i64::div_ceil`, which is unstable (`int_roundings`).
    let total_pages = {
        let (q, r) = (total_count / limit, total_count % limit);
        if r != 0 && (r < 0) == (limit < 0) {
            q + 1
        } else {
            q
        }
    };
    let has_more = offset + (emergencies.len() as i64) < total_count;

    Ok(EmergencyHistoryPage {
        emergencies,
        pagination: Pagination {
            current_page: page,
            total_pages,
            total_count,
            has_more,
        },
    })
}

/// Seconds elapsed since the emergency was created, floored at zero.
pub fn response_time_since(created_at: DateTime<Utc>) -> i32 {
    (Utc::now() - created_at)
        .num_seconds()
        .clamp(0, i64::from(i32::MAX)) as i32
}

async fn auto_dispatch(ctx: &DispatchContext<'_>, emergency: &Emergency) -> Result<()> {
    for action in emergency.kind.dispatch_actions() {
        ctx.emergencies
            .append_response(
                emergency.id,
                None,
                action.as_str(),
                Some(response_time_since(emergency.created_at)),
                AUTO_DISPATCH_NOTE,
            )
            .await?;
    }

    info!(emergency_id = %emergency.id, kind = %emergency.kind, "auto-dispatch completed");
    Ok(())
}

async fn snapshot_customer_info(ctx: &DispatchContext<'_>, customer_id: Uuid) -> Result<()> {
    let Some(info) = ctx.customers.emergency_info(customer_id).await? else {
        return Ok(());
    };

    bounded(ctx.cache.put_customer_info(customer_id, &info)).await
}

async fn bounded<T>(fut: impl Future<Output = Result<T>>) -> Result<T> {
    timeout(CACHE_CALL_TIMEOUT, fut).await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::Duration as ChronoDuration;

    use crate::cache::MockDispatchCache;
    use crate::database::{MockCustomerStore, MockEmergencyStore};
    use crate::model::{EmergencyType, Operator, Severity};

    /// Captures fan-out in order; customer deliveries keep the target id.
    #[derive(Debug, Default)]
    struct RecordingSink {
        deliveries: Mutex<Vec<(Option<Uuid>, ServerEvent)>>,
    }

    impl RecordingSink {
        fn names(&self) -> Vec<&'static str> {
            self.deliveries
                .lock()
                .unwrap()
                .iter()
                .map(|(_, event)| event.name())
                .collect()
        }
    }

    impl EventSink for RecordingSink {
        fn notify_customer(&self, customer_id: Uuid, event: ServerEvent) {
            self.deliveries
                .lock()
                .unwrap()
                .push((Some(customer_id), event));
        }

        fn notify_operators(&self, event: ServerEvent) {
            self.deliveries.lock().unwrap().push((None, event));
        }
    }

    fn sensor_input(customer_id: Uuid, severity: Severity, kind: EmergencyType) -> EmergencyInput {
        EmergencyInput {
            customer_id,
            device_id: Some(Uuid::new_v4()),
            severity,
            kind,
            description: Some("motion sensor triggered on camera device".into()),
            location_data: None,
        }
    }

    fn persisted(input: &EmergencyInput) -> Emergency {
        Emergency {
            id: Uuid::new_v4(),
            customer_id: input.customer_id,
            device_id: input.device_id,
            severity: input.severity,
            kind: input.kind,
            description: input.description.clone(),
            location_data: input.location_data.clone(),
            status: EmergencyStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    // Mocks are strict: any call without a matching expectation panics,
    // so a passing test proves the absence of writes, not just their
    // presence.

    #[tokio::test]
    async fn disarmed_sensor_trigger_creates_nothing() {
        let emergencies = MockEmergencyStore::new();
        let customers = MockCustomerStore::new();
        let cache = MockDispatchCache::new();
        let events = RecordingSink::default();
        let ctx = DispatchContext {
            emergencies: &emergencies,
            customers: &customers,
            cache: &cache,
            events: &events,
        };

        let input = sensor_input(Uuid::new_v4(), Severity::High, EmergencyType::Intrusion);
        let outcome = escalate_if_armed(&ctx, false, input).await.unwrap();

        assert!(outcome.is_none());
        assert!(events.names().is_empty());
    }

    #[tokio::test]
    async fn armed_sensor_trigger_creates_exactly_one_emergency() {
        let input = sensor_input(Uuid::new_v4(), Severity::Low, EmergencyType::Other);
        let stored = persisted(&input);
        let stored_id = stored.id;

        let mut emergencies = MockEmergencyStore::new();
        emergencies
            .expect_insert()
            .times(1)
            .returning(move |_| Ok(stored.clone()));
        emergencies
            .expect_claim_operator()
            .times(1)
            .returning(|id| {
                Err(SentraError::CapacityExhausted(format!(
                    "no available operators for emergency {id}"
                )))
            });
        let mut customers = MockCustomerStore::new();
        customers.expect_emergency_info().returning(|_| Ok(None));
        let mut cache = MockDispatchCache::new();
        cache
            .expect_put_processing_marker()
            .times(1)
            .returning(|_, _| Ok(()));
        let events = RecordingSink::default();
        let ctx = DispatchContext {
            emergencies: &emergencies,
            customers: &customers,
            cache: &cache,
            events: &events,
        };

        let outcome = escalate_if_armed(&ctx, true, input)
            .await
            .unwrap()
            .expect("armed trigger escalates");

        // Exhausted capacity leaves the emergency pending; the trigger
        // still fans out to both audiences.
        assert_eq!(outcome.id, stored_id);
        assert_eq!(outcome.status, EmergencyStatus::Pending);
        assert_eq!(events.names(), vec!["EMERGENCY_TRIGGERED", "NEW_EMERGENCY"]);
    }

    #[tokio::test]
    async fn successful_claim_is_single_and_moves_emergency_in_progress() {
        let input = sensor_input(Uuid::new_v4(), Severity::Medium, EmergencyType::Intrusion);
        let stored = persisted(&input);

        let mut emergencies = MockEmergencyStore::new();
        emergencies
            .expect_insert()
            .times(1)
            .returning(move |_| Ok(stored.clone()));
        // Exactly one claim per trigger; the repository's row locks
        // guarantee two triggers never share its result.
        emergencies
            .expect_claim_operator()
            .times(1)
            .returning(|_| {
                Ok(Operator {
                    id: Uuid::new_v4(),
                    name: "Dana".into(),
                    last_assigned_at: None,
                })
            });
        let mut customers = MockCustomerStore::new();
        customers.expect_emergency_info().returning(|_| Ok(None));
        let mut cache = MockDispatchCache::new();
        cache
            .expect_put_processing_marker()
            .returning(|_, _| Ok(()));
        let events = RecordingSink::default();
        let ctx = DispatchContext {
            emergencies: &emergencies,
            customers: &customers,
            cache: &cache,
            events: &events,
        };

        let outcome = process_emergency(&ctx, input).await.unwrap();
        assert_eq!(outcome.status, EmergencyStatus::InProgress);
    }

    #[tokio::test]
    async fn critical_fire_trigger_derives_dispatch_audit_rows() {
        let input = sensor_input(Uuid::new_v4(), Severity::Critical, EmergencyType::Fire);
        let stored = persisted(&input);

        let mut emergencies = MockEmergencyStore::new();
        emergencies
            .expect_insert()
            .times(1)
            .returning(move |_| Ok(stored.clone()));
        emergencies
            .expect_claim_operator()
            .times(1)
            .returning(|id| {
                Err(SentraError::CapacityExhausted(format!(
                    "no available operators for emergency {id}"
                )))
            });
        emergencies
            .expect_append_response()
            .withf(|_, operator_id, action, response_time, notes| {
                operator_id.is_none()
                    && action == "contact_fire_department"
                    && response_time.is_some()
                    && notes == AUTO_DISPATCH_NOTE
            })
            .times(1)
            .returning(|_, _, _, _, _| Ok(()));
        let mut customers = MockCustomerStore::new();
        customers.expect_emergency_info().returning(|_| Ok(None));
        let mut cache = MockDispatchCache::new();
        cache
            .expect_put_processing_marker()
            .returning(|_, _| Ok(()));
        let events = RecordingSink::default();
        let ctx = DispatchContext {
            emergencies: &emergencies,
            customers: &customers,
            cache: &cache,
            events: &events,
        };

        process_emergency(&ctx, input).await.unwrap();
    }

    #[tokio::test]
    async fn resolving_terminal_emergency_conflicts_without_further_writes() {
        let id = Uuid::new_v4();

        let mut emergencies = MockEmergencyStore::new();
        emergencies
            .expect_transition_to_terminal()
            .times(1)
            .returning(|id, _| {
                Err(SentraError::StateConflict(format!(
                    "emergency {id} is already resolved"
                )))
            });
        // No append_response or cache expectations: a second resolve
        // must leave the audit trail and marker untouched.
        let customers = MockCustomerStore::new();
        let cache = MockDispatchCache::new();
        let events = RecordingSink::default();
        let ctx = DispatchContext {
            emergencies: &emergencies,
            customers: &customers,
            cache: &cache,
            events: &events,
        };

        let err = resolve_emergency(&ctx, id, None, None).await.unwrap_err();
        assert!(matches!(err, SentraError::StateConflict(_)));
        assert!(events.names().is_empty());
    }

    #[test]
    fn response_time_is_floored_at_zero() {
        let future = Utc::now() + ChronoDuration::seconds(30);
        assert_eq!(response_time_since(future), 0);
    }

    #[test]
    fn response_time_counts_whole_seconds() {
        let past = Utc::now() - ChronoDuration::seconds(42);
        let elapsed = response_time_since(past);
        assert!((42..=43).contains(&elapsed));
    }
}
