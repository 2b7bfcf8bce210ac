use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use dealer_ops::workflows::get_ready::approvals::eligibility::vehicle_needs_approval;
use dealer_ops::workflows::get_ready::approvals::{
    needs_approval, ApprovalDataSource, CapabilityCheck, DealerScope, Notification,
    NotificationLevel, Notifier, SourceError, SummaryCounts, VehicleApprovalRecord,
    VehicleApprovalStatus, VehicleId, WorkItemApprovalStatus, WorkItemId, WorkItemRecord,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Debug, Clone)]
struct StoredVehicle {
    dealer_id: i64,
    record: VehicleApprovalRecord,
}

#[derive(Debug, Default)]
struct Ledger {
    vehicles: Vec<StoredVehicle>,
    decisions: Vec<(NaiveDate, VehicleApprovalStatus)>,
}

/// Process-local stand-in for the dealership database and its approval RPCs.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemoryApprovalSource {
    ledger: Arc<Mutex<Ledger>>,
}

impl InMemoryApprovalSource {
    pub(crate) fn seeded(now: DateTime<Utc>) -> Self {
        let vehicles = seeded_lot(now)
            .into_iter()
            .map(|(dealer_id, record)| StoredVehicle { dealer_id, record })
            .collect();
        Self {
            ledger: Arc::new(Mutex::new(Ledger {
                vehicles,
                decisions: Vec::new(),
            })),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn decide_vehicle(
        &self,
        vehicle_id: &VehicleId,
        status: VehicleApprovalStatus,
    ) -> Result<(), SourceError> {
        let mut ledger = self.ledger();
        let stored = ledger
            .vehicles
            .iter_mut()
            .find(|stored| &stored.record.id == vehicle_id)
            .ok_or(SourceError::NotFound)?;

        if stored.record.approval_status != VehicleApprovalStatus::Pending {
            return Err(SourceError::Rejected(format!(
                "vehicle {vehicle_id} is already {}",
                stored.record.approval_status.label().to_lowercase()
            )));
        }

        stored.record.approval_status = status;
        if status == VehicleApprovalStatus::Approved {
            stored.record.approved_by = Some("api".to_string());
        }
        ledger.decisions.push((Utc::now().date_naive(), status));
        Ok(())
    }

    fn decide_work_item(
        &self,
        work_item_id: &WorkItemId,
        vehicle_id: &VehicleId,
        status: WorkItemApprovalStatus,
    ) -> Result<(), SourceError> {
        let mut ledger = self.ledger();
        let item = ledger
            .vehicles
            .iter_mut()
            .filter(|stored| &stored.record.id == vehicle_id)
            .flat_map(|stored| stored.record.work_items.iter_mut())
            .find(|item| &item.id == work_item_id)
            .ok_or(SourceError::NotFound)?;

        if !needs_approval(item) {
            return Err(SourceError::Rejected(format!(
                "work item {work_item_id} is not awaiting approval"
            )));
        }
        item.approval_status = Some(status);
        Ok(())
    }
}

fn in_scope(scope: &DealerScope, stored: &StoredVehicle) -> bool {
    scope.dealer_id.map_or(true, |id| id == stored.dealer_id)
}

#[async_trait]
impl ApprovalDataSource for InMemoryApprovalSource {
    async fn fetch_pending_vehicles(
        &self,
        scope: &DealerScope,
    ) -> Result<Vec<VehicleApprovalRecord>, SourceError> {
        let ledger = self.ledger();
        Ok(ledger
            .vehicles
            .iter()
            .filter(|stored| in_scope(scope, stored))
            .filter(|stored| stored.record.work_items.iter().any(needs_approval))
            .map(|stored| stored.record.clone())
            .collect())
    }

    async fn fetch_approval_summary(
        &self,
        scope: &DealerScope,
    ) -> Result<SummaryCounts, SourceError> {
        let ledger = self.ledger();
        let now = Utc::now();
        let today = now.date_naive();

        let pending: Vec<&VehicleApprovalRecord> = ledger
            .vehicles
            .iter()
            .filter(|stored| in_scope(scope, stored))
            .map(|stored| &stored.record)
            .filter(|record| vehicle_needs_approval(record))
            .collect();
        let decided_today = |status: VehicleApprovalStatus| {
            ledger
                .decisions
                .iter()
                .filter(|(day, decided)| *day == today && *decided == status)
                .count() as u32
        };
        let oldest_pending_days = pending
            .iter()
            .filter_map(|record| record.intake_date)
            .map(|intake| (now - intake).num_days().max(0) as u32)
            .max()
            .unwrap_or(0);

        Ok(SummaryCounts {
            total_pending: pending.len() as u32,
            approved_today: decided_today(VehicleApprovalStatus::Approved),
            rejected_today: decided_today(VehicleApprovalStatus::Rejected),
            pending_critical: pending.iter().filter(|record| record.is_critical()).count() as u32,
            oldest_pending_days,
        })
    }

    async fn approve_vehicle(
        &self,
        vehicle_id: &VehicleId,
        notes: Option<&str>,
    ) -> Result<(), SourceError> {
        debug!(%vehicle_id, ?notes, "approving vehicle");
        self.decide_vehicle(vehicle_id, VehicleApprovalStatus::Approved)
    }

    async fn reject_vehicle(
        &self,
        vehicle_id: &VehicleId,
        reason: &str,
        notes: Option<&str>,
    ) -> Result<(), SourceError> {
        debug!(%vehicle_id, reason, ?notes, "rejecting vehicle");
        self.decide_vehicle(vehicle_id, VehicleApprovalStatus::Rejected)
    }

    async fn bulk_approve_vehicles(&self, vehicle_ids: &[VehicleId]) -> Result<(), SourceError> {
        {
            let ledger = self.ledger();
            let known: HashSet<&VehicleId> =
                ledger.vehicles.iter().map(|stored| &stored.record.id).collect();
            if let Some(missing) = vehicle_ids.iter().find(|id| !known.contains(id)) {
                warn!(vehicle_id = %missing, "bulk approval references unknown vehicle");
                return Err(SourceError::NotFound);
            }
        }

        for vehicle_id in vehicle_ids {
            self.decide_vehicle(vehicle_id, VehicleApprovalStatus::Approved)?;
        }
        Ok(())
    }

    async fn approve_work_item(
        &self,
        work_item_id: &WorkItemId,
        vehicle_id: &VehicleId,
    ) -> Result<(), SourceError> {
        self.decide_work_item(work_item_id, vehicle_id, WorkItemApprovalStatus::Approved)
    }

    async fn decline_work_item(
        &self,
        work_item_id: &WorkItemId,
        vehicle_id: &VehicleId,
        reason: &str,
    ) -> Result<(), SourceError> {
        debug!(%work_item_id, reason, "declining work item");
        self.decide_work_item(work_item_id, vehicle_id, WorkItemApprovalStatus::Declined)
    }
}

/// Fixed capability grants for a single-operator deployment.
#[derive(Debug, Default, Clone)]
pub(crate) struct StaticPermissions {
    granted: HashSet<(String, String)>,
}

impl StaticPermissions {
    pub(crate) fn granting<'a, I>(grants: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            granted: grants
                .into_iter()
                .map(|(module, action)| (module.to_string(), action.to_string()))
                .collect(),
        }
    }
}

impl CapabilityCheck for StaticPermissions {
    fn has_capability(&self, module: &str, action: &str) -> bool {
        self.granted
            .iter()
            .any(|(granted_module, granted_action)| {
                granted_module == module && granted_action == action
            })
    }
}

/// Forwards operator notifications to the log and keeps them for later display.
#[derive(Debug, Default, Clone)]
pub(crate) struct TracingNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl TracingNotifier {
    pub(crate) fn events(&self) -> Vec<Notification> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => {
                info!(title = %notification.title, "{}", notification.message)
            }
            NotificationLevel::Error => {
                warn!(title = %notification.title, "{}", notification.message)
            }
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}

fn work_item(
    id: &str,
    title: &str,
    estimated_cost: f64,
    priority: i32,
    created_at: DateTime<Utc>,
) -> WorkItemRecord {
    WorkItemRecord {
        id: WorkItemId(id.to_string()),
        title: title.to_string(),
        description: None,
        approval_required: true,
        approval_status: Some(WorkItemApprovalStatus::Pending),
        priority: Some(priority),
        estimated_cost: Some(estimated_cost),
        created_at: Some(created_at),
    }
}

#[allow(clippy::too_many_arguments)]
fn vehicle(
    id: &str,
    stock_number: &str,
    vin: &str,
    (year, make, model): (i32, &str, &str),
    intake_date: DateTime<Utc>,
    escalation_level: i32,
    step: (&str, &str),
    work_items: Vec<WorkItemRecord>,
) -> VehicleApprovalRecord {
    let total_holding_cost = work_items
        .iter()
        .filter_map(|item| item.estimated_cost)
        .sum::<f64>();
    VehicleApprovalRecord {
        id: VehicleId(id.to_string()),
        stock_number: stock_number.to_string(),
        vin: vin.to_string(),
        vehicle_year: Some(year),
        vehicle_make: Some(make.to_string()),
        vehicle_model: Some(model.to_string()),
        requires_approval: true,
        approval_status: VehicleApprovalStatus::Pending,
        approved_by: None,
        priority_score: Some(40 + escalation_level * 20),
        intake_date: Some(intake_date),
        escalation_level,
        total_holding_cost: Some(total_holding_cost),
        current_step_name: Some(step.0.to_string()),
        current_step_color: Some(step.1.to_string()),
        work_items,
    }
}

/// Demo lot spread over two dealerships, keyed by dealer id.
pub(crate) fn seeded_lot(now: DateTime<Utc>) -> Vec<(i64, VehicleApprovalRecord)> {
    let days_ago = |days: i64| now - Duration::days(days);

    let mut body_shop = vehicle(
        "veh-1001",
        "G1001",
        "1FTFW1E50PFA10001",
        (2022, "Ford", "F-150"),
        days_ago(12),
        2,
        ("Body Shop", "#ef4444"),
        vec![
            work_item("wi-1", "Repair rear bumper", 1250.0, 70, days_ago(10)),
            work_item("wi-2", "Replace tailgate camera", 380.0, 40, days_ago(9)),
        ],
    );
    body_shop.work_items[0].description = Some("Dent and paint transfer, driver side".to_string());

    let mechanical = vehicle(
        "veh-1002",
        "G1002",
        "2T1BURHE0JC010002",
        (2019, "Toyota", "Corolla"),
        days_ago(6),
        0,
        ("Mechanical", "#f59e0b"),
        vec![work_item("wi-3", "Front brake pads and rotors", 460.0, 55, days_ago(5))],
    );

    let mut detail = vehicle(
        "veh-1003",
        "G1003",
        "5YJ3E1EA7KF010003",
        (2020, "Tesla", "Model 3"),
        days_ago(3),
        1,
        ("Detail", "#3b82f6"),
        vec![
            work_item("wi-4", "Interior deep clean", 180.0, 20, days_ago(2)),
            work_item("wi-5", "Windshield chip repair", 95.0, 30, days_ago(1)),
        ],
    );
    detail.requires_approval = false;

    let second_store = vehicle(
        "veh-2001",
        "N2001",
        "1HGCV1F30LA020001",
        (2020, "Honda", "Accord"),
        days_ago(20),
        3,
        ("Inspection", "#8b5cf6"),
        vec![work_item("wi-6", "Replace timing belt", 890.0, 90, days_ago(18))],
    );

    vec![(1, body_shop), (1, mechanical), (1, detail), (2, second_store)]
}
