use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::get_ready::approvals::domain::{
    DealerScope, SummaryCounts, VehicleApprovalRecord, VehicleApprovalStatus, VehicleId,
    WorkItemApprovalStatus, WorkItemId, WorkItemRecord,
};
use crate::workflows::get_ready::approvals::source::{
    ApprovalDataSource, CapabilityCheck, Notification, NotificationLevel, Notifier, SourceError,
};
use crate::workflows::get_ready::approvals::{ApprovalConfig, ApprovalCoordinator};

pub(super) fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn now() -> DateTime<Utc> {
    at(20, 12)
}

pub(super) fn work_item(id: &str, title: &str) -> WorkItemRecord {
    WorkItemRecord {
        id: WorkItemId(id.to_string()),
        title: title.to_string(),
        description: None,
        approval_required: true,
        approval_status: None,
        priority: None,
        estimated_cost: None,
        created_at: None,
    }
}

pub(super) fn decided_work_item(id: &str, status: WorkItemApprovalStatus) -> WorkItemRecord {
    WorkItemRecord {
        approval_status: Some(status),
        ..work_item(id, "Already handled")
    }
}

pub(super) fn vehicle(
    id: &str,
    stock_number: &str,
    items: Vec<WorkItemRecord>,
) -> VehicleApprovalRecord {
    VehicleApprovalRecord {
        id: VehicleId(id.to_string()),
        stock_number: stock_number.to_string(),
        vin: format!("1HGCM82633A{stock_number}"),
        vehicle_year: Some(2021),
        vehicle_make: Some("Honda".to_string()),
        vehicle_model: Some("Accord".to_string()),
        requires_approval: true,
        approval_status: VehicleApprovalStatus::Pending,
        approved_by: None,
        priority_score: None,
        intake_date: Some(at(1, 9)),
        escalation_level: 0,
        total_holding_cost: None,
        current_step_name: Some("Mechanical".to_string()),
        current_step_color: Some("#f59e0b".to_string()),
        work_items: items,
    }
}

/// Two approval-ready vehicles, each with one pending work item, plus a vehicle that does not
/// need sign-off but still has a pending work item.
pub(super) fn lot() -> Vec<VehicleApprovalRecord> {
    let mut critical = vehicle("V1", "A1001", vec![work_item("W1", "Replace front brakes")]);
    critical.escalation_level = 2;
    critical.priority_score = Some(80);
    critical.total_holding_cost = Some(1450.0);

    let mut routine = vehicle("V2", "A1002", vec![work_item("W2", "Detail interior")]);
    routine.vehicle_make = Some("Toyota".to_string());
    routine.vehicle_model = Some("Camry".to_string());
    routine.intake_date = Some(at(5, 9));
    routine.priority_score = Some(20);
    routine.total_holding_cost = Some(300.0);

    let mut no_signoff = vehicle("V3", "A1003", vec![work_item("W3", "Windshield chip")]);
    no_signoff.requires_approval = false;

    vec![critical, routine, no_signoff]
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum SourceCall {
    ApproveVehicle(VehicleId, Option<String>),
    RejectVehicle(VehicleId, String, Option<String>),
    BulkApproveVehicles(Vec<VehicleId>),
    ApproveWorkItem(WorkItemId, VehicleId),
    DeclineWorkItem(WorkItemId, VehicleId, String),
}

/// In-memory backend that records every mutation and can be told to fail.
#[derive(Default)]
pub(super) struct MemorySource {
    vehicles: Mutex<Vec<VehicleApprovalRecord>>,
    calls: Mutex<Vec<SourceCall>>,
    failing_work_items: Mutex<HashSet<WorkItemId>>,
    fail_fetch: AtomicBool,
    fail_summary: AtomicBool,
    fail_vehicle_mutations: AtomicBool,
}

impl MemorySource {
    pub(super) fn with_vehicles(vehicles: Vec<VehicleApprovalRecord>) -> Self {
        Self {
            vehicles: Mutex::new(vehicles),
            ..Self::default()
        }
    }

    pub(super) fn calls(&self) -> Vec<SourceCall> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    pub(super) fn fail_work_item(&self, id: &str) {
        self.failing_work_items
            .lock()
            .expect("failure mutex poisoned")
            .insert(WorkItemId(id.to_string()));
    }

    pub(super) fn fail_fetches(&self) {
        self.fail_fetch.store(true, Ordering::SeqCst);
    }

    pub(super) fn fail_summary(&self) {
        self.fail_summary.store(true, Ordering::SeqCst);
    }

    pub(super) fn fail_vehicle_mutations(&self) {
        self.fail_vehicle_mutations.store(true, Ordering::SeqCst);
    }

    fn record(&self, call: SourceCall) {
        self.calls.lock().expect("calls mutex poisoned").push(call);
    }

    fn vehicle_guard(&self) -> Result<(), SourceError> {
        if self.fail_vehicle_mutations.load(Ordering::SeqCst) {
            Err(SourceError::Unavailable("vehicle endpoint offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn update_vehicle(&self, id: &VehicleId, status: VehicleApprovalStatus) {
        let mut vehicles = self.vehicles.lock().expect("vehicle mutex poisoned");
        if let Some(vehicle) = vehicles.iter_mut().find(|vehicle| &vehicle.id == id) {
            vehicle.approval_status = status;
            if status == VehicleApprovalStatus::Approved {
                vehicle.approved_by = Some("backend".to_string());
            }
        }
    }

    fn update_work_item(&self, id: &WorkItemId, status: WorkItemApprovalStatus) {
        let mut vehicles = self.vehicles.lock().expect("vehicle mutex poisoned");
        for vehicle in vehicles.iter_mut() {
            for item in vehicle.work_items.iter_mut().filter(|item| &item.id == id) {
                item.approval_status = Some(status);
            }
        }
    }
}

#[async_trait]
impl ApprovalDataSource for MemorySource {
    async fn fetch_pending_vehicles(
        &self,
        _scope: &DealerScope,
    ) -> Result<Vec<VehicleApprovalRecord>, SourceError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("database offline".to_string()));
        }
        Ok(self.vehicles.lock().expect("vehicle mutex poisoned").clone())
    }

    async fn fetch_approval_summary(
        &self,
        _scope: &DealerScope,
    ) -> Result<SummaryCounts, SourceError> {
        if self.fail_summary.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("rpc timeout".to_string()));
        }
        Ok(SummaryCounts {
            total_pending: 3,
            approved_today: 1,
            rejected_today: 0,
            pending_critical: 1,
            oldest_pending_days: 19,
        })
    }

    async fn approve_vehicle(
        &self,
        vehicle_id: &VehicleId,
        notes: Option<&str>,
    ) -> Result<(), SourceError> {
        self.record(SourceCall::ApproveVehicle(
            vehicle_id.clone(),
            notes.map(str::to_string),
        ));
        self.vehicle_guard()?;
        self.update_vehicle(vehicle_id, VehicleApprovalStatus::Approved);
        Ok(())
    }

    async fn reject_vehicle(
        &self,
        vehicle_id: &VehicleId,
        reason: &str,
        notes: Option<&str>,
    ) -> Result<(), SourceError> {
        self.record(SourceCall::RejectVehicle(
            vehicle_id.clone(),
            reason.to_string(),
            notes.map(str::to_string),
        ));
        self.vehicle_guard()?;
        self.update_vehicle(vehicle_id, VehicleApprovalStatus::Rejected);
        Ok(())
    }

    async fn bulk_approve_vehicles(&self, vehicle_ids: &[VehicleId]) -> Result<(), SourceError> {
        self.record(SourceCall::BulkApproveVehicles(vehicle_ids.to_vec()));
        self.vehicle_guard()?;
        for id in vehicle_ids {
            self.update_vehicle(id, VehicleApprovalStatus::Approved);
        }
        Ok(())
    }

    async fn approve_work_item(
        &self,
        work_item_id: &WorkItemId,
        vehicle_id: &VehicleId,
    ) -> Result<(), SourceError> {
        self.record(SourceCall::ApproveWorkItem(
            work_item_id.clone(),
            vehicle_id.clone(),
        ));
        if self
            .failing_work_items
            .lock()
            .expect("failure mutex poisoned")
            .contains(work_item_id)
        {
            return Err(SourceError::Rejected("work item locked".to_string()));
        }
        self.update_work_item(work_item_id, WorkItemApprovalStatus::Approved);
        Ok(())
    }

    async fn decline_work_item(
        &self,
        work_item_id: &WorkItemId,
        vehicle_id: &VehicleId,
        reason: &str,
    ) -> Result<(), SourceError> {
        self.record(SourceCall::DeclineWorkItem(
            work_item_id.clone(),
            vehicle_id.clone(),
            reason.to_string(),
        ));
        self.update_work_item(work_item_id, WorkItemApprovalStatus::Declined);
        Ok(())
    }
}

pub(super) struct Permissions {
    approve_vehicles: bool,
}

impl Permissions {
    pub(super) fn granted() -> Self {
        Self {
            approve_vehicles: true,
        }
    }

    pub(super) fn denied() -> Self {
        Self {
            approve_vehicles: false,
        }
    }
}

impl CapabilityCheck for Permissions {
    fn has_capability(&self, module: &str, action: &str) -> bool {
        self.approve_vehicles && module == "get_ready" && action == "approve_vehicles"
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    events: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn errors(&self) -> Vec<Notification> {
        self.events()
            .into_iter()
            .filter(|event| event.level == NotificationLevel::Error)
            .collect()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: Notification) {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
    }
}

pub(super) type TestCoordinator = ApprovalCoordinator<MemorySource, Permissions, MemoryNotifier>;

pub(super) struct Harness {
    pub(super) coordinator: Arc<TestCoordinator>,
    pub(super) source: Arc<MemorySource>,
    pub(super) notifier: Arc<MemoryNotifier>,
}

pub(super) fn harness_with(
    vehicles: Vec<VehicleApprovalRecord>,
    permissions: Permissions,
) -> Harness {
    let source = Arc::new(MemorySource::with_vehicles(vehicles));
    let notifier = Arc::new(MemoryNotifier::default());
    let coordinator = Arc::new(ApprovalCoordinator::new(
        source.clone(),
        Arc::new(permissions),
        notifier.clone(),
        ApprovalConfig::default(),
    ));
    Harness {
        coordinator,
        source,
        notifier,
    }
}

pub(super) async fn loaded_harness(permissions: Permissions) -> Harness {
    let harness = harness_with(lot(), permissions);
    harness
        .coordinator
        .refresh()
        .await
        .expect("fixture snapshot loads");
    harness
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
