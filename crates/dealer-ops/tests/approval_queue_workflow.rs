//! Integration specifications for the get-ready approval queue.
//!
//! Scenarios drive the public coordinator and HTTP router against a scripted backend, covering
//! queue assembly, selection, and decision dispatch without reaching into private modules.

mod common {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;

    use dealer_ops::workflows::get_ready::approvals::{
        ApprovalDataSource, CapabilityCheck, DealerScope, Notification, Notifier, SourceError,
        SummaryCounts, VehicleApprovalRecord, VehicleApprovalStatus, VehicleId,
        WorkItemApprovalStatus, WorkItemId,
    };

    pub(super) fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 15, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    /// Backend export as the dealership database returns it.
    pub(super) fn export() -> Vec<VehicleApprovalRecord> {
        serde_json::from_value(json!([
            {
                "id": "V1",
                "stock_number": "A1001",
                "vin": "1FTFW1E50PFA00001",
                "vehicle_year": 2022,
                "vehicle_make": "Ford",
                "vehicle_model": "F-150",
                "requires_approval": true,
                "approval_status": "pending",
                "priority_score": 85,
                "intake_date": "2025-05-20T09:00:00Z",
                "escalation_level": 2,
                "total_holding_cost": 2150.0,
                "current_step_name": "Body Shop",
                "work_items": [
                    {
                        "id": "W1",
                        "title": "Repair rear bumper",
                        "approval_required": true,
                        "approval_status": "pending",
                        "priority": 60,
                        "estimated_cost": 1250.0,
                        "created_at": "2025-05-21T10:00:00Z"
                    }
                ]
            },
            {
                "id": "V2",
                "stock_number": "A1002",
                "vehicle_year": 2019,
                "vehicle_make": "Toyota",
                "vehicle_model": "Corolla",
                "requires_approval": false,
                "work_items": [
                    {
                        "id": "W2",
                        "title": "Front brake pads",
                        "approval_required": true,
                        "estimated_cost": 460.0,
                        "created_at": "2025-05-28T08:00:00Z"
                    }
                ]
            },
            {
                "id": "V3",
                "stock_number": "A1003",
                "vehicle_make": "Honda",
                "vehicle_model": "Civic",
                "requires_approval": true,
                "intake_date": "2025-05-30T09:00:00Z",
                "priority_score": 30,
                "total_holding_cost": 95.0,
                "work_items": [
                    {
                        "id": "W3",
                        "title": "Windshield chip",
                        "approval_required": true,
                        "estimated_cost": 95.0
                    }
                ]
            }
        ]))
        .expect("export fixture parses")
    }

    #[derive(Debug, Default)]
    pub(super) struct ScriptedSource {
        vehicles: Mutex<Vec<VehicleApprovalRecord>>,
        failing_work_items: HashSet<WorkItemId>,
        mutations: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        pub(super) fn new(vehicles: Vec<VehicleApprovalRecord>) -> Self {
            Self {
                vehicles: Mutex::new(vehicles),
                ..Self::default()
            }
        }

        pub(super) fn failing_on(mut self, work_item: &str) -> Self {
            self.failing_work_items
                .insert(WorkItemId(work_item.to_string()));
            self
        }

        pub(super) fn mutations(&self) -> Vec<String> {
            self.mutations.lock().expect("mutation log").clone()
        }

        fn log(&self, entry: String) {
            self.mutations.lock().expect("mutation log").push(entry);
        }

        fn set_vehicle(&self, id: &VehicleId, status: VehicleApprovalStatus) {
            let mut vehicles = self.vehicles.lock().expect("vehicle store");
            if let Some(vehicle) = vehicles.iter_mut().find(|vehicle| &vehicle.id == id) {
                vehicle.approval_status = status;
            }
        }

        fn set_work_item(&self, id: &WorkItemId, status: WorkItemApprovalStatus) {
            let mut vehicles = self.vehicles.lock().expect("vehicle store");
            for item in vehicles
                .iter_mut()
                .flat_map(|vehicle| vehicle.work_items.iter_mut())
                .filter(|item| &item.id == id)
            {
                item.approval_status = Some(status);
            }
        }
    }

    #[async_trait]
    impl ApprovalDataSource for ScriptedSource {
        async fn fetch_pending_vehicles(
            &self,
            _scope: &DealerScope,
        ) -> Result<Vec<VehicleApprovalRecord>, SourceError> {
            Ok(self.vehicles.lock().expect("vehicle store").clone())
        }

        async fn fetch_approval_summary(
            &self,
            _scope: &DealerScope,
        ) -> Result<SummaryCounts, SourceError> {
            Err(SourceError::Unavailable("summary rpc missing".to_string()))
        }

        async fn approve_vehicle(
            &self,
            vehicle_id: &VehicleId,
            _notes: Option<&str>,
        ) -> Result<(), SourceError> {
            self.log(format!("approve_vehicle:{vehicle_id}"));
            self.set_vehicle(vehicle_id, VehicleApprovalStatus::Approved);
            Ok(())
        }

        async fn reject_vehicle(
            &self,
            vehicle_id: &VehicleId,
            reason: &str,
            _notes: Option<&str>,
        ) -> Result<(), SourceError> {
            self.log(format!("reject_vehicle:{vehicle_id}:{reason}"));
            self.set_vehicle(vehicle_id, VehicleApprovalStatus::Rejected);
            Ok(())
        }

        async fn bulk_approve_vehicles(
            &self,
            vehicle_ids: &[VehicleId],
        ) -> Result<(), SourceError> {
            let joined: Vec<String> = vehicle_ids.iter().map(ToString::to_string).collect();
            self.log(format!("bulk_approve_vehicles:{}", joined.join(",")));
            for id in vehicle_ids {
                self.set_vehicle(id, VehicleApprovalStatus::Approved);
            }
            Ok(())
        }

        async fn approve_work_item(
            &self,
            work_item_id: &WorkItemId,
            vehicle_id: &VehicleId,
        ) -> Result<(), SourceError> {
            self.log(format!("approve_work_item:{work_item_id}@{vehicle_id}"));
            if self.failing_work_items.contains(work_item_id) {
                return Err(SourceError::Rejected("work item is locked".to_string()));
            }
            self.set_work_item(work_item_id, WorkItemApprovalStatus::Approved);
            Ok(())
        }

        async fn decline_work_item(
            &self,
            work_item_id: &WorkItemId,
            vehicle_id: &VehicleId,
            reason: &str,
        ) -> Result<(), SourceError> {
            self.log(format!("decline_work_item:{work_item_id}@{vehicle_id}:{reason}"));
            self.set_work_item(work_item_id, WorkItemApprovalStatus::Declined);
            Ok(())
        }
    }

    pub(super) struct Manager;

    impl CapabilityCheck for Manager {
        fn has_capability(&self, module: &str, action: &str) -> bool {
            module == "get_ready" && action == "approve_vehicles"
        }
    }

    #[derive(Default)]
    pub(super) struct Inbox {
        received: Mutex<Vec<Notification>>,
    }

    impl Inbox {
        pub(super) fn titles(&self) -> Vec<String> {
            self.received
                .lock()
                .expect("inbox")
                .iter()
                .map(|notification| notification.title.clone())
                .collect()
        }
    }

    impl Notifier for Inbox {
        fn notify(&self, notification: Notification) {
            self.received.lock().expect("inbox").push(notification);
        }
    }
}

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;
use dealer_ops::workflows::get_ready::approvals::{
    approval_router, ApprovalConfig, ApprovalCoordinator, ApprovalError, ApprovalQueueItem,
    FilterType, QueueItemId, QueueQuery, SortBy, SummaryCounts, VehicleId, WorkItemId,
};

type Coordinator = ApprovalCoordinator<ScriptedSource, Manager, Inbox>;

async fn session(source: ScriptedSource) -> (Arc<Coordinator>, Arc<ScriptedSource>, Arc<Inbox>) {
    let source = Arc::new(source);
    let inbox = Arc::new(Inbox::default());
    let coordinator = Arc::new(ApprovalCoordinator::new(
        source.clone(),
        Arc::new(Manager),
        inbox.clone(),
        ApprovalConfig::default(),
    ));
    coordinator.refresh().await.expect("export loads");
    (coordinator, source, inbox)
}

fn ids(queue: &[ApprovalQueueItem]) -> Vec<String> {
    queue.iter().map(|item| item.id().to_string()).collect()
}

#[tokio::test]
async fn default_queue_orders_both_variants_oldest_first() {
    let (coordinator, _, _) = session(ScriptedSource::new(export())).await;

    let queue = coordinator.queue(&QueueQuery::default(), now());

    assert_eq!(
        ids(&queue),
        vec![
            "vehicle:V1",
            "work_item:W1",
            "work_item:W2",
            "vehicle:V3",
            "work_item:W3"
        ]
    );
    assert!(queue[0].is_critical());
    assert_eq!(queue[4].created_at(), now(), "undated work items queue at evaluation time");
}

#[tokio::test]
async fn query_parameters_deserialize_with_defaults() {
    let (coordinator, _, _) = session(ScriptedSource::new(export())).await;
    let query: QueueQuery =
        serde_json::from_value(json!({ "search": "CIVIC", "sort": "cost" })).expect("query");

    assert_eq!(query.filter, FilterType::All);
    assert_eq!(query.sort, SortBy::Cost);
    assert_eq!(ids(&coordinator.queue(&query, now())), vec!["vehicle:V3"]);
}

#[tokio::test]
async fn summary_falls_back_to_zero_counts() {
    let (coordinator, _, inbox) = session(ScriptedSource::new(export())).await;

    assert_eq!(coordinator.summary().await, SummaryCounts::default());
    assert!(inbox.titles().is_empty());
}

#[tokio::test]
async fn bulk_approval_of_visible_rows_clears_them_from_the_queue() {
    let (coordinator, source, inbox) = session(ScriptedSource::new(export())).await;
    let visible = coordinator.queue(&QueueQuery::default(), now());
    coordinator.select_all(&visible);

    let outcome = coordinator
        .bulk_approve(&visible)
        .await
        .expect("bulk approval");

    assert_eq!((outcome.vehicles, outcome.work_items), (2, 3));
    let mutations = source.mutations();
    assert_eq!(mutations.len(), 4);
    assert!(mutations.contains(&"bulk_approve_vehicles:V1,V3".to_string()));
    assert!(mutations.contains(&"approve_work_item:W2@V2".to_string()));
    assert!(coordinator.selected().is_empty());
    assert!(coordinator.queue(&QueueQuery::default(), now()).is_empty());
    assert_eq!(inbox.titles(), vec!["Bulk approval complete"]);

    coordinator.refresh().await.expect("reload");
    assert!(coordinator.queue(&QueueQuery::default(), now()).is_empty());
}

#[tokio::test]
async fn failed_work_item_keeps_the_selection_for_retry() {
    let (coordinator, _, inbox) =
        session(ScriptedSource::new(export()).failing_on("W1")).await;
    let visible = coordinator.queue(
        &QueueQuery::new(FilterType::WorkItems, "", SortBy::Oldest),
        now(),
    );
    coordinator.select_all(&visible);

    let result = coordinator.bulk_approve(&visible).await;

    assert!(matches!(
        result,
        Err(ApprovalError::BulkApprovalFailed {
            failed: 1,
            attempted: 3
        })
    ));
    assert_eq!(
        coordinator.selected(),
        vec![QueueItemId::WorkItem(WorkItemId("W1".to_string()))]
    );
    let remaining = coordinator.queue(
        &QueueQuery::new(FilterType::WorkItems, "", SortBy::Oldest),
        now(),
    );
    assert_eq!(ids(&remaining), vec!["work_item:W1"]);
    assert_eq!(inbox.titles(), vec!["Bulk approval failed"]);
}

#[tokio::test]
async fn http_session_rejects_and_approves_rows() {
    let (coordinator, source, _) = session(ScriptedSource::new(export())).await;
    let router = approval_router(coordinator.clone());
    let post = |uri: &str, payload: Value| {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .expect("request")
    };

    let rejected = router
        .clone()
        .oneshot(post(
            "/api/v1/get-ready/approvals/reject",
            json!({
                "item": { "type": "vehicle", "id": "V3" },
                "reason": "Flood title",
                "notes": "Send to auction"
            }),
        ))
        .await
        .expect("reject response");
    assert_eq!(rejected.status(), StatusCode::OK);

    let approved = router
        .clone()
        .oneshot(post(
            "/api/v1/get-ready/approvals/approve",
            json!({ "item": { "type": "work_item", "id": "W2" } }),
        ))
        .await
        .expect("approve response");
    assert_eq!(approved.status(), StatusCode::OK);

    let repeated = router
        .oneshot(post(
            "/api/v1/get-ready/approvals/approve",
            json!({ "item": { "type": "work_item", "id": "W2" } }),
        ))
        .await
        .expect("repeat response");
    assert_eq!(repeated.status(), StatusCode::NOT_FOUND);

    assert_eq!(
        source.mutations(),
        vec![
            "reject_vehicle:V3:Flood title".to_string(),
            "approve_work_item:W2@V2".to_string(),
        ]
    );
    assert!(coordinator
        .find(&QueueItemId::Vehicle(VehicleId("V3".to_string())), now())
        .is_none());
    assert!(coordinator
        .find(&QueueItemId::WorkItem(WorkItemId("W3".to_string())), now())
        .is_some());
}
