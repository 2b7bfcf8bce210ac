use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::config::ApprovalConfig;
use super::domain::{RejectionDraft, SummaryCounts, VehicleId};
use super::pipeline::QueueQuery;
use super::queue::{build_queue, ApprovalQueueItem, FilterType, QueueItemId};
use super::reconcile::{Decision, OptimisticPatch, QueueSnapshot};
use super::selection::SelectionSet;
use super::source::{
    ApprovalDataSource, CapabilityCheck, Notification, Notifier, SourceError,
    APPROVE_VEHICLES_ACTION, GET_READY_MODULE,
};
use super::views::ApprovalQueueView;

/// Operator session over the approval queue: cached snapshot, selection, and dispatch.
pub struct ApprovalCoordinator<S, P, N> {
    source: Arc<S>,
    permissions: Arc<P>,
    notifier: Arc<N>,
    config: ApprovalConfig,
    session: Mutex<ApprovalSession>,
}

#[derive(Debug, Default)]
struct ApprovalSession {
    snapshot: QueueSnapshot,
    selection: SelectionSet,
}

/// Counts dispatched by a successful bulk approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkApprovalOutcome {
    pub vehicles: usize,
    pub work_items: usize,
}

impl<S, P, N> ApprovalCoordinator<S, P, N>
where
    S: ApprovalDataSource + 'static,
    P: CapabilityCheck + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        source: Arc<S>,
        permissions: Arc<P>,
        notifier: Arc<N>,
        config: ApprovalConfig,
    ) -> Self {
        Self {
            source,
            permissions,
            notifier,
            config,
            session: Mutex::new(ApprovalSession::default()),
        }
    }

    pub fn config(&self) -> &ApprovalConfig {
        &self.config
    }

    fn session(&self) -> MutexGuard<'_, ApprovalSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the cached snapshot with the backend's pending vehicles.
    pub async fn refresh(&self) -> Result<usize, ApprovalError> {
        match self.source.fetch_pending_vehicles(&self.config.scope).await {
            Ok(vehicles) => {
                let count = vehicles.len();
                self.session().snapshot.replace(vehicles, Utc::now());
                info!(vehicles = count, scope = ?self.config.scope, "approval queue refreshed");
                Ok(count)
            }
            Err(err) => {
                warn!(error = %err, "failed to load pending approvals");
                self.notifier
                    .notify(Notification::error("Failed to load approvals", err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Summary tiles. A failed fetch shows zeros instead of failing the page.
    pub async fn summary(&self) -> SummaryCounts {
        match self.source.fetch_approval_summary(&self.config.scope).await {
            Ok(summary) => summary,
            Err(err) => {
                warn!(error = %err, "approval summary unavailable, showing zeros");
                SummaryCounts::default()
            }
        }
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.session().snapshot.fetched_at()
    }

    pub fn queue(&self, query: &QueueQuery, now: DateTime<Utc>) -> Vec<ApprovalQueueItem> {
        let session = self.session();
        query.run(session.snapshot.vehicles(), now)
    }

    /// Run `query` and project the rows, selection, and summary for presentation.
    pub fn view(
        &self,
        query: &QueueQuery,
        summary: SummaryCounts,
        now: DateTime<Utc>,
    ) -> ApprovalQueueView {
        let session = self.session();
        let items = query
            .run(session.snapshot.vehicles(), now)
            .iter()
            .map(|item| item.to_view(&session.selection))
            .collect();

        ApprovalQueueView {
            filter: query.filter,
            sort: query.sort,
            search: query.search.clone(),
            items,
            selected: session.selection.iter().cloned().collect(),
            summary,
            last_refreshed: session.snapshot.fetched_at(),
        }
    }

    /// Look a row up across both variants, ignoring any view filters.
    pub fn find(&self, id: &QueueItemId, now: DateTime<Utc>) -> Option<ApprovalQueueItem> {
        let session = self.session();
        build_queue(session.snapshot.vehicles(), FilterType::All, now)
            .into_iter()
            .find(|item| &item.id() == id)
    }

    pub fn toggle(&self, id: QueueItemId) -> bool {
        self.session().selection.toggle(id)
    }

    pub fn select_all(&self, visible: &[ApprovalQueueItem]) {
        self.session()
            .selection
            .select_all(visible.iter().map(ApprovalQueueItem::id));
    }

    pub fn selected(&self) -> Vec<QueueItemId> {
        self.session().selection.iter().cloned().collect()
    }

    fn require_vehicle_approval(&self) -> Result<(), ApprovalError> {
        if self
            .permissions
            .has_capability(GET_READY_MODULE, APPROVE_VEHICLES_ACTION)
        {
            return Ok(());
        }

        warn!(
            module = GET_READY_MODULE,
            action = APPROVE_VEHICLES_ACTION,
            "approval blocked by missing capability"
        );
        self.notifier.notify(Notification::error(
            "Permission denied",
            "You do not have permission to approve vehicles",
        ));
        Err(ApprovalError::PermissionDenied {
            module: GET_READY_MODULE,
            action: APPROVE_VEHICLES_ACTION,
        })
    }

    fn apply_patch(
        &self,
        id: &QueueItemId,
        vehicle_id: &VehicleId,
        decision: Decision,
    ) -> Option<OptimisticPatch> {
        self.session()
            .snapshot
            .apply(id, vehicle_id, decision, &self.config.reviewer)
    }

    fn settle(
        &self,
        id: &QueueItemId,
        patch: Option<OptimisticPatch>,
        result: Result<(), SourceError>,
        success: Notification,
        failure_title: &str,
    ) -> Result<(), ApprovalError> {
        match result {
            Ok(()) => {
                self.session().selection.remove(id);
                self.notifier.notify(success);
                Ok(())
            }
            Err(err) => {
                if let Some(patch) = patch {
                    self.session().snapshot.revert(patch);
                }
                warn!(item = %id, error = %err, "{failure_title}");
                self.notifier
                    .notify(Notification::error(failure_title, err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Approve one row. Vehicle rows require the approve-vehicles capability.
    pub async fn approve(
        &self,
        item: &ApprovalQueueItem,
        notes: Option<&str>,
    ) -> Result<(), ApprovalError> {
        let id = item.id();

        match item {
            ApprovalQueueItem::Vehicle(vehicle) => {
                self.require_vehicle_approval()?;
                let patch = self.apply_patch(&id, &vehicle.id, Decision::Approve);
                let result = self.source.approve_vehicle(&vehicle.id, notes).await;
                info!(item = %id, ok = result.is_ok(), "vehicle approval dispatched");
                self.settle(
                    &id,
                    patch,
                    result,
                    Notification::success(
                        "Vehicle approved",
                        format!("Stock #{} approved", vehicle.stock_number),
                    ),
                    "Failed to approve vehicle",
                )
            }
            ApprovalQueueItem::WorkItem(decorated) => {
                let vehicle_id = &decorated.vehicle.vehicle_id;
                let patch = self.apply_patch(&id, vehicle_id, Decision::Approve);
                let result = self
                    .source
                    .approve_work_item(&decorated.work_item.id, vehicle_id)
                    .await;
                info!(item = %id, ok = result.is_ok(), "work item approval dispatched");
                self.settle(
                    &id,
                    patch,
                    result,
                    Notification::success(
                        "Work item approved",
                        format!("{} approved", decorated.work_item.title),
                    ),
                    "Failed to approve work item",
                )
            }
        }
    }

    /// Reject a vehicle or decline a work item. The draft is consumed either way.
    pub async fn reject(
        &self,
        item: &ApprovalQueueItem,
        draft: RejectionDraft,
    ) -> Result<(), ApprovalError> {
        if !draft.can_confirm() {
            debug!(item = %item.id(), "rejection blocked until a reason is entered");
            return Err(ApprovalError::MissingRejectionReason);
        }

        let RejectionDraft { reason, notes } = draft;
        let reason = reason.trim();
        let id = item.id();

        match item {
            ApprovalQueueItem::Vehicle(vehicle) => {
                let patch = self.apply_patch(&id, &vehicle.id, Decision::Reject);
                let result = self
                    .source
                    .reject_vehicle(&vehicle.id, reason, notes.as_deref())
                    .await;
                info!(item = %id, ok = result.is_ok(), "vehicle rejection dispatched");
                self.settle(
                    &id,
                    patch,
                    result,
                    Notification::success(
                        "Vehicle rejected",
                        format!("Stock #{} rejected", vehicle.stock_number),
                    ),
                    "Failed to reject vehicle",
                )
            }
            ApprovalQueueItem::WorkItem(decorated) => {
                let vehicle_id = &decorated.vehicle.vehicle_id;
                let patch = self.apply_patch(&id, vehicle_id, Decision::Reject);
                let result = self
                    .source
                    .decline_work_item(&decorated.work_item.id, vehicle_id, reason)
                    .await;
                info!(item = %id, ok = result.is_ok(), "work item decline dispatched");
                self.settle(
                    &id,
                    patch,
                    result,
                    Notification::success(
                        "Work item declined",
                        format!("{} declined", decorated.work_item.title),
                    ),
                    "Failed to decline work item",
                )
            }
        }
    }

    /// Approve every selected row that is visible in `visible`.
    ///
    /// Vehicles go out as one batched call and work items as one call each, all awaited together.
    /// Any failure fails the whole action and keeps the failed rows selected; sub-operations that
    /// succeeded are deselected but not rolled back on the backend.
    pub async fn bulk_approve(
        &self,
        visible: &[ApprovalQueueItem],
    ) -> Result<BulkApprovalOutcome, ApprovalError> {
        self.require_vehicle_approval()?;

        let (partition, vehicle_patches, work_item_patches) = {
            let mut session = self.session();
            let partition = session.selection.partition(visible);
            if partition.is_empty() {
                return Err(ApprovalError::EmptySelection);
            }

            let reviewer = self.config.reviewer.as_str();
            let vehicle_patches: Vec<_> = partition
                .vehicles
                .iter()
                .map(|vehicle_id| {
                    let id = QueueItemId::Vehicle(vehicle_id.clone());
                    session
                        .snapshot
                        .apply(&id, vehicle_id, Decision::Approve, reviewer)
                })
                .collect();
            let work_item_patches: Vec<_> = partition
                .work_items
                .iter()
                .map(|(work_item_id, vehicle_id)| {
                    let id = QueueItemId::WorkItem(work_item_id.clone());
                    session
                        .snapshot
                        .apply(&id, vehicle_id, Decision::Approve, reviewer)
                })
                .collect();

            (partition, vehicle_patches, work_item_patches)
        };

        let attempted = partition.len();
        let vehicle_call = async {
            if partition.vehicles.is_empty() {
                Ok(())
            } else {
                self.source.bulk_approve_vehicles(&partition.vehicles).await
            }
        };
        let work_item_calls = join_all(
            partition
                .work_items
                .iter()
                .map(|(work_item_id, vehicle_id)| {
                    self.source.approve_work_item(work_item_id, vehicle_id)
                }),
        );
        let (vehicle_result, work_item_results) = tokio::join!(vehicle_call, work_item_calls);

        let mut failed = 0;
        let mut first_error = None;
        {
            let mut session = self.session();

            let mut settled = Vec::new();

            match vehicle_result {
                Ok(()) => settled.extend(
                    partition
                        .vehicles
                        .iter()
                        .map(|vehicle_id| QueueItemId::Vehicle(vehicle_id.clone())),
                ),
                Err(err) => {
                    failed += partition.vehicles.len();
                    first_error.get_or_insert(err);
                    for patch in vehicle_patches.into_iter().flatten() {
                        session.snapshot.revert(patch);
                    }
                }
            }

            let work_item_outcomes = partition
                .work_items
                .iter()
                .zip(work_item_results)
                .zip(work_item_patches);
            for (((work_item_id, _), result), patch) in work_item_outcomes {
                match result {
                    Ok(()) => settled.push(QueueItemId::WorkItem(work_item_id.clone())),
                    Err(err) => {
                        failed += 1;
                        first_error.get_or_insert(err);
                        if let Some(patch) = patch {
                            session.snapshot.revert(patch);
                        }
                    }
                }
            }

            if failed == 0 {
                session.selection.clear();
            } else {
                // Approved rows have left the queue; only the failed ones stay checked.
                for id in &settled {
                    session.selection.remove(id);
                }
            }
        }

        match first_error {
            None => {
                let outcome = BulkApprovalOutcome {
                    vehicles: partition.vehicles.len(),
                    work_items: partition.work_items.len(),
                };
                info!(
                    vehicles = outcome.vehicles,
                    work_items = outcome.work_items,
                    "bulk approval completed"
                );
                self.notifier.notify(Notification::success(
                    "Bulk approval complete",
                    format!("{attempted} items approved"),
                ));
                Ok(outcome)
            }
            Some(err) => {
                warn!(failed, attempted, error = %err, "bulk approval failed");
                self.notifier.notify(Notification::error(
                    "Bulk approval failed",
                    format!("Some items could not be approved: {err}"),
                ));
                Err(ApprovalError::BulkApprovalFailed { failed, attempted })
            }
        }
    }
}

/// Error raised by the approval coordinator.
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("missing {module}.{action} permission")]
    PermissionDenied {
        module: &'static str,
        action: &'static str,
    },
    #[error("a rejection reason is required")]
    MissingRejectionReason,
    #[error("no queue items selected")]
    EmptySelection,
    #[error("queue item {0} is not awaiting approval")]
    UnknownQueueItem(QueueItemId),
    #[error("bulk approval failed for {failed} of {attempted} items")]
    BulkApprovalFailed { failed: usize, attempted: usize },
}
