use async_trait::async_trait;
use serde::Serialize;

use super::domain::{DealerScope, SummaryCounts, VehicleApprovalRecord, VehicleId, WorkItemId};

/// Permission module guarding Get Ready approvals.
pub const GET_READY_MODULE: &str = "get_ready";
/// Action required before approving vehicles, singly or in bulk.
pub const APPROVE_VEHICLES_ACTION: &str = "approve_vehicles";

/// Backend access for the approval queue. Implementations wrap the managed database client.
#[async_trait]
pub trait ApprovalDataSource: Send + Sync {
    async fn fetch_pending_vehicles(
        &self,
        scope: &DealerScope,
    ) -> Result<Vec<VehicleApprovalRecord>, SourceError>;

    async fn fetch_approval_summary(&self, scope: &DealerScope)
        -> Result<SummaryCounts, SourceError>;

    async fn approve_vehicle(
        &self,
        vehicle_id: &VehicleId,
        notes: Option<&str>,
    ) -> Result<(), SourceError>;

    async fn reject_vehicle(
        &self,
        vehicle_id: &VehicleId,
        reason: &str,
        notes: Option<&str>,
    ) -> Result<(), SourceError>;

    async fn bulk_approve_vehicles(&self, vehicle_ids: &[VehicleId]) -> Result<(), SourceError>;

    async fn approve_work_item(
        &self,
        work_item_id: &WorkItemId,
        vehicle_id: &VehicleId,
    ) -> Result<(), SourceError>;

    async fn decline_work_item(
        &self,
        work_item_id: &WorkItemId,
        vehicle_id: &VehicleId,
        reason: &str,
    ) -> Result<(), SourceError>;
}

/// Error enumeration for backend failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("record not found")]
    NotFound,
    #[error("backend rejected the request: {0}")]
    Rejected(String),
}

/// Permission gate consulted before privileged actions.
pub trait CapabilityCheck: Send + Sync {
    fn has_capability(&self, module: &str, action: &str) -> bool;
}

/// Outbound user-visible notifications (toasts in the web client).
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}
