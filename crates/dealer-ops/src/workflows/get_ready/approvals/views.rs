use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{SummaryCounts, VehicleApprovalRecord, VehicleId, WorkItemRecord};
use super::pipeline::SortBy;
use super::queue::{ApprovalQueueItem, FilterType, QueueItemId};
use super::selection::SelectionSet;

#[derive(Debug, Clone, Serialize)]
pub struct QueueItemView {
    pub id: QueueItemId,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    pub is_critical: bool,
    pub selected: bool,
    #[serde(flatten)]
    pub detail: QueueItemDetail,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueItemDetail {
    Vehicle {
        vehicle: VehicleApprovalRecord,
        vehicle_info: String,
        status_label: &'static str,
    },
    WorkItem {
        work_item: WorkItemRecord,
        vehicle_id: VehicleId,
        vehicle_stock_number: String,
        vehicle_info: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        vehicle_step: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        vehicle_step_color: Option<String>,
    },
}

impl ApprovalQueueItem {
    pub fn to_view(&self, selection: &SelectionSet) -> QueueItemView {
        let id = self.id();
        let detail = match self {
            Self::Vehicle(vehicle) => QueueItemDetail::Vehicle {
                vehicle_info: vehicle.vehicle_info(),
                status_label: vehicle.approval_status.label(),
                vehicle: vehicle.clone(),
            },
            Self::WorkItem(item) => QueueItemDetail::WorkItem {
                work_item: item.work_item.clone(),
                vehicle_id: item.vehicle.vehicle_id.clone(),
                vehicle_stock_number: item.vehicle.vehicle_stock_number.clone(),
                vehicle_info: item.vehicle.vehicle_info(),
                vehicle_step: item.vehicle.vehicle_step.clone(),
                vehicle_step_color: item.vehicle.vehicle_step_color.clone(),
            },
        };

        QueueItemView {
            selected: selection.contains(&id),
            id,
            priority: self.priority(),
            created_at: self.created_at(),
            is_critical: self.is_critical(),
            detail,
        }
    }
}

/// Everything the approvals tab renders for one query.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalQueueView {
    pub filter: FilterType,
    pub sort: SortBy,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub search: String,
    pub items: Vec<QueueItemView>,
    pub selected: Vec<QueueItemId>,
    pub summary: SummaryCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refreshed: Option<DateTime<Utc>>,
}
