use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    DecoratedWorkItem, VehicleApprovalRecord, VehicleContext, VehicleId, WorkItemId,
};
use super::eligibility::{pending_work_items, vehicle_needs_approval};

/// Identifier of a queue row. Vehicle and work-item ids live in separate namespaces.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum QueueItemId {
    Vehicle(VehicleId),
    WorkItem(WorkItemId),
}

impl fmt::Display for QueueItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vehicle(id) => write!(f, "vehicle:{id}"),
            Self::WorkItem(id) => write!(f, "work_item:{id}"),
        }
    }
}

/// One row of the approval queue.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalQueueItem {
    Vehicle(VehicleApprovalRecord),
    WorkItem(DecoratedWorkItem),
}

impl ApprovalQueueItem {
    pub fn id(&self) -> QueueItemId {
        match self {
            Self::Vehicle(vehicle) => QueueItemId::Vehicle(vehicle.id.clone()),
            Self::WorkItem(item) => QueueItemId::WorkItem(item.work_item.id.clone()),
        }
    }

    pub fn priority(&self) -> i32 {
        match self {
            Self::Vehicle(vehicle) => vehicle.priority_score.unwrap_or(0),
            Self::WorkItem(item) => item.work_item.priority.unwrap_or(0),
        }
    }

    /// Vehicles order by intake date (epoch when unknown), work items by their queue time.
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::Vehicle(vehicle) => vehicle
                .intake_date
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            Self::WorkItem(item) => item.queued_at,
        }
    }

    pub fn is_critical(&self) -> bool {
        match self {
            Self::Vehicle(vehicle) => vehicle.is_critical(),
            Self::WorkItem(_) => false,
        }
    }

    pub fn is_vehicle(&self) -> bool {
        matches!(self, Self::Vehicle(_))
    }

    /// Vehicle the row belongs to, for either variant.
    pub fn vehicle_id(&self) -> &VehicleId {
        match self {
            Self::Vehicle(vehicle) => &vehicle.id,
            Self::WorkItem(item) => &item.vehicle.vehicle_id,
        }
    }
}

/// Queue type filter selected in the approvals tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    #[default]
    All,
    Vehicles,
    WorkItems,
    Critical,
}

impl FilterType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Vehicles => "vehicles",
            Self::WorkItems => "work_items",
            Self::Critical => "critical",
        }
    }

    /// Critical narrows after the fact, so it draws from both branches.
    fn includes_vehicles(self) -> bool {
        matches!(self, Self::All | Self::Vehicles | Self::Critical)
    }

    fn includes_work_items(self) -> bool {
        matches!(self, Self::All | Self::WorkItems | Self::Critical)
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterType {
    type Err = UnknownOption;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "vehicles" => Ok(Self::Vehicles),
            "work_items" | "work-items" => Ok(Self::WorkItems),
            "critical" => Ok(Self::Critical),
            _ => Err(UnknownOption {
                kind: "filter",
                value: value.to_string(),
            }),
        }
    }
}

/// Raised when a filter or sort name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownOption {
    pub kind: &'static str,
    pub value: String,
}

/// Merge vehicle rows and work-item rows into one queue.
///
/// Vehicle rows come first, then work-item rows, each in source order. A vehicle may contribute
/// its own row as well as rows for its pending work items. `now` stamps work items that arrive
/// without a creation time.
pub fn build_queue(
    vehicles: &[VehicleApprovalRecord],
    filter: FilterType,
    now: DateTime<Utc>,
) -> Vec<ApprovalQueueItem> {
    let mut queue = Vec::new();

    if filter.includes_vehicles() {
        queue.extend(
            vehicles
                .iter()
                .filter(|vehicle| vehicle_needs_approval(vehicle))
                .cloned()
                .map(ApprovalQueueItem::Vehicle),
        );
    }

    if filter.includes_work_items() {
        for vehicle in vehicles {
            let context = VehicleContext::from_vehicle(vehicle);
            queue.extend(pending_work_items(vehicle).map(|item| {
                ApprovalQueueItem::WorkItem(DecoratedWorkItem {
                    work_item: item.clone(),
                    vehicle: context.clone(),
                    queued_at: item.created_at.unwrap_or(now),
                })
            }));
        }
    }

    queue
}
