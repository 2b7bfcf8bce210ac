use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for vehicles tracked by the Get Ready workflow.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub String);

/// Identifier wrapper for reconditioning work items.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemId(pub String);

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Dealership the queue is scoped to. `None` means every dealership the caller can see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealerScope {
    pub dealer_id: Option<i64>,
}

impl DealerScope {
    pub const fn all() -> Self {
        Self { dealer_id: None }
    }

    pub const fn dealer(dealer_id: i64) -> Self {
        Self {
            dealer_id: Some(dealer_id),
        }
    }
}

/// Vehicle-level approval decision as recorded by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl VehicleApprovalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }
}

/// Work-item approval decision. Absent on items that were never routed for approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemApprovalStatus {
    Pending,
    Approved,
    Declined,
}

impl WorkItemApprovalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Declined => "Declined",
        }
    }
}

/// Snapshot of a vehicle waiting in the reconditioning pipeline, with its owned work items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleApprovalRecord {
    pub id: VehicleId,
    pub stock_number: String,
    #[serde(default)]
    pub vin: String,
    #[serde(default)]
    pub vehicle_year: Option<i32>,
    #[serde(default)]
    pub vehicle_make: Option<String>,
    #[serde(default)]
    pub vehicle_model: Option<String>,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub approval_status: VehicleApprovalStatus,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub priority_score: Option<i32>,
    #[serde(default)]
    pub intake_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub escalation_level: i32,
    #[serde(default)]
    pub total_holding_cost: Option<f64>,
    #[serde(default)]
    pub current_step_name: Option<String>,
    #[serde(default)]
    pub current_step_color: Option<String>,
    #[serde(default)]
    pub work_items: Vec<WorkItemRecord>,
}

impl VehicleApprovalRecord {
    /// Critical vehicles are those escalated at least twice.
    pub fn is_critical(&self) -> bool {
        self.escalation_level >= 2
    }

    /// Human readable "year make model" line, skipping missing parts.
    pub fn vehicle_info(&self) -> String {
        vehicle_info(
            self.vehicle_year,
            self.vehicle_make.as_deref(),
            self.vehicle_model.as_deref(),
        )
    }

    /// Whether the vehicle itself is still awaiting a decision.
    pub fn awaiting_decision(&self) -> bool {
        self.requires_approval
            && self.approval_status == VehicleApprovalStatus::Pending
            && self.approved_by.is_none()
    }
}

pub(crate) fn vehicle_info(year: Option<i32>, make: Option<&str>, model: Option<&str>) -> String {
    let year = year.map(|year| year.to_string());
    [year.as_deref(), make, model]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unit of reconditioning work attached to a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItemRecord {
    pub id: WorkItemId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub approval_required: bool,
    #[serde(default)]
    pub approval_status: Option<WorkItemApprovalStatus>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub estimated_cost: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Parent vehicle context copied onto a work item when it is lifted into the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleContext {
    pub vehicle_id: VehicleId,
    pub vehicle_stock_number: String,
    pub vehicle_year: Option<i32>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_step: Option<String>,
    pub vehicle_step_color: Option<String>,
}

impl VehicleContext {
    pub fn from_vehicle(vehicle: &VehicleApprovalRecord) -> Self {
        Self {
            vehicle_id: vehicle.id.clone(),
            vehicle_stock_number: vehicle.stock_number.clone(),
            vehicle_year: vehicle.vehicle_year,
            vehicle_make: vehicle.vehicle_make.clone(),
            vehicle_model: vehicle.vehicle_model.clone(),
            vehicle_step: vehicle.current_step_name.clone(),
            vehicle_step_color: vehicle.current_step_color.clone(),
        }
    }

    pub fn vehicle_info(&self) -> String {
        vehicle_info(
            self.vehicle_year,
            self.vehicle_make.as_deref(),
            self.vehicle_model.as_deref(),
        )
    }
}

/// Read-only projection of a work item decorated with its parent vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoratedWorkItem {
    pub work_item: WorkItemRecord,
    pub vehicle: VehicleContext,
    /// `work_item.created_at`, or the queue build time when the backend omitted it.
    pub queued_at: DateTime<Utc>,
}

/// Aggregate counters shown above the queue. Computed by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    #[serde(default)]
    pub total_pending: u32,
    #[serde(default)]
    pub approved_today: u32,
    #[serde(default)]
    pub rejected_today: u32,
    #[serde(default)]
    pub pending_critical: u32,
    #[serde(default)]
    pub oldest_pending_days: u32,
}

/// Reason and notes captured by the rejection confirmation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RejectionDraft {
    pub reason: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RejectionDraft {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// The confirm action stays disabled until a non-blank reason is supplied.
    pub fn can_confirm(&self) -> bool {
        !self.reason.trim().is_empty()
    }
}
