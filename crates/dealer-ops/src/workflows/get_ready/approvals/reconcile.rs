//! Cached backend snapshot with optimistic local patches.
//!
//! A patch marks a row decided before the backend confirms, so the row leaves the queue at once.
//! Successful patches stay until the next refresh replaces the snapshot with server truth; failed
//! ones are reverted field by field. A revert against a newer snapshot is dropped.

use chrono::{DateTime, Utc};

use super::domain::{
    VehicleApprovalRecord, VehicleApprovalStatus, VehicleId, WorkItemApprovalStatus, WorkItemId,
};
use super::queue::QueueItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Default)]
pub struct QueueSnapshot {
    vehicles: Vec<VehicleApprovalRecord>,
    generation: u64,
    fetched_at: Option<DateTime<Utc>>,
}

/// Undo record for a single optimistic edit.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticPatch {
    generation: u64,
    vehicle_id: VehicleId,
    previous: PreviousState,
}

#[derive(Debug, Clone, PartialEq)]
enum PreviousState {
    Vehicle {
        status: VehicleApprovalStatus,
        approved_by: Option<String>,
    },
    WorkItem {
        id: WorkItemId,
        status: Option<WorkItemApprovalStatus>,
    },
}

impl QueueSnapshot {
    pub fn vehicles(&self) -> &[VehicleApprovalRecord] {
        &self.vehicles
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    /// Install server truth, discarding any local patches.
    pub fn replace(&mut self, vehicles: Vec<VehicleApprovalRecord>, fetched_at: DateTime<Utc>) {
        self.vehicles = vehicles;
        self.generation += 1;
        self.fetched_at = Some(fetched_at);
    }

    /// Mark `target` decided locally. Returns `None` when the row is not in the snapshot.
    pub fn apply(
        &mut self,
        target: &QueueItemId,
        vehicle_id: &VehicleId,
        decision: Decision,
        reviewer: &str,
    ) -> Option<OptimisticPatch> {
        let generation = self.generation;
        let vehicle = self.vehicles.iter_mut().find(|v| &v.id == vehicle_id)?;

        let previous = match target {
            QueueItemId::Vehicle(_) => {
                let previous = PreviousState::Vehicle {
                    status: vehicle.approval_status,
                    approved_by: vehicle.approved_by.clone(),
                };
                match decision {
                    Decision::Approve => {
                        vehicle.approval_status = VehicleApprovalStatus::Approved;
                        vehicle.approved_by = Some(reviewer.to_string());
                    }
                    Decision::Reject => vehicle.approval_status = VehicleApprovalStatus::Rejected,
                }
                previous
            }
            QueueItemId::WorkItem(work_item_id) => {
                let item = vehicle
                    .work_items
                    .iter_mut()
                    .find(|item| &item.id == work_item_id)?;
                let previous = PreviousState::WorkItem {
                    id: work_item_id.clone(),
                    status: item.approval_status,
                };
                item.approval_status = Some(match decision {
                    Decision::Approve => WorkItemApprovalStatus::Approved,
                    Decision::Reject => WorkItemApprovalStatus::Declined,
                });
                previous
            }
        };

        Some(OptimisticPatch {
            generation,
            vehicle_id: vehicle_id.clone(),
            previous,
        })
    }

    /// Undo a failed patch. Returns `false` when a refresh already superseded it.
    pub fn revert(&mut self, patch: OptimisticPatch) -> bool {
        if patch.generation != self.generation {
            return false;
        }
        let Some(vehicle) = self.vehicles.iter_mut().find(|v| v.id == patch.vehicle_id) else {
            return false;
        };

        match patch.previous {
            PreviousState::Vehicle {
                status,
                approved_by,
            } => {
                vehicle.approval_status = status;
                vehicle.approved_by = approved_by;
                true
            }
            PreviousState::WorkItem { id, status } => {
                match vehicle.work_items.iter_mut().find(|item| item.id == id) {
                    Some(item) => {
                        item.approval_status = status;
                        true
                    }
                    None => false,
                }
            }
        }
    }
}
