use std::collections::BTreeSet;

use super::domain::{VehicleId, WorkItemId};
use super::queue::{ApprovalQueueItem, QueueItemId};

/// Queue rows currently checked by the operator.
///
/// Filtering never prunes the set; only completed actions do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    selected: BTreeSet<QueueItemId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id`, returning whether it is now selected.
    pub fn toggle(&mut self, id: QueueItemId) -> bool {
        if self.selected.remove(&id) {
            false
        } else {
            self.selected.insert(id);
            true
        }
    }

    /// Select exactly `visible`, or clear when the selection already has that many rows.
    pub fn select_all<I>(&mut self, visible: I)
    where
        I: IntoIterator<Item = QueueItemId>,
    {
        let visible: BTreeSet<QueueItemId> = visible.into_iter().collect();
        if self.selected.len() == visible.len() {
            self.selected.clear();
        } else {
            self.selected = visible;
        }
    }

    pub fn remove(&mut self, id: &QueueItemId) -> bool {
        self.selected.remove(id)
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn contains(&self, id: &QueueItemId) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueItemId> {
        self.selected.iter()
    }

    /// Split the selected rows of `visible` by variant, in queue order.
    ///
    /// Selected ids that are no longer visible are left out.
    pub fn partition(&self, visible: &[ApprovalQueueItem]) -> SelectionPartition {
        let mut partition = SelectionPartition::default();

        for item in visible {
            if !self.contains(&item.id()) {
                continue;
            }
            match item {
                ApprovalQueueItem::Vehicle(vehicle) => partition.vehicles.push(vehicle.id.clone()),
                ApprovalQueueItem::WorkItem(item) => partition.work_items.push((
                    item.work_item.id.clone(),
                    item.vehicle.vehicle_id.clone(),
                )),
            }
        }

        partition
    }
}

/// Selected rows grouped for dispatch. Work items carry their parent vehicle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionPartition {
    pub vehicles: Vec<VehicleId>,
    pub work_items: Vec<(WorkItemId, VehicleId)>,
}

impl SelectionPartition {
    pub fn len(&self) -> usize {
        self.vehicles.len() + self.work_items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty() && self.work_items.is_empty()
    }
}
