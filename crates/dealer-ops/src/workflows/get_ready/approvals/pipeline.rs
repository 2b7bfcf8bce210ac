use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::VehicleApprovalRecord;
use super::queue::{build_queue, ApprovalQueueItem, FilterType, UnknownOption};

/// Sort orders offered by the approvals tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Oldest,
    Newest,
    Priority,
    Cost,
}

impl SortBy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Oldest => "oldest",
            Self::Newest => "newest",
            Self::Priority => "priority",
            Self::Cost => "cost",
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortBy {
    type Err = UnknownOption;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "oldest" => Ok(Self::Oldest),
            "newest" => Ok(Self::Newest),
            "priority" => Ok(Self::Priority),
            "cost" => Ok(Self::Cost),
            _ => Err(UnknownOption {
                kind: "sort",
                value: value.to_string(),
            }),
        }
    }
}

/// User-selected view over the queue: type filter, free-text search, and ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueQuery {
    #[serde(default)]
    pub filter: FilterType,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub sort: SortBy,
}

impl QueueQuery {
    pub fn new(filter: FilterType, search: impl Into<String>, sort: SortBy) -> Self {
        Self {
            filter,
            search: search.into(),
            sort,
        }
    }

    /// Build, narrow, and order the queue for this view.
    pub fn run(
        &self,
        vehicles: &[VehicleApprovalRecord],
        now: DateTime<Utc>,
    ) -> Vec<ApprovalQueueItem> {
        let queue = build_queue(vehicles, self.filter, now);
        let mut filtered = apply_search_and_critical_filter(queue, &self.search, self.filter);
        sort_queue(&mut filtered, self.sort);
        filtered
    }
}

/// Drop rows that miss the search text, then keep only critical rows for the critical filter.
pub fn apply_search_and_critical_filter(
    queue: Vec<ApprovalQueueItem>,
    search: &str,
    filter: FilterType,
) -> Vec<ApprovalQueueItem> {
    let needle = search.to_lowercase();

    queue
        .into_iter()
        .filter(|item| needle.is_empty() || matches_search(item, &needle))
        .filter(|item| filter != FilterType::Critical || item.is_critical())
        .collect()
}

/// `needle` must already be lowercase.
pub(crate) fn matches_search(item: &ApprovalQueueItem, needle: &str) -> bool {
    let contains = |field: &str| field.to_lowercase().contains(needle);

    match item {
        ApprovalQueueItem::Vehicle(vehicle) => {
            contains(&vehicle.stock_number)
                || contains(&vehicle.vin)
                || vehicle.vehicle_make.as_deref().is_some_and(contains)
                || vehicle.vehicle_model.as_deref().is_some_and(contains)
        }
        ApprovalQueueItem::WorkItem(item) => {
            contains(&item.work_item.title)
                || item.work_item.description.as_deref().is_some_and(contains)
                || contains(&item.vehicle.vehicle_stock_number)
        }
    }
}

/// Order the queue in place. Every branch uses a stable sort over a total order.
///
/// Cost compares holding cost between vehicles and estimated cost between work items; a vehicle
/// and a work item are never reordered against each other's slot, so each variant is ordered
/// among itself while the interleaving of variants stays as it was.
pub fn sort_queue(queue: &mut Vec<ApprovalQueueItem>, sort_by: SortBy) {
    match sort_by {
        SortBy::Oldest => queue.sort_by_key(ApprovalQueueItem::created_at),
        SortBy::Newest => queue.sort_by(|a, b| b.created_at().cmp(&a.created_at())),
        SortBy::Priority => queue.sort_by(|a, b| b.priority().cmp(&a.priority())),
        SortBy::Cost => sort_by_cost(queue),
    }
}

fn sort_by_cost(queue: &mut Vec<ApprovalQueueItem>) {
    let slots: Vec<bool> = queue.iter().map(ApprovalQueueItem::is_vehicle).collect();
    let (mut vehicles, mut work_items): (Vec<_>, Vec<_>) =
        queue.drain(..).partition(ApprovalQueueItem::is_vehicle);

    vehicles.sort_by(descending_cost);
    work_items.sort_by(descending_cost);

    let mut vehicles = vehicles.into_iter();
    let mut work_items = work_items.into_iter();
    queue.extend(slots.into_iter().filter_map(|is_vehicle| {
        if is_vehicle {
            vehicles.next()
        } else {
            work_items.next()
        }
    }));
}

fn descending_cost(a: &ApprovalQueueItem, b: &ApprovalQueueItem) -> Ordering {
    cost(b).total_cmp(&cost(a))
}

/// Missing costs count as zero.
fn cost(item: &ApprovalQueueItem) -> f64 {
    match item {
        ApprovalQueueItem::Vehicle(vehicle) => vehicle.total_holding_cost.unwrap_or(0.0),
        ApprovalQueueItem::WorkItem(item) => item.work_item.estimated_cost.unwrap_or(0.0),
    }
}
