//! Approval queue for the Get Ready workflow.
//!
//! Vehicles awaiting sign-off and the work items that need approval are merged into one queue,
//! narrowed and ordered by the operator's view, and acted on singly or in bulk through an
//! [`ApprovalDataSource`] that fronts the managed backend.

mod config;
pub mod domain;
pub mod eligibility;
pub mod pipeline;
pub mod queue;
pub mod reconcile;
pub mod router;
pub mod selection;
pub mod service;
pub mod source;
pub mod views;

#[cfg(test)]
mod tests;

pub use config::ApprovalConfig;
pub use domain::{
    DealerScope, DecoratedWorkItem, RejectionDraft, SummaryCounts, VehicleApprovalRecord,
    VehicleApprovalStatus, VehicleContext, VehicleId, WorkItemApprovalStatus, WorkItemId,
    WorkItemRecord,
};
pub use eligibility::needs_approval;
pub use pipeline::{apply_search_and_critical_filter, sort_queue, QueueQuery, SortBy};
pub use queue::{build_queue, ApprovalQueueItem, FilterType, QueueItemId, UnknownOption};
pub use router::approval_router;
pub use selection::SelectionSet;
pub use service::{ApprovalCoordinator, ApprovalError, BulkApprovalOutcome};
pub use source::{
    ApprovalDataSource, CapabilityCheck, Notification, NotificationLevel, Notifier, SourceError,
    APPROVE_VEHICLES_ACTION, GET_READY_MODULE,
};
pub use views::{ApprovalQueueView, QueueItemDetail, QueueItemView};
