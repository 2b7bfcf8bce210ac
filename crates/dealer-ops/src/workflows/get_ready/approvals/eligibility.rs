use super::domain::{VehicleApprovalRecord, WorkItemApprovalStatus, WorkItemRecord};

/// A work item needs approval when it is flagged for approval and nobody has decided it yet.
///
/// Both the vehicle inclusion rule and the stand-alone work-item rule go through this
/// predicate so they cannot disagree about what "pending" means.
pub fn needs_approval(item: &WorkItemRecord) -> bool {
    item.approval_required
        && matches!(
            item.approval_status,
            None | Some(WorkItemApprovalStatus::Pending)
        )
}

/// Vehicle rows are queued only while undecided and backed by at least one pending work item.
pub fn vehicle_needs_approval(vehicle: &VehicleApprovalRecord) -> bool {
    vehicle.awaiting_decision() && vehicle.work_items.iter().any(needs_approval)
}

/// Work items of `vehicle` that qualify for their own queue row, in source order.
pub fn pending_work_items(
    vehicle: &VehicleApprovalRecord,
) -> impl Iterator<Item = &WorkItemRecord> + '_ {
    vehicle.work_items.iter().filter(|item| needs_approval(item))
}
