use super::domain::DealerScope;
use super::pipeline::SortBy;

/// Session settings for the approval queue, passed in rather than read from ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalConfig {
    pub scope: DealerScope,
    /// Recorded as `approved_by` on optimistic vehicle approvals.
    pub reviewer: String,
    pub default_sort: SortBy,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            scope: DealerScope::all(),
            reviewer: "operator".to_string(),
            default_sort: SortBy::Oldest,
        }
    }
}
