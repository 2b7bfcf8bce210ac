//! Vehicle reconditioning ("Get Ready") workflows.

pub mod approvals;
