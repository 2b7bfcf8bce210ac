use crate::infra::{parse_timestamp, InMemoryApprovalSource, StaticPermissions, TracingNotifier};
use chrono::{DateTime, Utc};
use clap::Args;
use dealer_ops::error::AppError;
use dealer_ops::workflows::get_ready::approvals::{
    ApprovalConfig, ApprovalCoordinator, ApprovalQueueItem, DealerScope, FilterType,
    NotificationLevel, QueueQuery, RejectionDraft, SelectionSet, SortBy, SummaryCounts,
    VehicleApprovalRecord, APPROVE_VEHICLES_ACTION, GET_READY_MODULE,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct QueueReportArgs {
    /// JSON array of pending vehicles with nested work items
    #[arg(long)]
    pub(crate) vehicles: PathBuf,
    /// Queue type filter (all, vehicles, work_items, critical)
    #[arg(long, default_value_t = FilterType::All)]
    pub(crate) filter: FilterType,
    /// Sort order (oldest, newest, priority, cost)
    #[arg(long, default_value_t = SortBy::Oldest)]
    pub(crate) sort: SortBy,
    /// Case-insensitive search over stock number, VIN, make, model, and work item text
    #[arg(long, default_value = "")]
    pub(crate) search: String,
    /// Evaluation time (RFC 3339) used for work items without a creation date
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) now: Option<DateTime<Utc>>,
    /// Print the queue rows as JSON instead of a text listing
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Restrict the demo to one dealership (1 or 2). Defaults to every dealership.
    #[arg(long)]
    pub(crate) dealer_id: Option<i64>,
    /// Run without the approve-vehicles capability to show the permission path
    #[arg(long)]
    pub(crate) deny_vehicle_approvals: bool,
    /// Override the demo clock (RFC 3339). Defaults to now.
    #[arg(long, value_parser = parse_timestamp)]
    pub(crate) now: Option<DateTime<Utc>>,
}

pub(crate) fn run_queue_report(args: QueueReportArgs) -> Result<(), AppError> {
    let QueueReportArgs {
        vehicles,
        filter,
        sort,
        search,
        now,
        json,
    } = args;

    let raw = std::fs::read_to_string(&vehicles)?;
    let records: Vec<VehicleApprovalRecord> = serde_json::from_str(&raw)?;
    let now = now.unwrap_or_else(Utc::now);

    let query = QueueQuery::new(filter, search, sort);
    let queue = query.run(&records, now);

    if json {
        let selection = SelectionSet::new();
        let rows: Vec<_> = queue.iter().map(|item| item.to_view(&selection)).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "Approval queue from {} ({} vehicles loaded)",
        vehicles.display(),
        records.len()
    );
    println!("Filter {} | sort {}", query.filter, query.sort);
    render_queue(&queue);
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        dealer_id,
        deny_vehicle_approvals,
        now,
    } = args;

    let now = now.unwrap_or_else(Utc::now);
    let scope = dealer_id.map_or_else(DealerScope::all, DealerScope::dealer);
    let permissions = if deny_vehicle_approvals {
        StaticPermissions::default()
    } else {
        StaticPermissions::granting([(GET_READY_MODULE, APPROVE_VEHICLES_ACTION)])
    };
    let notifier = Arc::new(TracingNotifier::default());
    let coordinator = ApprovalCoordinator::new(
        Arc::new(InMemoryApprovalSource::seeded(now)),
        Arc::new(permissions),
        notifier.clone(),
        ApprovalConfig {
            scope,
            reviewer: "demo-manager".to_string(),
            default_sort: SortBy::Priority,
        },
    );

    println!("Get Ready approvals demo");
    let loaded = coordinator.refresh().await?;
    println!("Loaded {loaded} vehicles with pending approvals");
    render_summary(&coordinator.summary().await);

    let everything = QueueQuery::new(FilterType::All, "", SortBy::Priority);
    println!("\nApproval queue (priority order)");
    render_queue(&coordinator.queue(&everything, now));

    let critical_only = QueueQuery::new(FilterType::Critical, "", SortBy::Oldest);
    let critical = coordinator.queue(&critical_only, now);
    coordinator.select_all(&critical);
    println!("\nBulk approving {} critical rows", coordinator.selected().len());
    match coordinator.bulk_approve(&critical).await {
        Ok(outcome) => println!(
            "- Approved {} vehicles and {} work items",
            outcome.vehicles, outcome.work_items
        ),
        Err(err) => println!("- Bulk approval stopped: {err}"),
    }

    let oldest_work_item = coordinator
        .queue(&QueueQuery::new(FilterType::WorkItems, "", SortBy::Oldest), now)
        .into_iter()
        .next();
    if let Some(item) = oldest_work_item {
        println!("\nDeclining the oldest work item");
        let blank = coordinator
            .reject(&item, RejectionDraft::new("  "))
            .await
            .err();
        if let Some(err) = blank {
            println!("- Without a reason: {err}");
        }
        let draft = RejectionDraft::new("Cost exceeds reconditioning budget")
            .with_notes("Wholesale instead");
        match coordinator.reject(&item, draft).await {
            Ok(()) => println!("- Declined {}", item.id()),
            Err(err) => println!("- Decline failed: {err}"),
        }
    }

    coordinator.refresh().await?;
    println!("\nRemaining queue");
    render_queue(&coordinator.queue(&everything, now));
    render_summary(&coordinator.summary().await);

    println!("\nNotifications");
    for event in notifier.events() {
        let marker = match event.level {
            NotificationLevel::Success => "ok",
            NotificationLevel::Error => "error",
        };
        println!("- [{marker}] {}: {}", event.title, event.message);
    }

    Ok(())
}

fn render_summary(summary: &SummaryCounts) {
    println!(
        "Pending {} | critical {} | approved today {} | rejected today {} | oldest {} days",
        summary.total_pending,
        summary.pending_critical,
        summary.approved_today,
        summary.rejected_today,
        summary.oldest_pending_days
    );
}

fn render_queue(queue: &[ApprovalQueueItem]) {
    if queue.is_empty() {
        println!("- nothing awaiting approval");
        return;
    }

    for item in queue {
        let flag = if item.is_critical() { " [critical]" } else { "" };
        match item {
            ApprovalQueueItem::Vehicle(vehicle) => println!(
                "- vehicle #{} {} | {} | priority {} | holding cost {:.2}{}",
                vehicle.stock_number,
                vehicle.vehicle_info(),
                vehicle.current_step_name.as_deref().unwrap_or("No step"),
                item.priority(),
                vehicle.total_holding_cost.unwrap_or(0.0),
                flag
            ),
            ApprovalQueueItem::WorkItem(decorated) => println!(
                "- work item {} | #{} {} | priority {} | est. {:.2} | queued {}",
                decorated.work_item.title,
                decorated.vehicle.vehicle_stock_number,
                decorated.vehicle.vehicle_info(),
                item.priority(),
                decorated.work_item.estimated_cost.unwrap_or(0.0),
                item.created_at().format("%Y-%m-%d")
            ),
        }
    }
}
