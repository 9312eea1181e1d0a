//! The `report` module renders processed projects and the global rollup
//! into the published table rows and the markdown summary document. Pure
//! functions: rendering never fails, missing optional fields become a
//! placeholder.

use chrono::NaiveDate;
use pipeline::ProjectFailure;
use records::{GlobalFinancials, ProjectAggregate};
use table_store::Cell;

pub const PROPOSALS_TABLE: &'static str = "proposals";
pub const MILESTONES_TABLE: &'static str = "milestones";
pub const TRANSACTIONS_TABLE: &'static str = "transactions";
pub const COLLABORATORS_TABLE: &'static str = "collaborators";
pub const GLOBAL_TABLE: &'static str = "global_financials";

pub const PROPOSALS_HEADER: [&'static str; 7] = [
    "Project ID",
    "Title",
    "Budget",
    "Funds Distributed",
    "Remaining Funds",
    "Milestones Quantity",
    "Milestone URL",
];

pub const MILESTONES_HEADER: [&'static str; 15] = [
    "title",
    "project_id",
    "milestone",
    "month",
    "cost",
    "completion",
    "budget",
    "funds_distributed",
    "milestones_qty",
    "som_signoff_count",
    "poa_signoff_count",
    "outputs_approved",
    "success_criteria_approved",
    "evidence_approved",
    "poa_content_approved",
];

pub const TRANSACTIONS_HEADER: [&'static str; 6] = [
    "Project ID",
    "Project Title",
    "Transaction Hash",
    "Date",
    "Amount",
    "Metadata",
];

pub const COLLABORATORS_HEADER: [&'static str; 6] = [
    "Project ID",
    "Project Title",
    "Total Budget",
    "Collaborator Name",
    "Funds Allocated to Collaborator",
    "Funds Left to Organization",
];

pub const GLOBAL_HEADER: [&'static str; 11] = [
    "Projects",
    "Organization",
    "Total Budget All Projects",
    "Real Monthly Budget",
    "Months with Real Budget",
    "Max Monthly Budget",
    "Months with Max Budget",
    "Total Received",
    "Remaining Funds",
    "Wallet Balance (native)",
    "Wallet Balance (converted)",
];

pub fn proposal_row(aggregate: &ProjectAggregate, milestone_site: &str) -> Vec<Cell> {
    vec![
        Cell::from(aggregate.proposal.project_id),
        Cell::from(aggregate.proposal.title.as_str()),
        Cell::from(aggregate.proposal.budget),
        Cell::from(aggregate.proposal.funds_distributed),
        Cell::from(aggregate.remaining_funds),
        Cell::from(aggregate.proposal.milestones_qty),
        Cell::Text(aggregate.proposal.milestone_url(milestone_site)),
    ]
}

pub fn milestone_rows(aggregate: &ProjectAggregate) -> Vec<Vec<Cell>> {
    aggregate
        .milestones
        .iter()
        .map(|milestone| {
            vec![
                Cell::from(aggregate.proposal.title.as_str()),
                Cell::from(aggregate.proposal.project_id),
                Cell::from(milestone.milestone),
                Cell::from(milestone.month),
                Cell::from(milestone.cost),
                Cell::from(milestone.completion),
                Cell::from(aggregate.proposal.budget),
                Cell::from(aggregate.proposal.funds_distributed),
                Cell::from(aggregate.proposal.milestones_qty),
                Cell::from(milestone.som_signoff_count),
                Cell::from(milestone.poa_signoff_count),
                Cell::from(milestone.outputs_approved),
                Cell::from(milestone.success_criteria_approved),
                Cell::from(milestone.evidence_approved),
                Cell::from(milestone.poa_content_approved),
            ]
        })
        .collect()
}

pub fn transaction_rows(aggregate: &ProjectAggregate) -> Vec<Vec<Cell>> {
    aggregate
        .transactions
        .iter()
        .map(|tx| {
            let metadata = match tx.metadata_json() {
                Some(value) => Cell::Text(value.to_string()),
                None => Cell::Empty,
            };
            vec![
                Cell::from(aggregate.proposal.project_id),
                Cell::from(aggregate.proposal.title.as_str()),
                Cell::from(tx.hash.as_str()),
                Cell::Text(tx.date()),
                Cell::from(tx.received_amount(&aggregate.wallet)),
                metadata,
            ]
        })
        .collect()
}

pub fn collaborator_rows(aggregate: &ProjectAggregate) -> Vec<Vec<Cell>> {
    aggregate
        .financials
        .collaborators
        .iter()
        .map(|share| {
            vec![
                Cell::from(aggregate.proposal.project_id),
                Cell::from(aggregate.proposal.title.as_str()),
                Cell::from(aggregate.financials.total_budget),
                Cell::from(share.name.as_str()),
                Cell::from(share.total_amount),
                Cell::from(aggregate.financials.organization_funds),
            ]
        })
        .collect()
}

/// One row per organization, or a single placeholder row carrying the
/// cross-project totals when no organization is configured.
pub fn global_rows(global: &GlobalFinancials) -> Vec<Vec<Cell>> {
    if global.organizations.is_empty() {
        return vec![vec![
            Cell::from("ALL"),
            Cell::from("-"),
            Cell::from(global.total_budget),
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
            Cell::Empty,
            Cell::from(global.total_received),
            Cell::from(global.remaining_funds),
            Cell::Empty,
            Cell::Empty,
        ]];
    }
    global
        .organizations
        .iter()
        .map(|org| {
            vec![
                Cell::from("ALL"),
                Cell::from(org.name.as_str()),
                Cell::from(global.total_budget),
                Cell::from(org.real_monthly_budget),
                Cell::from(org.months_real),
                Cell::from(org.max_monthly_budget),
                Cell::from(org.months_max),
                Cell::from(global.total_received),
                Cell::from(global.remaining_funds),
                Cell::from(org.wallet_balance),
                Cell::from(org.converted_balance),
            ]
        })
        .collect()
}

/// The human-readable run summary: per-project progress and financial
/// breakdowns, the global rollup, and any per-project failures.
pub fn render_summary(
    processed: &[ProjectAggregate],
    failures: &[ProjectFailure],
    global: &GlobalFinancials,
    generated_at: &str,
) -> String {
    let mut out = String::new();
    out.push_str("# Funding Report\n\n");
    out.push_str(&format!("Generated: {}\n\n", generated_at));

    out.push_str("## Projects\n\n");
    for aggregate in processed {
        let completed = aggregate
            .milestones
            .iter()
            .filter(|milestone| milestone.is_completed())
            .count();
        out.push_str(&format!(
            "### {} ({})\n\n",
            aggregate.proposal.title, aggregate.id
        ));
        out.push_str(&format!(
            "- Progress: {}% ({} of {} milestones completed)\n",
            aggregate.progress_percent(),
            completed,
            aggregate.milestones.len()
        ));
        out.push_str(&format!(
            "- Window: {} to {} ({} months)\n",
            date_or_dash(&aggregate.financials.start_date),
            date_or_dash(&aggregate.financials.end_date),
            aggregate.financials.duration_months
        ));
        out.push_str(&format!(
            "- Budget: {} (monthly {})\n",
            aggregate.financials.total_budget, aggregate.financials.monthly_budget
        ));
        out.push_str(&format!(
            "- Received: {} | Remaining: {}\n",
            aggregate.total_received, aggregate.remaining_funds
        ));
        if aggregate.financials.collaborators.is_empty() {
            out.push_str("- Collaborators: none\n");
        } else {
            out.push_str("- Collaborators:\n");
            for share in &aggregate.financials.collaborators {
                out.push_str(&format!(
                    "  - {}: total {}, monthly {}, {}% of budget\n",
                    share.name,
                    share.total_amount,
                    share.monthly_amount,
                    (share.fraction_of_budget * 100.0).round()
                ));
            }
            out.push_str(&format!(
                "- Organization funds: {}\n",
                aggregate.financials.organization_funds
            ));
        }
        out.push('\n');
    }

    out.push_str("## Global\n\n");
    out.push_str(&format!(
        "- Total budget (all projects): {}\n",
        global.total_budget
    ));
    out.push_str(&format!("- Total received: {}\n", global.total_received));
    out.push_str(&format!("- Remaining funds: {}\n", global.remaining_funds));
    out.push('\n');
    for org in &global.organizations {
        out.push_str(&format!("### {}\n\n", org.name));
        out.push_str(&format!(
            "- Wallet balance: {} native, {} converted at rate {}\n",
            org.wallet_balance, org.converted_balance, org.rate
        ));
        out.push_str(&format!(
            "- Runway: {} months at real budget {}, {} months at max budget {}\n",
            org.months_real, org.real_monthly_budget, org.months_max, org.max_monthly_budget
        ));
        out.push('\n');
    }

    if !failures.is_empty() {
        out.push_str("## Failed Projects\n\n");
        for failure in failures {
            out.push_str(&format!(
                "- {} ({}): {}\n",
                failure.name, failure.id, failure.reason
            ));
        }
        out.push('\n');
    }

    out
}

fn date_or_dash(date: &Option<NaiveDate>) -> String {
    match *date {
        Some(date) => date.to_string(),
        None => "-".to_string(),
    }
}
