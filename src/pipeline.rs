//! The `pipeline` module is the reconciliation core. For each configured
//! project it joins the proposal record, snapshot and review data and the
//! wallet transaction history into one `ProjectAggregate`, applying every
//! documented fallback in exactly one place. Projects are processed one at
//! a time; a failure aborts only the project that raised it.

use backend::RepositoryClient;
use chrono::NaiveDate;
use config::{Allocation, ProjectConfig};
use dates;
use itertools::Itertools;
use ledger::LedgerClient;
use records::{
    CollaboratorShare, MilestoneRecord, Proposal, ProjectAggregate, ProjectFinancials,
    SnapshotRecord, SomRecord, WalletTransaction,
};
use result::Result;

/// Where the pipeline gets its upstream records. The live implementation
/// sits on the repository and ledger clients; tests substitute fixtures.
pub trait ProjectSource {
    fn proposal(&self, project_id: u64) -> Result<Proposal>;
    fn snapshots(&self, project_id: u64) -> Result<Vec<SnapshotRecord>>;
    fn som(&self, project_id: u64, milestone: u32) -> Result<Option<SomRecord>>;
    fn transactions(
        &self,
        wallet: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<WalletTransaction>>;
}

pub struct LiveSource<'a> {
    pub repository: &'a RepositoryClient,
    pub ledger: &'a LedgerClient,
}

impl<'a> ProjectSource for LiveSource<'a> {
    fn proposal(&self, project_id: u64) -> Result<Proposal> {
        self.repository.proposal(project_id)
    }

    fn snapshots(&self, project_id: u64) -> Result<Vec<SnapshotRecord>> {
        self.repository.snapshots(project_id)
    }

    fn som(&self, project_id: u64, milestone: u32) -> Result<Option<SomRecord>> {
        let mut soms = self.repository.soms(project_id, milestone)?;
        if soms.is_empty() {
            Ok(None)
        } else {
            Ok(Some(soms.remove(0)))
        }
    }

    fn transactions(
        &self,
        wallet: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<WalletTransaction>> {
        self.ledger.transactions(wallet, from, to)
    }
}

pub struct ProjectFailure {
    pub id: u64,
    pub name: String,
    pub reason: String,
}

pub struct RunOutcome {
    pub processed: Vec<ProjectAggregate>,
    pub failures: Vec<ProjectFailure>,
}

/// Processes every configured project in order. A failed project is logged
/// and recorded; its siblings are unaffected.
pub fn run<S: ProjectSource>(source: &S, projects: &[ProjectConfig]) -> RunOutcome {
    let mut processed = Vec::new();
    let mut failures = Vec::new();
    for project in projects {
        info!("processing project {} ({})", project.id, project.name);
        match process_project(source, project) {
            Ok(aggregate) => {
                info!(
                    "project {}: {} milestones, {} transactions, received {}",
                    project.id,
                    aggregate.milestones.len(),
                    aggregate.transactions.len(),
                    aggregate.total_received
                );
                processed.push(aggregate);
            }
            Err(err) => {
                error!("project {} failed: {}", project.id, err);
                failures.push(ProjectFailure {
                    id: project.id,
                    name: project.name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }
    RunOutcome {
        processed,
        failures,
    }
}

/// Runs the whole reconciliation for one project. Atomic from the caller's
/// perspective: an error yields no partial aggregate.
pub fn process_project<S: ProjectSource>(
    source: &S,
    project: &ProjectConfig,
) -> Result<ProjectAggregate> {
    project.validate()?;
    let (start, end) = project.date_bounds();

    let proposal = source.proposal(project.id)?;

    // An empty snapshot list is a valid answer; a failed fetch degrades to
    // the same thing.
    let snapshots = source.snapshots(project.id).unwrap_or_else(|err| {
        warn!(
            "project {}: snapshot fetch degraded to empty: {}",
            project.id, err
        );
        Vec::new()
    });

    let transactions = source
        .transactions(&project.wallet, start, end)
        .unwrap_or_else(|err| {
            warn!(
                "project {}: transaction fetch degraded to empty: {}",
                project.id, err
            );
            Vec::new()
        });

    let financials = build_financials(&proposal, project)?;
    let milestones = resolve_milestones(source, project.id, &proposal, &snapshots);

    let total_received: f64 = transactions
        .iter()
        .map(|tx| tx.received_amount(&project.wallet))
        .sum();
    let remaining_funds = proposal.budget - total_received;

    Ok(ProjectAggregate {
        id: project.id,
        name: project.name.clone(),
        wallet: project.wallet.clone(),
        proposal,
        financials,
        milestones,
        transactions,
        total_received,
        remaining_funds,
    })
}

/// The monthly-budget algorithm: whole-month duration from the configured
/// window, an even monthly spread of the budget, and per-collaborator
/// shares under whichever allocation model each entry uses.
pub fn build_financials(
    proposal: &Proposal,
    project: &ProjectConfig,
) -> Result<ProjectFinancials> {
    let (start, end) = project.date_bounds();
    let duration_months = match (start, end) {
        (Some(start), Some(end)) => dates::whole_months_between(start, end),
        _ => 0,
    };
    let budget = proposal.budget;
    let monthly_budget = if duration_months > 0 {
        budget / f64::from(duration_months)
    } else {
        budget
    };

    let mut collaborators = Vec::with_capacity(project.collaborators.len());
    for entry in &project.collaborators {
        let share = match entry.allocation()? {
            Allocation::Amount(amount) => {
                let monthly_amount = if duration_months > 0 {
                    amount / f64::from(duration_months)
                } else {
                    amount
                };
                let fraction = if budget > 0.0 { amount / budget } else { 0.0 };
                CollaboratorShare {
                    name: entry.name.clone(),
                    total_amount: amount,
                    monthly_amount,
                    fraction_of_budget: fraction,
                }
            }
            Allocation::Fraction(fraction) => CollaboratorShare {
                name: entry.name.clone(),
                total_amount: budget * fraction,
                monthly_amount: monthly_budget * fraction,
                fraction_of_budget: fraction,
            },
        };
        collaborators.push(share);
    }

    // Mixing the fixed-amount and fractional models in one list can make
    // the residual disagree with either model alone; the residual uses the
    // summed totals as-is.
    let allocated: f64 = collaborators.iter().map(|share| share.total_amount).sum();
    if allocated > budget {
        warn!(
            "project {}: collaborator allocations {} exceed the budget {}",
            project.id, allocated, budget
        );
    }
    let organization_funds = budget - allocated;

    Ok(ProjectFinancials {
        total_budget: budget,
        monthly_budget,
        duration_months,
        start_date: start,
        end_date: end,
        collaborators,
        organization_funds,
    })
}

/// One `MilestoneRecord` per milestone index: every index from 1 to the
/// proposal's milestone count, plus any snapshotted index beyond it. Every
/// fallback default lives here: an even cost split of the budget, zero
/// completion, all approval flags false.
fn resolve_milestones<S: ProjectSource>(
    source: &S,
    project_id: u64,
    proposal: &Proposal,
    snapshots: &[SnapshotRecord],
) -> Vec<MilestoneRecord> {
    let indexes: Vec<u32> = (1..proposal.milestones_qty + 1)
        .chain(snapshots.iter().map(|snapshot| snapshot.milestone))
        .filter(|&index| index >= 1)
        .unique()
        .sorted();

    let fallback_cost = if proposal.milestones_qty > 0 {
        proposal.budget / f64::from(proposal.milestones_qty)
    } else {
        proposal.budget
    };

    indexes
        .into_iter()
        .map(|index| {
            let snapshot = snapshots
                .iter()
                .find(|snapshot| snapshot.milestone == index);
            let som = match source.som(project_id, index) {
                Ok(som) => som,
                Err(err) => {
                    warn!(
                        "project {}: milestone {} fetch degraded to defaults: {}",
                        project_id, index, err
                    );
                    None
                }
            };
            synthesize_milestone(index, snapshot, som.as_ref(), fallback_cost)
        })
        .collect()
}

fn synthesize_milestone(
    index: u32,
    snapshot: Option<&SnapshotRecord>,
    som: Option<&SomRecord>,
    fallback_cost: f64,
) -> MilestoneRecord {
    let review = som.and_then(|som| som.current_review());
    let poa = som.and_then(|som| som.authoritative_poa());
    let poa_review = poa.and_then(|poa| poa.current_review());

    MilestoneRecord {
        milestone: index,
        month: som.and_then(|som| som.month),
        cost: som.and_then(|som| som.cost).unwrap_or(fallback_cost),
        completion: som.and_then(|som| som.completion).unwrap_or(0.0),
        som_signoff_count: snapshot.map(|s| s.som_signoff_count).unwrap_or(0),
        poa_signoff_count: snapshot.map(|s| s.poa_signoff_count).unwrap_or(0),
        outputs_approved: review.map(|r| r.outputs_approved).unwrap_or(false),
        success_criteria_approved: review.map(|r| r.success_criteria_approved).unwrap_or(false),
        evidence_approved: review.map(|r| r.evidence_approved).unwrap_or(false),
        poa_content_approved: poa_review.map(|r| r.content_approved).unwrap_or(false),
    }
}
