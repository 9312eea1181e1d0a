//! The `records` module defines the upstream records fetched from the
//! backend, milestone API and transaction indexer, plus the derived
//! financial records the pipeline builds from them. Upstream records are
//! read-only within a run; derived records are constructed fresh each run
//! and never mutated afterwards.

use chrono::{NaiveDate, NaiveDateTime};
use serde_cbor;
use serde_json;

/// Base units per display unit of the tracked chain's currency.
pub const BASE_UNITS_PER_COIN: f64 = 1_000_000.0;

/// A funded project's canonical record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Proposal {
    pub project_id: u64,
    pub title: String,
    pub budget: f64,
    #[serde(default)]
    pub funds_distributed: f64,
    #[serde(default)]
    pub milestones_qty: u32,
}

impl Proposal {
    pub fn milestone_url(&self, site_base: &str) -> String {
        format!("{}/projects/{}", site_base, self.project_id)
    }
}

/// A point-in-time marker that a milestone has entered formal review.
/// Absence of a snapshot means "not yet snapshotted", never an error.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    pub milestone: u32,
    #[serde(default)]
    pub som_signoff_count: u32,
    #[serde(default)]
    pub poa_signoff_count: u32,
}

/// A statement-of-milestone record with its nested reviews and
/// proof-of-achievement variants, as served by the milestone API.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SomRecord {
    pub milestone: u32,
    #[serde(default)]
    pub month: Option<i64>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub completion: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub som_reviews: Vec<SomReview>,
    #[serde(default)]
    pub poas: Vec<PoaRecord>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SomReview {
    #[serde(default)]
    pub outputs_approved: bool,
    #[serde(default)]
    pub success_criteria_approved: bool,
    #[serde(default)]
    pub evidence_approved: bool,
    #[serde(default)]
    pub current: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PoaRecord {
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub signoffs: Vec<Signoff>,
    #[serde(default)]
    pub poas_reviews: Vec<PoaReview>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Signoff {
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PoaReview {
    #[serde(default)]
    pub content_approved: bool,
    #[serde(default)]
    pub current: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl SomRecord {
    /// Approval flags come from the most recent review marked current.
    pub fn current_review(&self) -> Option<&SomReview> {
        self.som_reviews
            .iter()
            .filter(|review| review.current)
            .max_by(|a, b| a.created_at.cmp(&b.created_at))
    }

    /// The authoritative proof of achievement for this milestone: the
    /// variant with the lexicographically greatest latest-signoff timestamp.
    /// A variant with no signoff at all sorts last.
    pub fn authoritative_poa(&self) -> Option<&PoaRecord> {
        self.poas
            .iter()
            .max_by(|a, b| a.latest_signoff().cmp(&b.latest_signoff()))
    }
}

impl PoaRecord {
    pub fn latest_signoff(&self) -> Option<&str> {
        self.signoffs
            .iter()
            .map(|signoff| signoff.created_at.as_str())
            .max()
    }

    pub fn current_review(&self) -> Option<&PoaReview> {
        self.poas_reviews
            .iter()
            .filter(|review| review.current)
            .max_by(|a, b| a.created_at.cmp(&b.created_at))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TxOutput {
    pub address: String,
    pub value: u64,
}

/// One on-chain transaction touching a tracked wallet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WalletTransaction {
    pub hash: String,
    #[serde(default)]
    pub block_time: i64,
    #[serde(default)]
    pub outputs: Vec<TxOutput>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata_cbor: Option<String>,
}

impl WalletTransaction {
    /// Sum of output values paid to `wallet`, converted from base units to
    /// display units.
    pub fn received_amount(&self, wallet: &str) -> f64 {
        let base: u64 = self
            .outputs
            .iter()
            .filter(|output| output.address == wallet)
            .map(|output| output.value)
            .sum();
        base as f64 / BASE_UNITS_PER_COIN
    }

    /// Metadata for rendering: the decoded JSON payload when the indexer
    /// provides one, otherwise the hex CBOR payload decoded here. A payload
    /// that fails to decode falls back to the raw hex string.
    pub fn metadata_json(&self) -> Option<serde_json::Value> {
        if let Some(ref value) = self.metadata {
            return Some(value.clone());
        }
        self.metadata_cbor
            .as_ref()
            .map(|hex| decode_cbor_metadata(hex))
    }

    pub fn date(&self) -> String {
        match NaiveDateTime::from_timestamp_opt(self.block_time, 0) {
            Some(datetime) => datetime.format("%Y-%m-%d").to_string(),
            None => String::new(),
        }
    }
}

fn decode_cbor_metadata(hex: &str) -> serde_json::Value {
    decode_hex(hex)
        .and_then(|bytes| serde_cbor::from_slice::<serde_cbor::Value>(&bytes).ok())
        .map(cbor_to_json)
        .unwrap_or_else(|| serde_json::Value::String(hex.to_string()))
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    let digits = hex.as_bytes();
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    let mut i = 0;
    while i < digits.len() {
        let hi = (digits[i] as char).to_digit(16)?;
        let lo = (digits[i + 1] as char).to_digit(16)?;
        bytes.push((hi * 16 + lo) as u8);
        i += 2;
    }
    Some(bytes)
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

// CBOR metadata maps may be keyed by integers or byte strings; JSON keys
// must be strings, so keys are stringified and byte payloads hex-encoded.
fn cbor_to_json(value: serde_cbor::Value) -> serde_json::Value {
    match value {
        serde_cbor::Value::Null => serde_json::Value::Null,
        serde_cbor::Value::Bool(b) => json!(b),
        serde_cbor::Value::U64(n) => json!(n),
        serde_cbor::Value::I64(n) => json!(n),
        serde_cbor::Value::F64(n) => json!(n),
        serde_cbor::Value::Bytes(bytes) => json!(hex_string(&bytes)),
        serde_cbor::Value::String(s) => json!(s),
        serde_cbor::Value::Array(values) => {
            serde_json::Value::Array(values.into_iter().map(cbor_to_json).collect())
        }
        serde_cbor::Value::Object(entries) => {
            let mut object = serde_json::Map::new();
            for (key, value) in entries {
                object.insert(object_key_string(key), cbor_to_json(value));
            }
            serde_json::Value::Object(object)
        }
    }
}

fn object_key_string(key: serde_cbor::ObjectKey) -> String {
    match key {
        serde_cbor::ObjectKey::Integer(n) => n.to_string(),
        serde_cbor::ObjectKey::Bytes(bytes) => hex_string(&bytes),
        serde_cbor::ObjectKey::String(s) => s,
        serde_cbor::ObjectKey::Bool(b) => b.to_string(),
        serde_cbor::ObjectKey::Null => "null".to_string(),
    }
}

/// One milestone's resolved completion state. Synthesized with defaults when
/// no review data exists yet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MilestoneRecord {
    pub milestone: u32,
    pub month: Option<i64>,
    pub cost: f64,
    pub completion: f64,
    pub som_signoff_count: u32,
    pub poa_signoff_count: u32,
    pub outputs_approved: bool,
    pub success_criteria_approved: bool,
    pub evidence_approved: bool,
    pub poa_content_approved: bool,
}

impl MilestoneRecord {
    pub fn is_completed(&self) -> bool {
        self.completion >= 1.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CollaboratorShare {
    pub name: String,
    pub total_amount: f64,
    pub monthly_amount: f64,
    pub fraction_of_budget: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProjectFinancials {
    pub total_budget: f64,
    pub monthly_budget: f64,
    pub duration_months: i32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub collaborators: Vec<CollaboratorShare>,
    pub organization_funds: f64,
}

/// Everything the pipeline derives for one project, kept for the projects
/// cache and flattened into table rows by the renderer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProjectAggregate {
    pub id: u64,
    pub name: String,
    pub wallet: String,
    pub proposal: Proposal,
    pub financials: ProjectFinancials,
    pub milestones: Vec<MilestoneRecord>,
    pub transactions: Vec<WalletTransaction>,
    pub total_received: f64,
    pub remaining_funds: f64,
}

impl ProjectAggregate {
    /// Completed milestones as a whole percentage, rounded to nearest; zero
    /// when there are no milestones at all.
    pub fn progress_percent(&self) -> i64 {
        let total = self.milestones.len();
        if total == 0 {
            return 0;
        }
        let completed = self
            .milestones
            .iter()
            .filter(|milestone| milestone.is_completed())
            .count();
        (100.0 * completed as f64 / total as f64).round() as i64
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OrganizationFinancials {
    pub name: String,
    pub real_monthly_budget: f64,
    pub months_real: i64,
    pub max_monthly_budget: f64,
    pub months_max: i64,
    pub wallet_balance: f64,
    pub converted_balance: f64,
    pub rate: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GlobalFinancials {
    pub total_budget: f64,
    pub total_received: f64,
    pub remaining_funds: f64,
    pub organizations: Vec<OrganizationFinancials>,
}
