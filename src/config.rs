//! The `config` module holds the static run configuration: the tracked
//! projects with their collaborator allocations, the organizations whose
//! wallets feed the global rollup, and the endpoint settings resolved from
//! the environment.

use bs58;
use chrono::NaiveDate;
use dates;
use result::{Error, Result};
use serde_json;
use std::env;
use std::fs::File;

pub const DEFAULT_INDEXER_URL: &'static str = "https://cardano-mainnet.blockfrost.io/api/v0";
pub const DEFAULT_RATES_URL: &'static str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_MILESTONE_SITE_URL: &'static str = "https://milestones.projectcatalyst.io";

/// A configured share of one project's budget routed to a named party.
/// Exactly one of `amount` (fixed total) or `fraction` (legacy share of the
/// budget) may be set; `allocation` enforces that.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Collaborator {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Allocation {
    /// Fixed total amount over the project duration.
    Amount(f64),
    /// Legacy model: fraction of the project budget.
    Fraction(f64),
}

impl Collaborator {
    pub fn allocation(&self) -> Result<Allocation> {
        match (self.amount, self.fraction) {
            (Some(amount), None) => Ok(Allocation::Amount(amount)),
            (None, Some(fraction)) => Ok(Allocation::Fraction(fraction)),
            (Some(_), Some(_)) => Err(Error::Config(format!(
                "collaborator {}: amount and fraction are mutually exclusive",
                self.name
            ))),
            (None, None) => Err(Error::Config(format!(
                "collaborator {}: either amount or fraction is required",
                self.name
            ))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProjectConfig {
    pub id: u64,
    pub name: String,
    pub wallet: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub collaborators: Vec<Collaborator>,
}

impl ProjectConfig {
    /// Per-project checks applied before any fetch. An empty wallet or an
    /// invalid collaborator allocation aborts this project only, never the
    /// run.
    pub fn validate(&self) -> Result<()> {
        if self.wallet.is_empty() {
            return Err(Error::Config(format!(
                "project {}: no wallet address configured",
                self.id
            )));
        }
        if !wallet_is_plausible(&self.wallet) {
            warn!(
                "project {}: wallet {} is neither bech32-prefixed nor base58",
                self.id, self.wallet
            );
        }
        for collaborator in &self.collaborators {
            collaborator.allocation()?;
        }
        Ok(())
    }

    /// Configured date bounds with the default applied: a missing end date
    /// becomes start + 1 year.
    pub fn date_bounds(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        let end = self
            .end_date
            .or_else(|| self.start_date.map(dates::default_end));
        (self.start_date, end)
    }
}

fn wallet_is_plausible(wallet: &str) -> bool {
    if wallet.starts_with("addr1") || wallet.starts_with("addr_test1") {
        return true;
    }
    bs58::decode(wallet).into_vec().is_ok()
}

fn default_asset_id() -> String {
    "cardano".to_string()
}

fn default_vs_currency() -> String {
    "usd".to_string()
}

/// An organization whose wallet balance and runway appear in the global
/// financials table.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Organization {
    pub name: String,
    pub wallet: String,
    #[serde(default = "default_asset_id")]
    pub asset_id: String,
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,
    pub real_monthly_budget: f64,
    pub max_monthly_budget: f64,
}

/// The config file contents. Loaded once at startup, immutable for the run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
    #[serde(default)]
    pub organizations: Vec<Organization>,
}

impl Config {
    pub fn project(&self, id: u64) -> Result<&ProjectConfig> {
        self.projects.iter().find(|p| p.id == id).ok_or_else(|| {
            Error::Config(format!("project {} not present in configuration", id))
        })
    }
}

pub fn read_config(path: &str) -> Result<Config> {
    let file = File::open(path).or_else(|err| {
        Err(Error::Config(format!(
            "{}: unable to open config file: {}",
            path, err
        )))
    })?;

    serde_json::from_reader(file).or_else(|err| {
        Err(Error::Config(format!(
            "{}: failed to parse config file: {}",
            path, err
        )))
    })
}

/// Endpoint settings from the environment. Backend credentials are required;
/// every other setting is optional and the dependent fetch degrades when it
/// is absent.
#[derive(Debug, Clone)]
pub struct Settings {
    pub backend_url: String,
    pub backend_key: String,
    pub milestone_url: String,
    pub milestone_site_url: String,
    pub indexer_url: String,
    pub indexer_key: Option<String>,
    pub rates_url: String,
    pub webhook_url: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Settings> {
        let backend_url = require_var("FUNDTRACE_BACKEND_URL")?;
        let backend_key = require_var("FUNDTRACE_BACKEND_KEY")?;
        let milestone_url =
            env::var("FUNDTRACE_MILESTONE_URL").unwrap_or_else(|_| backend_url.clone());
        let milestone_site_url = env::var("FUNDTRACE_MILESTONE_SITE_URL")
            .unwrap_or_else(|_| DEFAULT_MILESTONE_SITE_URL.to_string());
        let indexer_url =
            env::var("FUNDTRACE_INDEXER_URL").unwrap_or_else(|_| DEFAULT_INDEXER_URL.to_string());
        let indexer_key = env::var("FUNDTRACE_INDEXER_KEY").ok();
        let rates_url =
            env::var("FUNDTRACE_RATES_URL").unwrap_or_else(|_| DEFAULT_RATES_URL.to_string());
        let webhook_url = env::var("FUNDTRACE_WEBHOOK_URL").ok();

        Ok(Settings {
            backend_url,
            backend_key,
            milestone_url,
            milestone_site_url,
            indexer_url,
            indexer_key,
            rates_url,
            webhook_url,
        })
    }
}

fn require_var(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(ref value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(Error::Config(format!("{} is not set", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    fn tmp_config(name: &str) -> String {
        let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "target".to_string());
        format!("{}/tmp-config-{}.json", out_dir, name)
    }

    fn collaborator(amount: Option<f64>, fraction: Option<f64>) -> Collaborator {
        Collaborator {
            name: "dana".to_string(),
            amount,
            fraction,
        }
    }

    #[test]
    fn test_allocation_requires_exactly_one_model() {
        assert_eq!(
            collaborator(Some(24_000.0), None).allocation().unwrap(),
            Allocation::Amount(24_000.0)
        );
        assert_eq!(
            collaborator(None, Some(0.2)).allocation().unwrap(),
            Allocation::Fraction(0.2)
        );
        assert_matches!(
            collaborator(Some(1.0), Some(0.5)).allocation(),
            Err(Error::Config(_))
        );
        assert_matches!(collaborator(None, None).allocation(), Err(Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_empty_wallet() {
        let project = ProjectConfig {
            id: 900001,
            name: "Alpha".to_string(),
            wallet: String::new(),
            start_date: None,
            end_date: None,
            collaborators: vec![],
        };
        assert_matches!(project.validate(), Err(Error::Config(_)));
    }

    #[test]
    fn test_validate_surfaces_bad_allocation() {
        let project = ProjectConfig {
            id: 900001,
            name: "Alpha".to_string(),
            wallet: "addr1qxck7x5rfyg2tgjevbcmfbbyzcwgr3kmxvcmy2zdkn5f2tqn4mr2l".to_string(),
            start_date: None,
            end_date: None,
            collaborators: vec![collaborator(None, None)],
        };
        assert_matches!(project.validate(), Err(Error::Config(_)));
    }

    #[test]
    fn test_date_bounds_default_end() {
        let mut project = ProjectConfig {
            id: 900001,
            name: "Alpha".to_string(),
            wallet: "addr1q0".to_string(),
            start_date: Some(NaiveDate::from_ymd(2023, 4, 1)),
            end_date: None,
            collaborators: vec![],
        };
        assert_eq!(
            project.date_bounds(),
            (
                Some(NaiveDate::from_ymd(2023, 4, 1)),
                Some(NaiveDate::from_ymd(2024, 4, 1))
            )
        );
        project.start_date = None;
        assert_eq!(project.date_bounds(), (None, None));
    }

    #[test]
    fn test_project_lookup() {
        let config = Config {
            projects: vec![ProjectConfig {
                id: 900001,
                name: "Alpha".to_string(),
                wallet: "addr1q0".to_string(),
                start_date: None,
                end_date: None,
                collaborators: vec![],
            }],
            organizations: vec![],
        };
        assert_eq!(config.project(900001).unwrap().name, "Alpha");
        assert_matches!(config.project(123), Err(Error::Config(_)));
    }

    #[test]
    fn test_read_config_round_trip() {
        let path = tmp_config("round-trip");
        let config = Config {
            projects: vec![ProjectConfig {
                id: 900001,
                name: "Alpha".to_string(),
                wallet: "addr1qxck7x5rfyg2tgjevbcmfbbyzcwgr3kmxvcmy2zdkn5f2tqn4mr2l".to_string(),
                start_date: Some(NaiveDate::from_ymd(2023, 1, 1)),
                end_date: None,
                collaborators: vec![collaborator(Some(24_000.0), None)],
            }],
            organizations: vec![Organization {
                name: "Treasury".to_string(),
                wallet: "addr1q8n0vkkcrjpsqcmdfyglxwy4l0d8jq2kz0v95y3cmqq0g3sln7ff".to_string(),
                asset_id: "cardano".to_string(),
                vs_currency: "usd".to_string(),
                real_monthly_budget: 10_000.0,
                max_monthly_budget: 15_000.0,
            }],
        };

        let mut file = File::create(&path).unwrap();
        file.write_all(serde_json::to_string(&config).unwrap().as_bytes())
            .unwrap();

        let read = read_config(&path).unwrap();
        assert_eq!(read, config);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_read_config_missing_file() {
        assert_matches!(
            read_config("/no/such/fundtrace-config.json"),
            Err(Error::Config(_))
        );
    }

    #[test]
    fn test_organization_defaults() {
        let org: Organization = serde_json::from_str(
            r#"{"name": "Treasury", "wallet": "addr1q8", "real_monthly_budget": 1.0, "max_monthly_budget": 2.0}"#,
        ).unwrap();
        assert_eq!(org.asset_id, "cardano");
        assert_eq!(org.vs_currency, "usd");
    }

    #[test]
    fn test_settings_require_backend_credentials() {
        for var in &[
            "FUNDTRACE_BACKEND_URL",
            "FUNDTRACE_BACKEND_KEY",
            "FUNDTRACE_MILESTONE_URL",
            "FUNDTRACE_MILESTONE_SITE_URL",
            "FUNDTRACE_INDEXER_URL",
            "FUNDTRACE_INDEXER_KEY",
            "FUNDTRACE_RATES_URL",
        ] {
            env::remove_var(var);
        }
        assert_matches!(Settings::from_env(), Err(Error::Config(_)));

        env::set_var("FUNDTRACE_BACKEND_URL", "http://backend.test");
        env::set_var("FUNDTRACE_BACKEND_KEY", "secret");
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.backend_url, "http://backend.test");
        assert_eq!(settings.milestone_url, "http://backend.test");
        assert_eq!(settings.milestone_site_url, DEFAULT_MILESTONE_SITE_URL);
        assert_eq!(settings.indexer_url, DEFAULT_INDEXER_URL);
        assert_eq!(settings.indexer_key, None);

        env::remove_var("FUNDTRACE_BACKEND_URL");
        env::remove_var("FUNDTRACE_BACKEND_KEY");
    }
}
