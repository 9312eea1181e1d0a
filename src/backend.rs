//! The `backend` module wraps the relational backend and the milestone API:
//! proposal rows, proposal snapshots and statement-of-milestone records, all
//! served PostgREST-style. Pure I/O adapters; what to do with a failure is
//! the pipeline's call.

use config::Settings;
use records::{Proposal, SnapshotRecord, SomRecord};
use reqwest;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use result::{Error, Result};
use serde::de::DeserializeOwned;

const SOM_SELECT: &'static str = "milestone,month,cost,completion,created_at,\
     som_reviews(outputs_approved,success_criteria_approved,evidence_approved,current,created_at),\
     poas(created_at,signoffs(created_at),poas_reviews(content_approved,current,created_at))";

pub struct RepositoryClient {
    client: reqwest::Client,
    backend_url: String,
    backend_key: String,
    milestone_url: String,
}

impl RepositoryClient {
    pub fn new(settings: &Settings) -> RepositoryClient {
        RepositoryClient {
            client: reqwest::Client::new(),
            backend_url: settings.backend_url.clone(),
            backend_key: settings.backend_key.clone(),
            milestone_url: settings.milestone_url.clone(),
        }
    }

    /// Fetches the proposal row for one project. No row means the backend
    /// does not know the project: `NotFound`, surfaced to the caller.
    pub fn proposal(&self, project_id: u64) -> Result<Proposal> {
        let url = proposal_url(&self.backend_url, project_id);
        let proposals: Vec<Proposal> = self.get_json(&url)?;
        proposals
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("no proposal for project {}", project_id)))
    }

    /// Fetches the snapshot rows for a project. An empty list is a valid
    /// answer meaning no milestone has been snapshotted yet.
    pub fn snapshots(&self, project_id: u64) -> Result<Vec<SnapshotRecord>> {
        let url = snapshot_url(&self.milestone_url);
        let body = json!({ "_project_id": project_id });
        let mut response = self
            .client
            .post(&url)
            .header("apikey", self.backend_key.as_str())
            .header(AUTHORIZATION, format!("Bearer {}", self.backend_key))
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()?;
        if !response.status().is_success() {
            return Err(Error::UpstreamFetch(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response.json()?)
    }

    /// Fetches the statement-of-milestone records for one milestone, newest
    /// first, with reviews and proof-of-achievement variants nested.
    pub fn soms(&self, project_id: u64, milestone: u32) -> Result<Vec<SomRecord>> {
        let url = soms_url(&self.milestone_url, project_id, milestone);
        self.get_json(&url)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut response = self
            .client
            .get(url)
            .header("apikey", self.backend_key.as_str())
            .header(AUTHORIZATION, format!("Bearer {}", self.backend_key))
            .send()?;
        if !response.status().is_success() {
            return Err(Error::UpstreamFetch(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response.json()?)
    }
}

fn proposal_url(base: &str, project_id: u64) -> String {
    format!("{}/rest/v1/proposals?project_id=eq.{}&select=*", base, project_id)
}

fn snapshot_url(base: &str) -> String {
    format!("{}/rest/v1/rpc/getproposalsnapshot", base)
}

fn soms_url(base: &str, project_id: u64, milestone: u32) -> String {
    format!(
        "{}/rest/v1/soms?select={}&project_id=eq.{}&milestone=eq.{}&order=created_at.desc",
        base, SOM_SELECT, project_id, milestone
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proposal_url() {
        assert_eq!(
            proposal_url("http://backend.test", 900001),
            "http://backend.test/rest/v1/proposals?project_id=eq.900001&select=*"
        );
    }

    #[test]
    fn test_snapshot_url() {
        assert_eq!(
            snapshot_url("http://milestones.test"),
            "http://milestones.test/rest/v1/rpc/getproposalsnapshot"
        );
    }

    #[test]
    fn test_soms_url_filters_project_and_milestone() {
        let url = soms_url("http://milestones.test", 900001, 3);
        assert!(url.starts_with("http://milestones.test/rest/v1/soms?select="));
        assert!(url.contains("project_id=eq.900001"));
        assert!(url.contains("milestone=eq.3"));
        assert!(url.ends_with("order=created_at.desc"));
    }

    #[test]
    fn test_som_select_covers_nested_reviews() {
        assert!(SOM_SELECT.contains("som_reviews("));
        assert!(SOM_SELECT.contains("poas(created_at,signoffs(created_at)"));
    }
}
