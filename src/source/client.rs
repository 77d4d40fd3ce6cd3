//! Endpoint builder for the remote API.

use reqwest::Url;

use super::fetcher::{FetchError, FetchRequest};
use crate::config::ZendeskConfig;

/// Builds [`FetchRequest`]s for every endpoint a run consumes.
#[derive(Debug, Clone)]
pub struct ZendeskSource {
    base: Url,
}

impl ZendeskSource {
    pub fn new(config: &ZendeskConfig) -> Result<Self, FetchError> {
        Self::with_base(&config.api_base())
    }

    /// `base` must end in `/`; endpoints are resolved relative to it.
    pub fn with_base(base: &str) -> Result<Self, FetchError> {
        let base = Url::parse(base).map_err(|e| FetchError::invalid_uri(base, e))?;
        if base.cannot_be_a_base() {
            return Err(FetchError::invalid_uri(base.as_str(), "not a hierarchical URL"));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<FetchRequest, FetchError> {
        self.base
            .join(path)
            .map(FetchRequest::new)
            .map_err(|e| FetchError::invalid_uri(path, e))
    }

    pub fn export_ticket_fields(&self) -> Result<FetchRequest, FetchError> {
        self.endpoint("ticket_fields.json")
    }

    pub fn export_organization_fields(&self) -> Result<FetchRequest, FetchError> {
        self.endpoint("organization_fields.json")
    }

    pub fn export_user_fields(&self) -> Result<FetchRequest, FetchError> {
        self.endpoint("user_fields.json")
    }

    pub fn export_groups(&self) -> Result<FetchRequest, FetchError> {
        self.endpoint("groups.json")
    }

    pub fn export_organizations(&self, since: i64) -> Result<FetchRequest, FetchError> {
        self.endpoint(&format!("incremental/organizations.json?start_time={since}"))
    }

    pub fn export_users(&self, since: i64) -> Result<FetchRequest, FetchError> {
        self.endpoint(&format!("incremental/users.json?start_time={since}"))
    }

    pub fn export_tickets(&self, since: i64) -> Result<FetchRequest, FetchError> {
        self.endpoint(&format!("incremental/tickets.json?start_time={since}"))
    }

    pub fn export_satisfaction_ratings(&self, since: i64) -> Result<FetchRequest, FetchError> {
        self.endpoint(&format!("satisfaction_ratings.json?start_time={since}"))
    }

    pub fn fetch_audits(&self, ticket_id: i64) -> Result<FetchRequest, FetchError> {
        self.endpoint(&format!("tickets/{ticket_id}/audits.json"))
    }

    pub fn fetch_metrics(&self, ticket_id: i64) -> Result<FetchRequest, FetchError> {
        self.endpoint(&format!("tickets/{ticket_id}/metrics.json"))
    }
}
