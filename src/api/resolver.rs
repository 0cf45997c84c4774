//! Session resolution
//!
//! Works out which test drive(s) the data stream belongs to. An explicit id
//! wins without asking the API. Otherwise active test drives are listed and
//! optionally narrowed to the vehicle carrying our sensor.

use super::client::{ApiClient, ApiError};
use testdrive_shared::{Session, SessionStatus};
use tracing::debug;

/// How listed sessions are narrowed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFilter {
    /// Only sessions whose vehicle carries this hardware id
    Hardware(String),
    /// Every active session
    All,
}

/// Outcome of a resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Caller supplied the id; the API was not consulted
    Explicit(String),
    /// Sessions found through the API, in API order
    Listed(Vec<Session>),
}

pub struct SessionResolver {
    client: ApiClient,
    filter: SessionFilter,
}

impl SessionResolver {
    pub fn new(client: ApiClient, filter: SessionFilter) -> Self {
        Self { client, filter }
    }

    pub fn filter(&self) -> &SessionFilter {
        &self.filter
    }

    /// Resolve the target sessions.
    ///
    /// A blank explicit id counts as absent. Query failures are returned to
    /// the caller, which decides whether they mean "nothing active".
    pub async fn resolve(&self, explicit: Option<&str>) -> Result<Resolution, ApiError> {
        if let Some(id) = explicit.map(str::trim).filter(|id| !id.is_empty()) {
            return Ok(Resolution::Explicit(id.to_string()));
        }
        self.active().await.map(Resolution::Listed)
    }

    /// Active test drives that pass the filter, in API order
    pub async fn active(&self) -> Result<Vec<Session>, ApiError> {
        let sessions = self.client.list_sessions(Some(SessionStatus::Active)).await?;
        let total = sessions.len();

        let matching: Vec<Session> = sessions
            .into_iter()
            .filter(Session::is_active)
            .filter(|session| match &self.filter {
                SessionFilter::Hardware(id) => session.matches_hardware(id),
                SessionFilter::All => true,
            })
            .collect();

        debug!(
            "[RESOLVER] {} of {} listed test drive(s) match {:?}",
            matching.len(),
            total,
            self.filter
        );
        Ok(matching)
    }
}
