//! Backend seam used by the dashboard and submission flows

use crate::error::ClientResult;
use async_trait::async_trait;
use clinick_core::{MonthFilter, NewReport, Report, ReportId};

/// Operations the dashboard needs from the incident backend
///
/// [`crate::ApiClient`] talks HTTP; the `mock` feature adds an in-memory
/// implementation for tests.
#[async_trait]
pub trait ReportBackend: Send + Sync {
    /// Create a report from a validated draft
    async fn create_report(&self, report: &NewReport) -> ClientResult<()>;

    /// List reports, optionally restricted to one month
    async fn list_reports(
        &self,
        filter: Option<MonthFilter>,
        token: &str,
    ) -> ClientResult<Vec<Report>>;

    /// Flag a report as observed by a dashboard
    async fn mark_seen(&self, id: &ReportId) -> ClientResult<()>;

    /// Register a push-notification token
    async fn save_push_token(&self, token: &str) -> ClientResult<()>;

    /// Backend name for logging
    fn name(&self) -> &str;
}
