//! In-memory backend for testing

use crate::backend::ReportBackend;
use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use clinick_core::{MonthFilter, NewReport, Report, ReportId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Mock backend that records every call
///
/// By default `mark_seen` flips the stored report's `seen` flag the way the
/// real server does.
#[derive(Debug, Default)]
pub struct MockBackend {
    reports: Mutex<Vec<Report>>,
    fail_list: AtomicBool,
    fail_mark_seen: AtomicBool,
    fail_create: AtomicBool,
    list_calls: AtomicUsize,
    filters: Mutex<Vec<Option<MonthFilter>>>,
    seen_calls: Mutex<Vec<ReportId>>,
    created: Mutex<Vec<NewReport>>,
    push_tokens: Mutex<Vec<String>>,
}

impl MockBackend {
    /// Create an empty mock backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the backend with reports
    #[must_use]
    pub fn with_reports(self, reports: Vec<Report>) -> Self {
        *self.reports.lock() = reports;
        self
    }

    /// Replace the stored reports
    pub fn set_reports(&self, reports: Vec<Report>) {
        *self.reports.lock() = reports;
    }

    /// Make `list_reports` fail until reset
    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Make `mark_seen` fail until reset
    pub fn fail_mark_seen(&self, fail: bool) {
        self.fail_mark_seen.store(fail, Ordering::SeqCst);
    }

    /// Make `create_report` fail until reset
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Number of `list_reports` calls so far
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Filters passed to `list_reports`, in call order
    #[must_use]
    pub fn filters(&self) -> Vec<Option<MonthFilter>> {
        self.filters.lock().clone()
    }

    /// Ids passed to `mark_seen`, in call order
    #[must_use]
    pub fn seen_calls(&self) -> Vec<ReportId> {
        self.seen_calls.lock().clone()
    }

    /// Reports received through `create_report`
    #[must_use]
    pub fn created(&self) -> Vec<NewReport> {
        self.created.lock().clone()
    }

    /// Tokens received through `save_push_token`
    #[must_use]
    pub fn push_tokens(&self) -> Vec<String> {
        self.push_tokens.lock().clone()
    }
}

#[async_trait]
impl ReportBackend for MockBackend {
    async fn create_report(&self, report: &NewReport) -> ClientResult<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ClientError::Status {
                endpoint: "/report".to_string(),
                status: 500,
            });
        }
        self.created.lock().push(report.clone());
        Ok(())
    }

    async fn list_reports(
        &self,
        filter: Option<MonthFilter>,
        _token: &str,
    ) -> ClientResult<Vec<Report>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.filters.lock().push(filter);

        if self.fail_list.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable("list failure injected".to_string()));
        }
        Ok(self.reports.lock().clone())
    }

    async fn mark_seen(&self, id: &ReportId) -> ClientResult<()> {
        self.seen_calls.lock().push(id.clone());

        if self.fail_mark_seen.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable(
                "mark-seen failure injected".to_string(),
            ));
        }

        for report in self.reports.lock().iter_mut().filter(|r| &r.id == id) {
            report.seen = true;
        }
        Ok(())
    }

    async fn save_push_token(&self, token: &str) -> ClientResult<()> {
        self.push_tokens.lock().push(token.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
