//! Incident report submission

use crate::{DashboardError, Result};
use clinick_client::ReportBackend;
use clinick_core::ReportDraft;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

/// Message shown after a successful submission
pub const CONFIRMATION_MESSAGE: &str = "The clinic has been alerted!";

/// A confirmation that hides itself after a fixed delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    shown_at: Instant,
    visible_for: Duration,
}

impl Confirmation {
    /// Confirmation shown at `shown_at` for `visible_for`
    #[must_use]
    pub const fn new(shown_at: Instant, visible_for: Duration) -> Self {
        Self {
            shown_at,
            visible_for,
        }
    }

    /// Text to display
    #[must_use]
    pub const fn message(&self) -> &'static str {
        CONFIRMATION_MESSAGE
    }

    /// When the confirmation disappears
    #[must_use]
    pub fn hides_at(&self) -> Instant {
        self.shown_at + self.visible_for
    }

    /// Whether the confirmation is visible at `now`
    #[must_use]
    pub fn is_visible_at(&self, now: Instant) -> bool {
        now >= self.shown_at && now < self.hides_at()
    }

    /// Whether the confirmation is visible now
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.is_visible_at(Instant::now())
    }

    /// Wait until the confirmation hides
    pub async fn hidden(&self) {
        tokio::time::sleep_until(self.hides_at()).await;
    }
}

/// Submits drafts to the backend
pub struct ReportSubmitter {
    backend: Arc<dyn ReportBackend>,
    confirmation_for: Duration,
}

impl std::fmt::Debug for ReportSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportSubmitter")
            .field("backend", &self.backend.name())
            .field("confirmation_for", &self.confirmation_for)
            .finish()
    }
}

impl ReportSubmitter {
    /// Submitter whose confirmations stay visible for `confirmation_for`
    #[must_use]
    pub fn new(backend: Arc<dyn ReportBackend>, confirmation_for: Duration) -> Self {
        Self {
            backend,
            confirmation_for,
        }
    }

    /// Validate and send a draft
    ///
    /// On success the draft is cleared. On any failure it is left untouched
    /// so it can be resubmitted.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a missing field,
    /// [`DashboardError::SubmissionRejected`] for a non-success status and
    /// [`DashboardError::SubmissionFailed`] when the backend is unreachable.
    #[instrument(skip(self, draft))]
    pub async fn submit(&self, draft: &mut ReportDraft) -> Result<Confirmation> {
        let report = draft.validate()?;

        if let Err(e) = self.backend.create_report(&report).await {
            warn!(error = %e, "Report submission failed");
            return Err(DashboardError::from_submission(e));
        }

        info!(location = %report.location, severity = %report.severity, "Report submitted");
        draft.clear();
        Ok(Confirmation::new(Instant::now(), self.confirmation_for))
    }
}
