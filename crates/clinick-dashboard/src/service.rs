//! Polling dashboard service
//!
//! While mounted, one interval task fetches reports for the selected month
//! and feeds them to the [`AlarmManager`]. Dashboard state sits behind a
//! single mutex that is never held across an await point.

use crate::ack::{AckQueue, AckReceiver, AckStats};
use crate::manager::{AlarmManager, AlarmView};
use crate::session::SessionStore;
use crate::siren::Siren;
use crate::store::AlarmedIdStore;
use crate::Result;
use chrono::{DateTime, Utc};
use clinick_client::ReportBackend;
use clinick_core::{Config, MonthFilter, Report, ReportId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Shortest accepted poll interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of one fetch-and-reconcile cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No valid session; nothing was fetched and all alarms were stopped.
    /// The poll loop keeps running so a later login resumes it.
    Unauthenticated,
    /// The list request failed; the displayed list was cleared
    FetchFailed,
    /// The list was replaced
    Updated {
        /// Number of reports now displayed
        reports: usize,
        /// Reports that raised an alarm in this cycle
        new_alarms: Vec<ReportId>,
    },
}

#[derive(Debug)]
struct DashboardState {
    reports: Vec<Report>,
    filter: Option<MonthFilter>,
    manager: AlarmManager,
    last_updated: Option<DateTime<Utc>>,
}

struct Inner {
    backend: Arc<dyn ReportBackend>,
    session: SessionStore,
    state: Mutex<DashboardState>,
}

struct Poller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// The incident dashboard
pub struct Dashboard {
    inner: Arc<Inner>,
    poll_interval: Duration,
    poller: Mutex<Option<Poller>>,
    ack_receiver: Mutex<Option<AckReceiver>>,
    ack_worker: Mutex<Option<JoinHandle<()>>>,
    acks: AckQueue,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("backend", &self.inner.backend.name())
            .field("poll_interval", &self.poll_interval)
            .field("polling", &self.is_polling())
            .finish_non_exhaustive()
    }
}

impl Dashboard {
    /// Build a dashboard from configuration
    ///
    /// The month filter starts at the current local month.
    #[must_use]
    pub fn new(config: &Config, backend: Arc<dyn ReportBackend>, siren: Arc<dyn Siren>) -> Self {
        let (acks, ack_receiver) = AckQueue::bounded(config.dashboard.ack_queue_size);
        let manager = AlarmManager::new(
            AlarmedIdStore::new(config.dashboard.alarmed_ids_path()),
            siren,
            acks.clone(),
        );
        let session = SessionStore::new(config.dashboard.session_path(), config.auth.clone());

        Self {
            inner: Arc::new(Inner {
                backend,
                session,
                state: Mutex::new(DashboardState {
                    reports: Vec::new(),
                    filter: Some(MonthFilter::current()),
                    manager,
                    last_updated: None,
                }),
            }),
            poll_interval: config.dashboard.poll_interval().max(MIN_POLL_INTERVAL),
            poller: Mutex::new(None),
            ack_receiver: Mutex::new(Some(ack_receiver)),
            ack_worker: Mutex::new(None),
            acks,
        }
    }

    /// Start with a different month filter; `None` shows every month
    #[must_use]
    pub fn with_filter(self, filter: Option<MonthFilter>) -> Self {
        self.inner.state.lock().filter = filter;
        self
    }

    /// Session used by the dashboard
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// Bring the dashboard up: restore alarmed ids, start the acknowledgment
    /// worker and begin polling
    ///
    /// Returns whether polling started; it does not without a valid session.
    #[instrument(skip(self))]
    pub fn mount(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            state.manager.restore();
            state.manager.stop_all();
        }

        if let Some(receiver) = self.ack_receiver.lock().take() {
            let handle = receiver.spawn(Arc::clone(&self.inner.backend));
            *self.ack_worker.lock() = Some(handle);
        }

        self.start(self.poll_interval)
    }

    /// Begin the recurring fetch-and-reconcile cycle
    ///
    /// Without a valid session this stops any running cycle and all alarms
    /// and returns `false`. An existing cycle is replaced; its in-flight
    /// fetch is left to finish.
    pub fn start(&self, every: Duration) -> bool {
        if !self.inner.session.is_authenticated() {
            info!("No valid session; dashboard is not polling");
            if let Some(previous) = self.poller.lock().take() {
                previous.cancel.cancel();
            }
            self.inner.state.lock().manager.stop_all();
            return false;
        }

        let every = every.max(MIN_POLL_INTERVAL);
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let inner = Arc::clone(&self.inner);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    () = child.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                inner.tick().await;
            }
            debug!("Poll loop exited");
        });

        if let Some(previous) = self.poller.lock().replace(Poller { cancel, handle }) {
            previous.cancel.cancel();
        }
        info!(interval_ms = every.as_millis(), "Polling started");
        true
    }

    /// Run one fetch-and-reconcile cycle now
    pub async fn tick(&self) -> TickOutcome {
        self.inner.tick().await
    }

    /// Change the month filter, fetch immediately and restart the interval
    ///
    /// Returns whether polling is running afterwards. Active alarms are kept.
    #[instrument(skip(self))]
    pub fn set_month(&self, filter: Option<MonthFilter>) -> bool {
        self.inner.state.lock().filter = filter;
        self.start(self.poll_interval)
    }

    /// Selected month filter
    #[must_use]
    pub fn filter(&self) -> Option<MonthFilter> {
        self.inner.state.lock().filter
    }

    /// Reports currently displayed
    #[must_use]
    pub fn reports(&self) -> Vec<Report> {
        self.inner.state.lock().reports.clone()
    }

    /// When reports were last fetched successfully
    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().last_updated
    }

    /// Active alarms, oldest first
    #[must_use]
    pub fn active_alarms(&self) -> Vec<AlarmView> {
        self.inner.state.lock().manager.active_alarms()
    }

    /// Stop one alarm
    pub fn dismiss(&self, id: &ReportId) -> bool {
        self.inner.state.lock().manager.dismiss(id)
    }

    /// Stop every alarm
    pub fn stop_all(&self) -> usize {
        self.inner.state.lock().manager.stop_all()
    }

    /// Acknowledgment counters
    #[must_use]
    pub fn ack_stats(&self) -> AckStats {
        self.acks.stats()
    }

    /// Whether a poll loop is running
    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .as_ref()
            .is_some_and(|p| !p.handle.is_finished())
    }

    /// Stop polling and wait for the loop to exit
    pub async fn stop_polling(&self) {
        let poller = self.poller.lock().take();
        if let Some(poller) = poller {
            poller.cancel.cancel();
            if let Err(e) = poller.handle.await {
                warn!(error = %e, "Poll loop ended abnormally");
            }
        }
    }

    /// End the session, stop polling and silence every alarm
    ///
    /// # Errors
    ///
    /// Returns an error if the session file cannot be removed.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        self.stop_polling().await;
        self.stop_all();
        self.inner.session.logout()
    }

    /// Tear everything down: polling, alarms and the acknowledgment worker
    #[instrument(skip(self))]
    pub async fn unmount(&self) {
        self.stop_polling().await;
        {
            let state = self.inner.state.lock();
            state.manager.persist();
        }
        self.stop_all();

        self.acks.close();
        let worker = self.ack_worker.lock().take();
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            warn!(error = %e, "Acknowledgment worker ended abnormally");
        }
        info!("Dashboard unmounted");
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.get_mut().take() {
            poller.cancel.cancel();
            poller.handle.abort();
        }
    }
}

impl Inner {
    async fn tick(&self) -> TickOutcome {
        let Some(token) = self.session.valid_token() else {
            self.state.lock().manager.stop_all();
            return TickOutcome::Unauthenticated;
        };

        let filter = self.state.lock().filter;
        let fetched = self.backend.list_reports(filter, &token).await;

        let mut state = self.state.lock();
        match fetched {
            Ok(reports) => {
                let new_alarms = state.manager.reconcile(&reports);
                state.last_updated = Some(Utc::now());
                let count = reports.len();
                state.reports = reports;
                drop(state);

                debug!(reports = count, new_alarms = new_alarms.len(), "Reports refreshed");
                TickOutcome::Updated {
                    reports: count,
                    new_alarms,
                }
            }
            Err(e) => {
                state.reports.clear();
                drop(state);

                warn!(error = %e, "Failed to fetch reports");
                TickOutcome::FetchFailed
            }
        }
    }
}
