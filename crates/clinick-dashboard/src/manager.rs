//! Alarm bookkeeping for the dashboard
//!
//! Every unseen report alarms exactly once per install: its id goes into the
//! durable [`AlarmedIdSet`] the moment the alarm is raised, so later polls
//! and restarts skip it even if the backend still reports it as unseen.

use crate::ack::AckQueue;
use crate::siren::{Playback, Siren};
use crate::store::{AlarmedIdSet, AlarmedIdStore};
use chrono::{DateTime, Utc};
use clinick_core::{Report, ReportId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A currently sounding alarm
#[derive(Debug)]
pub struct ActiveAlarm {
    report_id: ReportId,
    location: String,
    raised_at: DateTime<Utc>,
    playback: Box<dyn Playback>,
}

impl ActiveAlarm {
    /// Report that raised the alarm
    #[must_use]
    pub const fn report_id(&self) -> &ReportId {
        &self.report_id
    }

    /// Location shown in the banner
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// When the alarm was raised
    #[must_use]
    pub const fn raised_at(&self) -> DateTime<Utc> {
        self.raised_at
    }

    /// Whether the playback is still sounding
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    fn view(&self) -> AlarmView {
        AlarmView {
            report_id: self.report_id.clone(),
            location: self.location.clone(),
            raised_at: self.raised_at,
        }
    }
}

impl Drop for ActiveAlarm {
    fn drop(&mut self) {
        self.playback.stop();
    }
}

/// Snapshot of an active alarm for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmView {
    /// Report that raised the alarm
    pub report_id: ReportId,
    /// Location shown in the banner
    pub location: String,
    /// When the alarm was raised
    pub raised_at: DateTime<Utc>,
}

/// Tracks alarmed ids and live alarms
pub struct AlarmManager {
    alarmed: AlarmedIdSet,
    store: AlarmedIdStore,
    active: Vec<ActiveAlarm>,
    siren: Arc<dyn Siren>,
    acks: AckQueue,
}

impl fmt::Debug for AlarmManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlarmManager")
            .field("alarmed", &self.alarmed.len())
            .field("active", &self.active.len())
            .field("store", &self.store.path())
            .finish_non_exhaustive()
    }
}

impl AlarmManager {
    /// Create a manager with an empty alarmed set; call [`restore`](Self::restore)
    /// to load the durable one
    pub fn new(store: AlarmedIdStore, siren: Arc<dyn Siren>, acks: AckQueue) -> Self {
        Self {
            alarmed: AlarmedIdSet::new(),
            store,
            active: Vec::new(),
            siren,
            acks,
        }
    }

    /// Replace the in-memory set with the stored one
    pub fn restore(&mut self) {
        self.alarmed = self.store.load();
    }

    /// Save the alarmed set; failures are logged
    pub fn persist(&self) {
        if let Err(e) = self.store.save(&self.alarmed) {
            warn!(error = %e, "Failed to persist alarmed ids");
        }
    }

    /// Raise alarms for unseen reports that have never alarmed
    ///
    /// Reports are handled in the order given. Returns the ids that alarmed.
    pub fn reconcile(&mut self, reports: &[Report]) -> Vec<ReportId> {
        let mut raised = Vec::new();

        for report in reports.iter().filter(|r| !r.seen) {
            if report.id.as_str().is_empty() {
                debug!("Skipping report without id");
                continue;
            }
            if self.alarmed.contains(&report.id) {
                continue;
            }

            let playback = self.siren.sound(&report.id, &report.location);
            self.active.push(ActiveAlarm {
                report_id: report.id.clone(),
                location: report.location.clone(),
                raised_at: Utc::now(),
                playback,
            });
            self.alarmed.insert(report.id.clone());
            info!(report_id = %report.id, location = %report.location, "Alarm raised");
            raised.push(report.id.clone());
        }

        if !raised.is_empty() {
            self.persist();
            for id in &raised {
                self.acks.enqueue(id.clone());
            }
        }

        raised
    }

    /// Stop one alarm; the id stays alarmed
    pub fn dismiss(&mut self, id: &ReportId) -> bool {
        let Some(index) = self.active.iter().position(|a| &a.report_id == id) else {
            return false;
        };

        let mut alarm = self.active.remove(index);
        alarm.playback.stop();
        info!(report_id = %id, "Alarm dismissed");
        true
    }

    /// Stop every alarm; returns how many were sounding
    pub fn stop_all(&mut self) -> usize {
        let count = self.active.len();
        for mut alarm in self.active.drain(..) {
            alarm.playback.stop();
        }
        if count > 0 {
            info!(count, "All alarms stopped");
        }
        count
    }

    /// Snapshot of active alarms, oldest first
    #[must_use]
    pub fn active_alarms(&self) -> Vec<AlarmView> {
        self.active.iter().map(ActiveAlarm::view).collect()
    }

    /// Number of active alarms
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Whether `id` has an active alarm
    #[must_use]
    pub fn is_active(&self, id: &ReportId) -> bool {
        self.active.iter().any(|a| &a.report_id == id)
    }

    /// Whether `id` has ever alarmed
    #[must_use]
    pub fn is_alarmed(&self, id: &ReportId) -> bool {
        self.alarmed.contains(id)
    }

    /// The durable alarmed set
    #[must_use]
    pub const fn alarmed_ids(&self) -> &AlarmedIdSet {
        &self.alarmed
    }

    /// Acknowledgment queue fed by new alarms
    #[must_use]
    pub const fn acks(&self) -> &AckQueue {
        &self.acks
    }
}

impl Drop for AlarmManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::ack::AckReceiver;
    use crate::siren::SilentSiren;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn report(id: &str, seen: bool, location: &str) -> Report {
        serde_json::from_value(serde_json::json!({
            "_id": id,
            "location": location,
            "seen": seen
        }))
        .unwrap()
    }

    fn manager(dir: &TempDir) -> (AlarmManager, AckReceiver) {
        let (acks, receiver) = AckQueue::bounded(64);
        let store = AlarmedIdStore::new(dir.path().join("alarmed.json"));
        (AlarmManager::new(store, Arc::new(SilentSiren), acks), receiver)
    }

    #[test]
    fn test_unseen_report_alarms_once_across_polls() {
        let dir = TempDir::new().unwrap();
        let (mut manager, receiver) = manager(&dir);
        let reports = vec![report("1", false, "Room A")];

        assert_eq!(manager.reconcile(&reports), vec![ReportId::new("1")]);
        assert!(manager.reconcile(&reports).is_empty());

        assert_eq!(manager.active_count(), 1);
        assert_eq!(manager.active_alarms()[0].location, "Room A");
        assert!(manager.is_alarmed(&ReportId::new("1")));

        assert_eq!(receiver.try_next().unwrap().report_id, ReportId::new("1"));
        assert!(receiver.try_next().is_none());
    }

    #[test]
    fn test_seen_reports_never_alarm() {
        let dir = TempDir::new().unwrap();
        let (mut manager, receiver) = manager(&dir);

        assert!(manager.reconcile(&[report("1", true, "Gym")]).is_empty());
        assert_eq!(manager.active_count(), 0);
        assert!(!manager.is_alarmed(&ReportId::new("1")));
        assert!(receiver.try_next().is_none());
    }

    #[test]
    fn test_backend_order_is_kept() {
        let dir = TempDir::new().unwrap();
        let (mut manager, _receiver) = manager(&dir);

        let raised = manager.reconcile(&[
            report("b", false, "Gym"),
            report("a", false, "Lab"),
            report("b", false, "Gym"),
        ]);

        assert_eq!(raised, vec![ReportId::new("b"), ReportId::new("a")]);
        let order: Vec<String> = manager
            .active_alarms()
            .into_iter()
            .map(|a| a.location)
            .collect();
        assert_eq!(order, vec!["Gym", "Lab"]);
    }

    #[test]
    fn test_dismissed_ids_do_not_realarm() {
        let dir = TempDir::new().unwrap();
        let (mut manager, _receiver) = manager(&dir);
        let reports = vec![report("1", false, "Room A")];

        manager.reconcile(&reports);
        assert!(manager.dismiss(&ReportId::new("1")));
        assert!(!manager.dismiss(&ReportId::new("1")));

        assert!(manager.reconcile(&reports).is_empty());
        assert_eq!(manager.active_count(), 0);
        assert!(manager.is_alarmed(&ReportId::new("1")));
    }

    #[test]
    fn test_stop_all_leaves_nothing_active() {
        let dir = TempDir::new().unwrap();
        let (mut manager, _receiver) = manager(&dir);

        manager.reconcile(&[report("1", false, "A"), report("2", false, "B")]);
        assert_eq!(manager.stop_all(), 2);
        assert_eq!(manager.active_count(), 0);
        assert_eq!(manager.stop_all(), 0);
    }

    #[test]
    fn test_alarmed_ids_survive_restart() {
        let dir = TempDir::new().unwrap();
        {
            let (mut manager, _receiver) = manager(&dir);
            manager.reconcile(&[report("1", false, "Room A")]);
        }

        let (mut manager, receiver) = manager(&dir);
        manager.restore();
        assert!(manager.is_alarmed(&ReportId::new("1")));
        assert!(manager.reconcile(&[report("1", false, "Room A")]).is_empty());
        assert!(receiver.try_next().is_none());
    }

    #[test]
    fn test_corrupt_storage_restores_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("alarmed.json"), "not json").unwrap();

        let (mut manager, _receiver) = manager(&dir);
        manager.restore();
        assert!(manager.alarmed_ids().is_empty());
        assert_eq!(manager.reconcile(&[report("1", false, "A")]).len(), 1);
    }

    #[test]
    fn test_persist_failure_still_alarms() {
        let dir = TempDir::new().unwrap();
        // The parent of the store path is a file, so every save fails
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let (acks, _receiver) = AckQueue::bounded(4);
        let mut manager = AlarmManager::new(
            AlarmedIdStore::new(blocker.join("alarmed.json")),
            Arc::new(SilentSiren),
            acks,
        );

        assert_eq!(manager.reconcile(&[report("1", false, "A")]).len(), 1);
        assert!(manager.reconcile(&[report("1", false, "A")]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_no_duplicate_simultaneous_alarms(
            polls in prop::collection::vec(
                prop::collection::vec((0u8..12, any::<bool>()), 0..10),
                1..8,
            ),
            dismiss_mask in prop::collection::vec(any::<bool>(), 0..8),
        ) {
            let dir = TempDir::new().unwrap();
            let (mut manager, _receiver) = manager(&dir);
            let mut ever_raised = HashSet::new();

            for (poll_index, poll) in polls.iter().enumerate() {
                let reports: Vec<Report> = poll
                    .iter()
                    .map(|(id, seen)| report(&id.to_string(), *seen, "Ward"))
                    .collect();

                for id in manager.reconcile(&reports) {
                    prop_assert!(ever_raised.insert(id), "an id alarmed twice");
                }

                let active: Vec<ReportId> = manager
                    .active_alarms()
                    .into_iter()
                    .map(|a| a.report_id)
                    .collect();
                let unique: HashSet<&ReportId> = active.iter().collect();
                prop_assert_eq!(unique.len(), active.len());

                if dismiss_mask.get(poll_index).copied().unwrap_or(false) {
                    if let Some(first) = active.first() {
                        manager.dismiss(first);
                    }
                }
            }
        }
    }
}
