//! End-to-end dashboard behaviour against an in-memory backend

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use clinick_client::MockBackend;
use clinick_core::{Config, MonthFilter, Report, ReportId};
use clinick_dashboard::{Dashboard, Playback, SilentSiren, Siren, TickOutcome};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Siren that counts playbacks still sounding
#[derive(Debug, Default)]
struct CountingSiren {
    live: Arc<AtomicUsize>,
    raised: AtomicUsize,
}

#[derive(Debug)]
struct CountingPlayback {
    live: Arc<AtomicUsize>,
    playing: bool,
}

impl Playback for CountingPlayback {
    fn stop(&mut self) {
        if self.playing {
            self.playing = false;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}

impl Siren for CountingSiren {
    fn sound(&self, _report_id: &ReportId, _location: &str) -> Box<dyn Playback> {
        self.live.fetch_add(1, Ordering::SeqCst);
        self.raised.fetch_add(1, Ordering::SeqCst);
        Box::new(CountingPlayback {
            live: Arc::clone(&self.live),
            playing: true,
        })
    }
}

fn config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.dashboard.data_dir = dir.path().to_path_buf();
    config
}

fn report(id: serde_json::Value, seen: bool, location: &str) -> Report {
    serde_json::from_value(json!({ "id": id, "location": location, "seen": seen })).unwrap()
}

fn logged_in(dir: &TempDir, backend: &Arc<MockBackend>, siren: Arc<dyn Siren>) -> Dashboard {
    let config = config(dir);
    let dashboard = Dashboard::new(&config, backend.clone(), siren);
    dashboard.session().login("clinick123").unwrap();
    dashboard
}

#[tokio::test]
async fn empty_session_never_lists() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new().with_reports(vec![report(json!(1), false, "Room A")]));
    let siren = Arc::new(CountingSiren::default());
    let dashboard = Dashboard::new(&config(&dir), backend.clone(), siren.clone());

    assert!(!dashboard.mount());
    assert_eq!(dashboard.tick().await, TickOutcome::Unauthenticated);
    assert!(!dashboard.set_month(Some(MonthFilter::new(2025, 3).unwrap())));

    assert_eq!(backend.list_calls(), 0);
    assert_eq!(siren.raised.load(Ordering::SeqCst), 0);
    dashboard.unmount().await;
}

#[tokio::test]
async fn unseen_report_alarms_once_across_two_polls() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new().with_reports(vec![report(json!(1), false, "Room A")]));
    // Keep the report unseen on the backend so both polls return it as new
    backend.fail_mark_seen(true);
    let siren = Arc::new(CountingSiren::default());
    let dashboard = logged_in(&dir, &backend, siren.clone());

    let first = dashboard.tick().await;
    assert_eq!(
        first,
        TickOutcome::Updated {
            reports: 1,
            new_alarms: vec![ReportId::new("1")],
        }
    );
    let second = dashboard.tick().await;
    assert_eq!(
        second,
        TickOutcome::Updated {
            reports: 1,
            new_alarms: vec![],
        }
    );

    assert_eq!(siren.raised.load(Ordering::SeqCst), 1);
    let alarms = dashboard.active_alarms();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].location, "Room A");
    assert_eq!(dashboard.ack_stats().enqueued, 1);
}

#[tokio::test]
async fn fetch_failure_clears_list_and_next_tick_recovers() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new().with_reports(vec![report(json!("a"), true, "Gym")]));
    let dashboard = logged_in(&dir, &backend, Arc::new(SilentSiren));

    dashboard.tick().await;
    assert_eq!(dashboard.reports().len(), 1);

    backend.fail_list(true);
    assert_eq!(dashboard.tick().await, TickOutcome::FetchFailed);
    assert!(dashboard.reports().is_empty());

    backend.fail_list(false);
    dashboard.tick().await;
    assert_eq!(dashboard.reports().len(), 1);
}

#[tokio::test]
async fn dismissed_alarm_does_not_return() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new().with_reports(vec![report(json!("x"), false, "Lab")]));
    backend.fail_mark_seen(true);
    let siren = Arc::new(CountingSiren::default());
    let dashboard = logged_in(&dir, &backend, siren.clone());

    dashboard.tick().await;
    assert!(dashboard.dismiss(&ReportId::new("x")));
    assert_eq!(siren.live.load(Ordering::SeqCst), 0);

    dashboard.tick().await;
    assert!(dashboard.active_alarms().is_empty());
    assert_eq!(siren.raised.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stop_all_and_logout_silence_everything() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new().with_reports(vec![
        report(json!("1"), false, "A"),
        report(json!("2"), false, "B"),
        report(json!("3"), true, "C"),
    ]));
    let siren = Arc::new(CountingSiren::default());
    let dashboard = logged_in(&dir, &backend, siren.clone());

    dashboard.tick().await;
    assert_eq!(siren.live.load(Ordering::SeqCst), 2);
    assert_eq!(dashboard.stop_all(), 2);
    assert_eq!(siren.live.load(Ordering::SeqCst), 0);
    assert!(dashboard.active_alarms().is_empty());

    backend.set_reports(vec![report(json!("4"), false, "D")]);
    dashboard.tick().await;
    assert_eq!(siren.live.load(Ordering::SeqCst), 1);

    dashboard.logout().await.unwrap();
    assert_eq!(siren.live.load(Ordering::SeqCst), 0);
    assert!(!dashboard.session().is_authenticated());

    let calls = backend.list_calls();
    assert_eq!(dashboard.tick().await, TickOutcome::Unauthenticated);
    assert_eq!(backend.list_calls(), calls);
}

#[tokio::test]
async fn alarmed_ids_persist_across_mounts() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new().with_reports(vec![report(json!(7), false, "Ward")]));
    backend.fail_mark_seen(true);

    {
        let siren = Arc::new(CountingSiren::default());
        let dashboard = logged_in(&dir, &backend, siren.clone());
        dashboard.tick().await;
        assert_eq!(siren.raised.load(Ordering::SeqCst), 1);
        dashboard.unmount().await;
        assert_eq!(siren.live.load(Ordering::SeqCst), 0);
    }

    let siren = Arc::new(CountingSiren::default());
    let dashboard = Dashboard::new(&config(&dir), backend.clone(), siren.clone());
    assert!(dashboard.mount());
    dashboard.tick().await;
    assert_eq!(siren.raised.load(Ordering::SeqCst), 0);
    dashboard.unmount().await;
}

#[tokio::test]
async fn corrupt_alarmed_file_resets_on_mount() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("alarmed.json"), "{{{").unwrap();
    let backend = Arc::new(MockBackend::new().with_reports(vec![report(json!(7), false, "Ward")]));
    let siren = Arc::new(CountingSiren::default());
    let dashboard = logged_in(&dir, &backend, siren.clone());

    assert!(dashboard.mount());
    dashboard.tick().await;
    assert_eq!(siren.raised.load(Ordering::SeqCst), 1);
    dashboard.unmount().await;

    let stored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("alarmed.json")).unwrap())
            .unwrap();
    assert_eq!(stored, json!({ "version": 1, "ids": ["7"] }));
}

#[tokio::test]
async fn filter_defaults_to_current_month() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new());
    let dashboard = logged_in(&dir, &backend, Arc::new(SilentSiren));

    assert_eq!(dashboard.filter(), Some(MonthFilter::current()));
    dashboard.tick().await;
    assert_eq!(backend.filters(), vec![Some(MonthFilter::current())]);

    assert!(dashboard.set_month(None));
    assert_eq!(dashboard.filter(), None);
    dashboard.unmount().await;
}

#[tokio::test]
async fn session_removed_mid_poll_silences_alarms() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new().with_reports(vec![
        report(json!("1"), false, "A"),
        report(json!("2"), false, "B"),
    ]));
    backend.fail_mark_seen(true);
    let siren = Arc::new(CountingSiren::default());
    let dashboard = logged_in(&dir, &backend, siren.clone());

    dashboard.tick().await;
    assert_eq!(siren.live.load(Ordering::SeqCst), 2);

    std::fs::remove_file(dashboard.session().path()).unwrap();
    let calls = backend.list_calls();

    assert_eq!(dashboard.tick().await, TickOutcome::Unauthenticated);
    assert_eq!(siren.live.load(Ordering::SeqCst), 0);
    assert!(dashboard.active_alarms().is_empty());
    assert_eq!(backend.list_calls(), calls);
}

#[tokio::test]
async fn month_change_refetches_with_filter_and_keeps_alarms() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new().with_reports(vec![report(json!(1), false, "Room A")]));
    backend.fail_mark_seen(true);
    let dashboard = logged_in(&dir, &backend, Arc::new(SilentSiren));

    dashboard.tick().await;
    assert_eq!(dashboard.active_alarms().len(), 1);

    let march = MonthFilter::new(2025, 3).unwrap();
    assert!(dashboard.set_month(Some(march)));
    assert_eq!(dashboard.filter(), Some(march));
    dashboard.tick().await;

    assert_eq!(backend.filters().last().copied().flatten(), Some(march));
    assert_eq!(dashboard.active_alarms().len(), 1);
    dashboard.unmount().await;
}

#[tokio::test(start_paused = true)]
async fn mounted_dashboard_polls_and_acknowledges() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(MockBackend::new().with_reports(vec![report(json!(1), false, "Room A")]));
    let dashboard = logged_in(&dir, &backend, Arc::new(SilentSiren));

    assert!(dashboard.mount());
    assert!(dashboard.is_polling());

    tokio::time::sleep(Duration::from_millis(5_050)).await;
    assert!(backend.list_calls() >= 2);
    assert_eq!(dashboard.active_alarms().len(), 1);

    dashboard.unmount().await;
    assert!(!dashboard.is_polling());
    assert!(dashboard.active_alarms().is_empty());
    assert_eq!(backend.seen_calls(), vec![ReportId::new("1")]);
    assert_eq!(dashboard.ack_stats().acknowledged, 1);

    let calls = backend.list_calls();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(backend.list_calls(), calls);
}
