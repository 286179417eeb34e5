mod common;

use std::time::Duration;

use chrono::{Local, TimeZone, Timelike};
use tokio::sync::watch;
use trackly::{
    management::StartupMarker,
    scheduler::{CronSchedule, IntervalSchedule, ScanScheduler, Schedule, ScheduleError},
};

use common::*;

fn scheduler_in(
    dir: &std::path::Path,
    scanner: TestScanner,
    schedule: Box<dyn Schedule>,
) -> ScanScheduler<FakeSource, FakeNotifier, FakeLibrary> {
    ScanScheduler::new(scanner, schedule, StartupMarker::in_dir(dir))
}

fn hourly() -> Box<dyn Schedule> {
    Box::new(CronSchedule::parse("0 * * * *").unwrap())
}

#[test]
fn test_cron_five_fields() {
    let schedule = CronSchedule::parse("0 * * * *").unwrap();
    let now = Local.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap();

    let next = schedule.next_after(now).unwrap();

    assert_eq!(next, Local.with_ymd_and_hms(2024, 6, 1, 13, 0, 0).unwrap());
    assert_eq!(schedule.expression(), "0 * * * *");
}

#[test]
fn test_cron_six_fields() {
    let schedule = CronSchedule::parse("30 0 * * * *").unwrap();
    let now = Local.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap();

    let next = schedule.next_after(now).unwrap();

    assert_eq!(next.minute(), 0);
    assert_eq!(next.second(), 30);
    assert_eq!(next.hour(), 13);
}

#[test]
fn test_cron_daily() {
    let schedule = CronSchedule::parse("0 3 * * *").unwrap();
    let now = Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    let next = schedule.next_after(now).unwrap();

    assert_eq!(next, Local.with_ymd_and_hms(2024, 6, 2, 3, 0, 0).unwrap());
}

#[test]
fn test_invalid_cron_is_rejected() {
    for expression in ["", "every hour", "61 * * * *", "* * *"] {
        let result = CronSchedule::parse(expression);
        assert!(
            matches!(result, Err(ScheduleError::InvalidCron { .. })),
            "accepted {expression:?}"
        );
    }
}

#[test]
fn test_interval_schedule() {
    let schedule = IntervalSchedule::new(Duration::from_secs(90));
    let now = Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    assert_eq!(
        schedule.next_after(now),
        Some(Local.with_ymd_and_hms(2024, 6, 1, 12, 1, 30).unwrap())
    );
}

#[tokio::test]
async fn test_time_until_next() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = scanner_in(
        dir.path(),
        FakeSource::default(),
        FakeNotifier::default(),
        FakeLibrary::default(),
        quiet_settings(),
    );
    let scheduler = scheduler_in(dir.path(), scanner, hourly());
    let now = Local.with_ymd_and_hms(2024, 6, 1, 12, 45, 0).unwrap();

    assert_eq!(
        scheduler.time_until_next(now),
        Some(Duration::from_secs(15 * 60))
    );
}

#[tokio::test]
async fn test_first_startup_is_announced_once() {
    let dir = tempfile::tempdir().unwrap();
    let now = Local::now();
    let scanner = scanner_in(
        dir.path(),
        FakeSource::default(),
        FakeNotifier::default(),
        FakeLibrary::default(),
        quiet_settings(),
    );
    seed_catalog(&scanner, Vec::new(), now).await;
    let scheduler = scheduler_in(dir.path(), scanner, hourly());

    scheduler.startup(now).await.unwrap();
    scheduler.startup(now).await.unwrap();

    assert_eq!(scheduler.scanner().notifier().startups(), 1);
    let raw = std::fs::read_to_string(dir.path().join("startup.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["initial_startup_complete"], true);
    assert!(value["first_startup_time"].is_string());
}

#[tokio::test]
async fn test_startup_marker_from_earlier_run_suppresses_announcement() {
    let dir = tempfile::tempdir().unwrap();
    StartupMarker::in_dir(dir.path()).mark_complete().await.unwrap();
    let now = Local::now();
    let scanner = scanner_in(
        dir.path(),
        FakeSource::default(),
        FakeNotifier::default(),
        FakeLibrary::default(),
        quiet_settings(),
    );
    seed_catalog(&scanner, Vec::new(), now).await;
    let scheduler = scheduler_in(dir.path(), scanner, hourly());

    scheduler.startup(now).await.unwrap();

    assert_eq!(scheduler.scanner().notifier().startups(), 0);
}

#[tokio::test]
async fn test_startup_rebuilds_missing_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakeSource::default().with_id("Autechre", "def456");
    let library = FakeLibrary::default().with_directory("Autechre");
    let scanner = scanner_in(
        dir.path(),
        source,
        FakeNotifier::default(),
        library,
        quiet_settings(),
    );
    let scheduler = scheduler_in(dir.path(), scanner, hourly());

    let scan_now = scheduler.startup(Local::now()).await.unwrap();

    assert!(scan_now);
    let artists = scheduler.scanner().catalog().artists().await.unwrap();
    assert_eq!(artists[0].external_id.as_deref(), Some("def456"));
}

#[tokio::test]
async fn test_startup_fails_when_catalog_cannot_be_built() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = scanner_in(
        dir.path(),
        FakeSource::default(),
        FakeNotifier::default(),
        FakeLibrary::broken(),
        quiet_settings(),
    );
    let scheduler = scheduler_in(dir.path(), scanner, hourly());

    let result = scheduler.startup(Local::now()).await;

    assert!(matches!(result, Err(ScheduleError::Startup(_))));
}

#[tokio::test]
async fn test_startup_scan_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let now = Local::now();
    let scanner = scanner_in(
        dir.path(),
        FakeSource::default(),
        FakeNotifier::default(),
        FakeLibrary::default(),
        quiet_settings(),
    );
    seed_catalog(&scanner, Vec::new(), now).await;
    let scheduler = scheduler_in(dir.path(), scanner, hourly()).with_scan_on_startup(false);

    assert!(!scheduler.startup(now).await.unwrap());
}

#[tokio::test]
async fn test_fresh_install_scans_even_when_startup_scan_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let library = FakeLibrary::default().with_directory("Autechre");
    let scanner = scanner_in(
        dir.path(),
        FakeSource::default(),
        FakeNotifier::default(),
        library,
        quiet_settings(),
    );
    let scheduler = scheduler_in(dir.path(), scanner, hourly()).with_scan_on_startup(false);

    assert!(scheduler.startup(Local::now()).await.unwrap());
}

#[tokio::test]
async fn test_run_once_swallows_failures() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = scanner_in(
        dir.path(),
        FakeSource::default(),
        FakeNotifier::default(),
        FakeLibrary::broken(),
        quiet_settings(),
    );
    let scheduler = scheduler_in(dir.path(), scanner, hourly());
    let (_tx, rx) = watch::channel(false);

    assert!(scheduler.run_once(&rx).await.is_none());
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let scanner = scanner_in(
        dir.path(),
        FakeSource::default(),
        FakeNotifier::default(),
        FakeLibrary::default(),
        quiet_settings(),
    );
    seed_catalog(&scanner, Vec::new(), Local::now()).await;
    let scheduler = scheduler_in(
        dir.path(),
        scanner,
        Box::new(IntervalSchedule::new(Duration::from_secs(3600))),
    );
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = tx.send(true);
    });

    let result = tokio::time::timeout(Duration::from_secs(10), scheduler.run(rx)).await;

    assert!(matches!(result, Ok(Ok(()))));
    assert_eq!(scheduler.scanner().notifier().startups(), 1);
}

#[tokio::test]
async fn test_run_scans_on_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let year = Local::now().format("%Y").to_string();
    let source = FakeSource::default().with_groups(
        "abc123",
        vec![release_group("Album X", &format!("{year}-01-01"))],
    );
    let scanner = scanner_in(
        dir.path(),
        source,
        FakeNotifier::default(),
        FakeLibrary::default(),
        quiet_settings(),
    );
    seed_catalog(
        &scanner,
        vec![artist("Boards of Canada", Some("abc123"))],
        Local::now(),
    )
    .await;
    let scheduler = scheduler_in(
        dir.path(),
        scanner,
        Box::new(IntervalSchedule::new(Duration::from_millis(50))),
    )
    .with_scan_on_startup(false);
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let _ = tx.send(true);
    });

    tokio::time::timeout(Duration::from_secs(10), scheduler.run(rx))
        .await
        .unwrap()
        .unwrap();

    assert!(!scheduler.scanner().source().queried().is_empty());
    assert_eq!(scheduler.scanner().notifier().sent().len(), 1);
}
