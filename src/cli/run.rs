use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    cli::{build_scanner, shutdown_signal},
    config::Config,
    error, info,
    management::StartupMarker,
    scheduler::{CronSchedule, ScanScheduler},
    success, warning,
};

/// Runs the service until Ctrl-C: startup sequence, then cron driven scans.
///
/// # Behavior
///
/// 1. Parses `UPDATE_INTERVAL`; an invalid expression exits before anything else
/// 2. Creates the data directory
/// 3. Sends the one-time startup notification on the very first start
/// 4. Validates or rebuilds the artist catalog (a failed rebuild exits)
/// 5. Runs a startup pass when `SCAN_ON_STARTUP` allows it
/// 6. Scans on every cron fire time until interrupted
///
/// # Example
///
/// ```bash
/// UPDATE_INTERVAL="0 */6 * * *" DISCORD_WEBHOOK=https://... trackly run
/// ```
pub async fn run(config: Config) {
    let schedule = match CronSchedule::parse(&config.update_interval) {
        Ok(schedule) => schedule,
        Err(e) => error!("Invalid UPDATE_INTERVAL: {}", e),
    };

    if let Err(e) = async_fs::create_dir_all(&config.data_dir).await {
        error!(
            "Cannot create data directory {}: {}",
            config.data_dir.display(),
            e
        );
    }

    let scanner = match build_scanner(&config) {
        Ok(scanner) => scanner,
        Err(e) => error!("Cannot set up scanner: {}", e),
    };

    info!(
        "Starting Trackly. Music: {}, data: {}, schedule: {}",
        config.music_dir.display(),
        config.data_dir.display(),
        schedule.expression()
    );

    let scheduler = ScanScheduler::new(
        scanner,
        Box::new(schedule),
        StartupMarker::in_dir(&config.data_dir),
    )
    .with_scan_on_startup(config.scan_on_startup);

    match scheduler.run(shutdown_signal()).await {
        Ok(()) => success!("Trackly stopped"),
        Err(e) => error!("Critical error during startup: {}", e),
    }
}

/// Runs one scan pass now and prints a summary.
///
/// Ctrl-C stops the pass at the next artist boundary.
pub async fn scan(config: Config) {
    let scanner = match build_scanner(&config) {
        Ok(scanner) => scanner,
        Err(e) => error!("Cannot set up scanner: {}", e),
    };

    let pb = ProgressBar::new_spinner();
    pb.set_message("Scanning for new releases...");
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }

    let result = scanner.run_pass(&shutdown_signal()).await;
    pb.finish_and_clear();

    match result {
        Ok(report) => {
            if report.artists_failed > 0 {
                warning!("{} artists could not be checked", report.artists_failed);
            }
            if report.interrupted {
                warning!("Scan interrupted");
            }
            success!(
                "Scan finished: {} artists checked, {} skipped, {} new releases ({} delivered)",
                report.artists_checked,
                report.artists_skipped,
                report.new_releases,
                report.delivered
            );
        }
        Err(e) => error!("Scan failed: {}", e),
    }
}
