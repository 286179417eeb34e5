use chrono::{Datelike, Local};
use tabled::Table;

use crate::{config::Config, info, management::NotificationLedger, utils, warning};

/// Shows the releases announced in `year` (default: current year).
pub async fn list_releases(config: Config, year: Option<i32>) {
    let ledger = NotificationLedger::new(&config.data_dir);
    let year = year.unwrap_or_else(|| Local::now().year());

    if !ledger.partition_exists(year).await {
        let years = ledger.years().await;
        if years.is_empty() {
            warning!("No releases have been announced yet.");
        } else {
            let years: Vec<String> = years.iter().map(|y| y.to_string()).collect();
            warning!(
                "No releases recorded for {}. Available years: {}",
                year,
                years.join(", ")
            );
        }
        return;
    }

    let entries = ledger.entries(year).await;
    if entries.is_empty() {
        info!("No releases announced in {}", year);
        return;
    }

    println!(
        "Year: {year}\n{table}\n",
        year = year,
        table = Table::new(utils::release_rows(&entries))
    );
    info!("{} releases announced in {}", entries.len(), year);
}
