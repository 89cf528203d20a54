use super::ui;
use crate::core::config::SyncSettings;
use crate::core::model::{SyncAttempt, SyncStatus};
use crate::store::RecordStore;
use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::{Cell, CellAlignment, Color};
use futures::future::join_all;

/// Prints a per-account overview: sync state, recency, and the attempt
/// counts the failure circuit would see right now.
pub async fn run(store: &dyn RecordStore, settings: &SyncSettings) -> Result<()> {
    let accounts = store.accounts().await?;
    if accounts.is_empty() {
        println!("No accounts in the store.");
        return Ok(());
    }

    let since = Utc::now() - settings.failure_window();

    let pb = ui::new_progress_bar(accounts.len() as u64, "Fetching attempts...");

    let attempt_futures = accounts.iter().map(|account| {
        let pb_clone = pb.clone();
        async move {
            let res = store.attempts_since(account.id, since).await;
            pb_clone.inc(1);
            res
        }
    });
    let attempt_results = join_all(attempt_futures).await;
    pb.finish_and_clear();

    let attempts_header = format!("Attempts ({}h)", settings.failure_window_hours);
    let mut table = ui::records_table(&[
        "ID",
        "Status",
        "Last synced",
        "Last login",
        "Feed credential",
        attempts_header.as_str(),
    ]);

    for (account, attempts) in accounts.iter().zip(attempt_results) {
        table.add_row(vec![
            Cell::new(account.id.to_string()).set_alignment(CellAlignment::Right),
            status_cell(account.sync_status),
            ui::optional_cell(account.last_synced_at, format_timestamp),
            Cell::new(format_timestamp(account.last_login_at)).set_alignment(CellAlignment::Right),
            Cell::new(if account.has_feed_credential() { "yes" } else { "no" }),
            attempts_cell(attempts.as_deref()),
        ]);
    }

    println!("{table}");
    Ok(())
}

fn status_cell(status: SyncStatus) -> Cell {
    let cell = Cell::new(status.to_string());
    match status {
        SyncStatus::Succeeded => cell.fg(Color::Green),
        SyncStatus::Failed => cell.fg(Color::Red),
        SyncStatus::InProgress => cell.fg(Color::Yellow),
        SyncStatus::Pending => cell.fg(Color::DarkGrey),
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// "N (M failed)" for a fetched window; "N/A" when the store lookup failed.
fn attempts_cell(attempts: Result<&[SyncAttempt], &anyhow::Error>) -> Cell {
    match attempts {
        Ok(attempts) => {
            let failed = attempts.iter().filter(|a| !a.succeeded).count();
            let text = format!("{} ({} failed)", attempts.len(), failed);
            let cell = Cell::new(text).set_alignment(CellAlignment::Right);
            if failed > 0 { cell.fg(Color::Red) } else { cell }
        }
        Err(_) => Cell::new("N/A")
            .fg(Color::DarkGrey)
            .set_alignment(CellAlignment::Right),
    }
}
