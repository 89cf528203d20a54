use super::ui;
use crate::sync::{CycleReport, SyncOrchestrator};
use anyhow::Result;
use comfy_table::Cell;

/// Runs one sync cycle and prints the outcome as a table.
pub async fn run(orchestrator: &SyncOrchestrator) -> Result<()> {
    let pb = ui::new_spinner("Running sync cycle...");
    let report = orchestrator.run_cycle().await;
    pb.finish_and_clear();

    let report = report?;
    println!("{}", render_report(&report));
    Ok(())
}

fn render_report(report: &CycleReport) -> String {
    let mut table = ui::records_table(&["Step", "Result"]);

    table.add_row(vec![
        Cell::new("Accounts selected"),
        ui::count_cell(report.accounts_selected, false),
    ]);
    table.add_row(vec![
        Cell::new("Accounts succeeded"),
        ui::count_cell(report.accounts_succeeded, false),
    ]);
    table.add_row(vec![
        Cell::new("Accounts failed"),
        ui::count_cell(report.accounts_failed, true),
    ]);
    table.add_row(vec![
        Cell::new("Feed valuations updated"),
        ui::count_cell(report.items_updated, false),
    ]);
    table.add_row(vec![
        Cell::new("Property items checked"),
        Cell::new(format!(
            "{} items in {} batches",
            report.property_walk.items, report.property_walk.batches
        )),
    ]);
    table.add_row(vec![
        Cell::new("Vehicle items checked"),
        Cell::new(format!(
            "{} items in {} batches",
            report.vehicle_walk.items, report.vehicle_walk.batches
        )),
    ]);
    table.add_row(vec![
        Cell::new("Store errors skipped"),
        ui::count_cell(report.store_errors, true),
    ]);

    let elapsed = report.finished_at - report.started_at;
    let elapsed_secs = elapsed.num_milliseconds() as f64 / 1000.0;
    let outcome = format!(
        "{} of {} accounts refreshed in {elapsed_secs:.1}s",
        report.accounts_succeeded, report.accounts_selected
    );
    let outcome_style = if report.accounts_failed > 0 || report.store_errors > 0 {
        ui::StyleType::Bad
    } else {
        ui::StyleType::Good
    };

    let mut output = format!(
        "Sync cycle: {}\n\n",
        ui::style_text(
            &report.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            ui::StyleType::Heading
        )
    );
    output.push_str(&table.to_string());
    output.push_str(&format!(
        "\n\n{}: {}",
        ui::style_text("Cycle finished", ui::StyleType::FooterLabel),
        ui::style_text(&outcome, outcome_style)
    ));

    output
}
