use super::ui;
use crate::core::config::SyncSettings;
use crate::core::model::ItemId;
use crate::core::reconcile::Reconciler;
use crate::store::RecordStore;
use anyhow::{Context, Result};
use chrono::Utc;
use comfy_table::{Cell, CellAlignment};
use rust_decimal::Decimal;

/// Applies one feed observation to a single item, exactly the way a sync
/// cycle would, and prints the before/after values.
pub async fn run(
    store: &dyn RecordStore,
    settings: &SyncSettings,
    item_id: ItemId,
    value: Decimal,
) -> Result<()> {
    let mut item = store
        .item(item_id)
        .await?
        .with_context(|| format!("No valuation item with id {item_id}"))?;

    let before_current = item.current_value;
    let before_feed = item.feed_observed_value;

    let outcome = Reconciler::from_settings(settings).apply(&mut item, value, Utc::now());
    store.upsert_items(std::slice::from_ref(&item)).await?;

    let mut table = ui::records_table(&[
        "Item",
        "Action",
        "Value before",
        "Value after",
        "Feed before",
        "Feed after",
    ]);
    table.add_row(vec![
        Cell::new(format!("{} ({})", item.name, item.id)),
        Cell::new(outcome.action.to_string()),
        money_cell(before_current),
        money_cell(item.current_value),
        ui::optional_cell(before_feed, |v| v.to_string()),
        money_cell(value),
    ]);

    println!("{table}");
    println!("{}", ui::style_text(&outcome.note, ui::StyleType::Note));
    Ok(())
}

fn money_cell(value: Decimal) -> Cell {
    Cell::new(value.to_string()).set_alignment(CellAlignment::Right)
}
