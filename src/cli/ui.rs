use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Text roles used by the command output.
pub enum StyleType {
    Heading,
    FooterLabel,
    Good,
    Bad,
    Note,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Heading => style(text).bold().underlined(),
        StyleType::FooterLabel => style(text).bold(),
        StyleType::Good => style(text).green().bold(),
        StyleType::Bad => style(text).red(),
        StyleType::Note => style(text).dim(),
    };
    styled.to_string()
}

/// Builds a table with the shared preset and a styled header row.
pub fn records_table(headers: &[&str]) -> Table {
    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|text| Cell::new(text).fg(Color::Cyan).add_attribute(Attribute::Bold))
        .collect();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header_cells);
    table
}

/// Right-aligned cell for an optional value. Missing values render as "N/A".
pub fn optional_cell<T>(value: Option<T>, render: impl Fn(T) -> String) -> Cell {
    let cell = match value {
        Some(v) => Cell::new(render(v)),
        None => Cell::new("N/A").fg(Color::DarkGrey),
    };
    cell.set_alignment(CellAlignment::Right)
}

/// Count cell that turns red once a nonzero count means trouble.
pub fn count_cell(count: usize, is_bad: bool) -> Cell {
    let cell = Cell::new(count.to_string()).set_alignment(CellAlignment::Right);
    if is_bad && count > 0 {
        cell.fg(Color::Red)
    } else {
        cell
    }
}

/// Progress bar for per-account work with a known length.
pub fn new_progress_bar(len: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}

/// Creates a ticking spinner for work with no known length, like a sync cycle.
pub fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
