/*!
 * Terminal rendering for ledger data
 *
 * Tables for people, JSON for scripts.
 */

use blocktrace_connect::{AggregateSummary, ConnectionStatus, EndpointIdentity, Step};
use chrono::{DateTime, Utc};
use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::{style, StyledObject};
use serde::Serialize;

use crate::error::Result;

/// Brand colors for consistent styling
pub struct Theme;

impl Theme {
    pub fn success<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).green()
    }

    pub fn warning<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).yellow()
    }

    pub fn error<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).red()
    }

    pub fn muted<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).dim()
    }
}

/// Unicode icons for visual feedback
pub struct Icons;

impl Icons {
    pub const SUCCESS: &'static str = "✓";
    pub const ERROR: &'static str = "✗";
    pub const WARNING: &'static str = "⚠";
}

/// Shown in place of an absent or blank note
pub const NO_NOTE: &str = "no note provided";

/// Render a ledger timestamp (nanoseconds since epoch) as RFC 3339
pub fn format_timestamp(nanos: u64) -> String {
    let secs = (nanos / 1_000_000_000) as i64;
    let subsec = (nanos % 1_000_000_000) as u32;
    DateTime::<Utc>::from_timestamp(secs, subsec)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| nanos.to_string())
}

/// Note text for display; absent and blank both read as [`NO_NOTE`]
pub fn display_note(notes: Option<&str>) -> &str {
    match notes.map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => NO_NOTE,
    }
}

fn header(cells: &[&str]) -> Vec<Cell> {
    cells
        .iter()
        .map(|text| Cell::new(text).fg(Color::Cyan).add_attribute(Attribute::Bold))
        .collect()
}

/// Create a styled data table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Create a key-value table for stats
pub fn stats_table(items: &[(&str, String)]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_NO_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    for (key, value) in items {
        table.add_row(vec![
            Cell::new(key).fg(Color::Cyan),
            Cell::new(value).add_attribute(Attribute::Bold),
        ]);
    }

    table
}

pub fn history_table(steps: &[Step]) -> Table {
    let mut table = create_table();
    table.set_header(header(&[
        "#", "Time", "Actor", "Role", "Action", "Location", "Notes",
    ]));

    for (index, step) in steps.iter().enumerate() {
        let note = display_note(step.notes.as_deref());
        let note_cell = if step.is_verified() {
            Cell::new(note)
        } else {
            Cell::new(note).fg(Color::DarkGrey)
        };

        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(format_timestamp(step.timestamp)),
            Cell::new(&step.actor_name),
            Cell::new(&step.role),
            Cell::new(&step.action),
            Cell::new(&step.location),
            note_cell,
        ]);
    }

    table
}

pub fn summary_table(summary: &AggregateSummary) -> Table {
    let mut items = vec![
        ("Products", summary.entity_count.to_string()),
        ("Total steps", summary.event_count.to_string()),
        ("Verified steps", summary.verified_event_count.to_string()),
    ];
    if summary.is_partial() {
        items.push(("Unreadable products", summary.failed_entities.join(", ")));
    }
    stats_table(&items)
}

pub fn status_table(status: &ConnectionStatus, target: &EndpointIdentity) -> Table {
    let state = if status.connected {
        format!("{} connected", Icons::SUCCESS)
    } else {
        format!("{} disconnected", Icons::ERROR)
    };

    stats_table(&[
        ("State", state),
        ("Host", target.host.clone()),
        ("Service", target.service_id.clone()),
    ])
}

/// Print any serializable value as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    println!("{}", text);
    Ok(())
}
