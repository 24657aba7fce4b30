// 🧾 Reports - fixed-column tables for vehicles, events and cash flow
//
// Building a report only formats stored rows; rendering to bytes is behind
// `ReportRenderer` so a paginated document backend can be plugged in next to
// the CSV and plain-text renderers shipped here.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use std::fmt::Write as _;

use crate::cashflow::{list_entries, CashFlowEntry};
use crate::entities::vehicle::{list_vehicles, Vehicle};
use crate::error::{FleetError, Result};
use crate::journal::{list_events, Event};
use crate::money::{group_thousands, Money};

/// Longest description shown in the events report before it is cut
pub const DESCRIPTION_MAX_CHARS: usize = 50;

pub const DEFAULT_CURRENCY_SYMBOL: &str = "₴";

// ============================================================================
// REPORT KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Vehicles,
    Events,
    CashFlow,
}

impl ReportKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "vehicles" => Some(ReportKind::Vehicles),
            "events" => Some(ReportKind::Events),
            "cashflow" | "cash-flow" => Some(ReportKind::CashFlow),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Vehicles => "vehicles",
            ReportKind::Events => "events",
            ReportKind::CashFlow => "cashflow",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::Vehicles => "Vehicle report",
            ReportKind::Events => "Event report",
            ReportKind::CashFlow => "Cash-flow report",
        }
    }

    /// e.g. `vehicles_report.csv`
    pub fn file_name(&self, renderer: &dyn ReportRenderer) -> String {
        format!("{}_report.{}", self.as_str(), renderer.extension())
    }
}

// ============================================================================
// TABLE MODEL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    fn new(title: &str, headers: &[&str]) -> Self {
        ReportTable {
            title: title.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

/// Presentation settings shared by all reports
#[derive(Debug, Clone)]
pub struct ReportFormat {
    pub currency_symbol: String,
}

impl Default for ReportFormat {
    fn default() -> Self {
        ReportFormat {
            currency_symbol: DEFAULT_CURRENCY_SYMBOL.to_string(),
        }
    }
}

impl ReportFormat {
    /// `1234.5` → `"1,234.50 ₴"`
    pub fn currency(&self, amount: Money) -> String {
        format!("{} {}", amount.format_grouped(), self.currency_symbol)
    }
}

pub fn format_report_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Cut to `DESCRIPTION_MAX_CHARS` characters plus `...`; `-` when empty
pub fn truncate_description(description: &str) -> String {
    if description.trim().is_empty() {
        return "-".to_string();
    }

    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        let cut: String = description.chars().take(DESCRIPTION_MAX_CHARS).collect();
        format!("{}...", cut)
    } else {
        description.to_string()
    }
}

fn or_dash(value: Option<&str>) -> String {
    value.filter(|s| !s.is_empty()).unwrap_or("-").to_string()
}

// ============================================================================
// BUILDERS
// ============================================================================

pub fn vehicles_report(vehicles: &[Vehicle], format: &ReportFormat) -> ReportTable {
    let mut table = ReportTable::new(
        ReportKind::Vehicles.title(),
        &["Call sign", "Brand", "Model", "Year", "License plate", "Mileage", "Cost", "Status"],
    );

    for v in vehicles {
        table.rows.push(vec![
            v.call_sign.clone(),
            v.brand.clone(),
            v.model.clone(),
            v.year.to_string(),
            v.license_plate.clone(),
            format!("{} km", group_thousands(v.mileage.max(0) as u64)),
            format.currency(v.cost),
            v.status.as_str().to_string(),
        ]);
    }

    table
}

pub fn events_report(events: &[Event], format: &ReportFormat) -> ReportTable {
    let mut table = ReportTable::new(
        ReportKind::Events.title(),
        &["Date", "Type", "Subtype", "Vehicle", "Contractor", "Amount", "Description"],
    );

    for e in events {
        table.rows.push(vec![
            format_report_date(e.ledger_date()),
            e.event_type.as_str().to_string(),
            e.subtype.clone(),
            or_dash(e.vehicle_call_sign.as_deref()),
            or_dash(e.contractor_name.as_deref()),
            format.currency(e.amount),
            truncate_description(&e.description),
        ]);
    }

    table
}

pub fn cashflow_report(entries: &[CashFlowEntry], format: &ReportFormat) -> ReportTable {
    let mut table = ReportTable::new(
        ReportKind::CashFlow.title(),
        &["Date", "Income", "Expenses", "Credit load", "Balance"],
    );

    for entry in entries {
        table.rows.push(vec![
            format_report_date(entry.date),
            format.currency(entry.income),
            format.currency(entry.expenses),
            format.currency(entry.credit_load),
            format.currency(entry.balance),
        ]);
    }

    table
}

/// Snapshot the current rows of one entity and lay them out
pub fn build_report(conn: &Connection, kind: ReportKind, format: &ReportFormat) -> Result<ReportTable> {
    let table = match kind {
        ReportKind::Vehicles => vehicles_report(&list_vehicles(conn)?, format),
        ReportKind::Events => events_report(&list_events(conn)?, format),
        ReportKind::CashFlow => cashflow_report(&list_entries(conn)?, format),
    };
    Ok(table)
}

// ============================================================================
// RENDERERS
// ============================================================================

pub trait ReportRenderer {
    fn content_type(&self) -> &'static str;
    fn extension(&self) -> &'static str;
    fn render(&self, table: &ReportTable) -> Result<Vec<u8>>;
}

/// Header row followed by one record per data row
pub struct CsvRenderer;

impl ReportRenderer for CsvRenderer {
    fn content_type(&self) -> &'static str {
        "text/csv; charset=utf-8"
    }

    fn extension(&self) -> &'static str {
        "csv"
    }

    fn render(&self, table: &ReportTable) -> Result<Vec<u8>> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(&table.headers)?;
        for row in &table.rows {
            wtr.write_record(row)?;
        }
        wtr.into_inner()
            .map_err(|e| FleetError::Report(e.to_string()))
    }
}

/// Column-aligned text for terminals
pub struct TextRenderer;

impl ReportRenderer for TextRenderer {
    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn extension(&self) -> &'static str {
        "txt"
    }

    fn render(&self, table: &ReportTable) -> Result<Vec<u8>> {
        let mut widths: Vec<usize> = table.headers.iter().map(|h| h.chars().count()).collect();
        for row in &table.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }

        let line = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };

        let mut out = String::new();
        let header = line(&table.headers);
        let _ = writeln!(out, "{}", table.title);
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", header);
        let _ = writeln!(out, "{}", "-".repeat(header.chars().count()));
        for row in &table.rows {
            let _ = writeln!(out, "{}", line(row));
        }
        if table.rows.is_empty() {
            let _ = writeln!(out, "(no rows)");
        }

        Ok(out.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::vehicle::{create_vehicle, tests::sample_vehicle};
    use crate::journal::tests::{date, new_event, test_conn};
    use crate::journal::{append_event, EventType};

    #[test]
    fn test_currency_format() {
        let fmt = ReportFormat::default();
        assert_eq!(fmt.currency(Money::from_cents(123450)), "1,234.50 ₴");
        assert_eq!(fmt.currency(Money::from_units(-5000)), "-5,000.00 ₴");

        let rub = ReportFormat {
            currency_symbol: "₽".to_string(),
        };
        assert_eq!(rub.currency(Money::ZERO), "0.00 ₽");
    }

    #[test]
    fn test_truncate_description() {
        assert_eq!(truncate_description(""), "-");
        assert_eq!(truncate_description("short"), "short");

        let exact = "x".repeat(DESCRIPTION_MAX_CHARS);
        assert_eq!(truncate_description(&exact), exact);

        // Multi-byte characters are counted as characters, not bytes
        let long = "ж".repeat(DESCRIPTION_MAX_CHARS + 5);
        let cut = truncate_description(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), DESCRIPTION_MAX_CHARS + 3);
    }

    #[test]
    fn test_report_kind_parse() {
        assert_eq!(ReportKind::parse("Vehicles"), Some(ReportKind::Vehicles));
        assert_eq!(ReportKind::parse("cashflow"), Some(ReportKind::CashFlow));
        assert_eq!(ReportKind::parse("payroll"), None);
        assert_eq!(ReportKind::Events.file_name(&CsvRenderer), "events_report.csv");
    }

    #[test]
    fn test_events_report_rows() {
        let mut conn = test_conn();
        let vehicle = create_vehicle(&conn, &sample_vehicle("T-01", "AA1", "V1")).unwrap();

        let mut ev = new_event(EventType::Expense, "BREAKDOWN", 1250, date(2024, 3, 9));
        ev.vehicle_id = Some(vehicle.id);
        ev.description = "a".repeat(60);
        append_event(&mut conn, &ev, None).unwrap();
        append_event(&mut conn, &new_event(EventType::Income, "RENT", 10, date(2024, 3, 1)), None).unwrap();

        let table = build_report(&conn, ReportKind::Events, &ReportFormat::default()).unwrap();
        assert_eq!(table.headers.len(), 7);
        assert_eq!(table.rows.len(), 2);

        let first = &table.rows[0];
        assert_eq!(first[0], "09.03.2024");
        assert_eq!(first[3], "T-01");
        assert_eq!(first[4], "-");
        assert_eq!(first[5], "1,250.00 ₴");
        assert_eq!(first[6], format!("{}...", "a".repeat(50)));

        let second = &table.rows[1];
        assert_eq!(second[3], "-");
        assert_eq!(second[6], "-");
    }

    #[test]
    fn test_vehicle_and_cashflow_reports() {
        let mut conn = test_conn();
        create_vehicle(&conn, &sample_vehicle("T-01", "AA1", "V1")).unwrap();
        append_event(&mut conn, &new_event(EventType::Investment, "CREDIT", 5000, date(2024, 2, 1)), None).unwrap();

        let fmt = ReportFormat::default();
        let vehicles = build_report(&conn, ReportKind::Vehicles, &fmt).unwrap();
        assert_eq!(vehicles.rows[0][5], "45,000 km");
        assert_eq!(vehicles.rows[0][6], "18,500.00 ₴");
        assert_eq!(vehicles.rows[0][7], "active");

        let cashflow = build_report(&conn, ReportKind::CashFlow, &fmt).unwrap();
        assert_eq!(
            cashflow.rows[0],
            vec!["01.02.2024", "0.00 ₴", "0.00 ₴", "5,000.00 ₴", "-5,000.00 ₴"]
        );
    }

    #[test]
    fn test_csv_renderer_quotes_commas() {
        let table = ReportTable {
            title: "t".to_string(),
            headers: vec!["Date".to_string(), "Amount".to_string()],
            rows: vec![vec!["01.01.2024".to_string(), "1,000.00 ₴".to_string()]],
        };

        let bytes = CsvRenderer.render(&table).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "Date,Amount\n01.01.2024,\"1,000.00 ₴\"\n");
    }

    #[test]
    fn test_text_renderer_aligns_columns() {
        let table = ReportTable {
            title: "Cash-flow report".to_string(),
            headers: vec!["Date".to_string(), "Balance".to_string()],
            rows: vec![vec!["01.01.2024".to_string(), "5.00".to_string()]],
        };

        let text = String::from_utf8(TextRenderer.render(&table).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Cash-flow report");
        assert_eq!(lines[2], "Date       | Balance");
        assert_eq!(lines[4], "01.01.2024 | 5.00");

        let empty = ReportTable {
            rows: vec![],
            ..table
        };
        let text = String::from_utf8(TextRenderer.render(&empty).unwrap()).unwrap();
        assert!(text.contains("(no rows)"));
    }
}
