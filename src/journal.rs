// 📒 Event Journal - dated financial/operational events
//
// Appending or deleting an event and the matching ledger adjustment happen in
// one SQLite transaction: both commit or neither does.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::db::{format_timestamp, now, timestamp_column, write_transaction};
use crate::entities::contractor::contractor_exists;
use crate::entities::vehicle::vehicle_exists;
use crate::error::{FleetError, Result};
use crate::money::Money;
use crate::reconciliation::{reconcile, Operation};

// ============================================================================
// EVENT TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Investment,
    Expense,
    Income,
    Government,
}

impl EventType {
    pub const ALL: [EventType; 4] = [
        EventType::Investment,
        EventType::Expense,
        EventType::Income,
        EventType::Government,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Investment => "investment",
            EventType::Expense => "expense",
            EventType::Income => "income",
            EventType::Government => "government",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "investment" => Some(EventType::Investment),
            "expense" => Some(EventType::Expense),
            "income" => Some(EventType::Income),
            "government" => Some(EventType::Government),
            _ => None,
        }
    }

    /// Conventional subtypes offered by the entry form. Free text is still accepted.
    pub fn suggested_subtypes(&self) -> &'static [&'static str] {
        match self {
            EventType::Investment => &["LEASING", "PURCHASE", "CASH", "EQUIPMENT", "CREDIT"],
            EventType::Expense => &[
                "INSPECTION",
                "BREAKDOWN",
                "SCHEDULED REPAIR",
                "UNSCHEDULED REPAIR",
                "SALARY",
                "LOGISTICS",
                "ACCIDENT",
            ],
            EventType::Income => &["RENT", "DEPOSIT", "COMPENSATION", "INSTALLMENT SALE", "SALE"],
            EventType::Government => &["DOCUMENTS", "FINE", "INSURANCE", "TAXES"],
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TIMESTAMP PARSING
// ============================================================================

/// What to do with an event date string that matches neither accepted format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampPolicy {
    /// Substitute the current local time (legacy behavior)
    #[default]
    FallbackToNow,
    /// Fail with `InvalidInput`
    Reject,
}

/// Parse `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM`
pub fn parse_event_timestamp(raw: &str, policy: TimestampPolicy) -> Result<NaiveDateTime> {
    let s = raw.trim();

    let parsed = if s.contains('T') {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").ok()
    } else {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    };

    match (parsed, policy) {
        (Some(ts), _) => Ok(ts),
        (None, TimestampPolicy::FallbackToNow) => {
            warn!(raw, "Unparsable event date, using current time");
            Ok(now())
        }
        (None, TimestampPolicy::Reject) => Err(FleetError::InvalidInput(format!(
            "event date '{}' must be YYYY-MM-DD or YYYY-MM-DDTHH:MM",
            raw
        ))),
    }
}

// ============================================================================
// EVENT RECORDS
// ============================================================================

/// A stored event with its vehicle call sign and contractor name resolved
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,
    pub date: NaiveDateTime,
    pub event_type: EventType,
    pub subtype: String,
    pub vehicle_id: Option<i64>,
    pub vehicle_call_sign: Option<String>,
    pub contractor_id: Option<i64>,
    pub contractor_name: Option<String>,
    pub amount: Money,
    pub description: String,
    pub created_by: Option<i64>,
    pub created_at: NaiveDateTime,
}

impl Event {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let raw_type: String = row.get(2)?;
        let event_type = EventType::parse(&raw_type).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown event type '{}'", raw_type).into(),
            )
        })?;

        Ok(Event {
            id: row.get(0)?,
            date: timestamp_column(row, 1)?,
            event_type,
            subtype: row.get(3)?,
            vehicle_id: row.get(4)?,
            vehicle_call_sign: row.get(5)?,
            contractor_id: row.get(6)?,
            contractor_name: row.get(7)?,
            amount: row.get(8)?,
            description: row.get(9)?,
            created_by: row.get(10)?,
            created_at: timestamp_column(row, 11)?,
        })
    }

    /// Calendar date the event is posted to in the cash-flow ledger
    pub fn ledger_date(&self) -> NaiveDate {
        self.date.date()
    }
}

const EVENT_SELECT: &str = "SELECT e.id, e.date, e.event_type, e.subtype,
                e.vehicle_id, v.call_sign, e.contractor_id, c.name,
                e.amount, e.description, e.created_by, e.created_at
         FROM events e
         LEFT JOIN vehicles v ON v.id = e.vehicle_id
         LEFT JOIN contractors c ON c.id = e.contractor_id";

/// Validated input for `append_event`
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub date: NaiveDateTime,
    pub event_type: EventType,
    pub subtype: String,
    pub vehicle_id: Option<i64>,
    pub contractor_id: Option<i64>,
    pub amount: Money,
    pub description: String,
}

/// Event as submitted by a form: every field is a string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventForm {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub subtype: String,
    #[serde(default)]
    pub vehicle_id: String,
    #[serde(default)]
    pub contractor_id: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub description: String,
}

fn optional_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

impl EventForm {
    /// Numeric fields are permissive: blank or garbage ids are "no reference",
    /// a blank or garbage amount is zero. The event type must be known.
    pub fn into_new_event(self, policy: TimestampPolicy) -> Result<NewEvent> {
        let event_type = EventType::parse(&self.event_type).ok_or_else(|| {
            FleetError::InvalidInput(format!("unknown event type '{}'", self.event_type))
        })?;

        let subtype = self.subtype.trim().to_string();
        if subtype.is_empty() {
            return Err(FleetError::InvalidInput("event subtype is required".to_string()));
        }

        Ok(NewEvent {
            date: parse_event_timestamp(&self.date, policy)?,
            event_type,
            subtype,
            vehicle_id: optional_id(&self.vehicle_id),
            contractor_id: optional_id(&self.contractor_id),
            amount: Money::parse_lenient(&self.amount),
            description: self.description,
        })
    }
}

// ============================================================================
// MUTATIONS
// ============================================================================

/// Append an event and post it to the ledger in one transaction
pub fn append_event(conn: &mut Connection, event: &NewEvent, created_by: Option<i64>) -> Result<Event> {
    let tx = write_transaction(conn)?;
    let id = append_event_in(&tx, event, created_by)?;
    let stored = get_event(&tx, id)?;
    tx.commit()?;

    info!(
        event_id = id,
        event_type = %event.event_type,
        amount = %event.amount,
        "Event appended"
    );
    Ok(stored)
}

/// Append inside a caller-owned transaction. Returns the new event id.
pub(crate) fn append_event_in(conn: &Connection, event: &NewEvent, created_by: Option<i64>) -> Result<i64> {
    if let Some(vehicle_id) = event.vehicle_id {
        if !vehicle_exists(conn, vehicle_id)? {
            return Err(FleetError::not_found("vehicle", vehicle_id));
        }
    }
    if let Some(contractor_id) = event.contractor_id {
        if !contractor_exists(conn, contractor_id)? {
            return Err(FleetError::not_found("contractor", contractor_id));
        }
    }

    conn.execute(
        "INSERT INTO events (
            date, event_type, subtype, vehicle_id, contractor_id,
            amount, description, created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            format_timestamp(&event.date),
            event.event_type.as_str(),
            event.subtype,
            event.vehicle_id,
            event.contractor_id,
            event.amount,
            event.description,
            created_by,
            format_timestamp(&now()),
        ],
    )?;
    let id = conn.last_insert_rowid();

    // Zero (and negative) amounts never touch the ledger
    if event.amount.is_positive() {
        reconcile(
            conn,
            event.date.date(),
            event.event_type,
            &event.subtype,
            event.amount,
            Operation::Add,
        )?;
    }

    Ok(id)
}

/// Reverse the event's ledger contribution and remove it, atomically
pub fn delete_event(conn: &mut Connection, id: i64) -> Result<Event> {
    let tx = write_transaction(conn)?;
    let event = get_event(&tx, id)?;

    if event.amount.is_positive() {
        reconcile(
            &tx,
            event.ledger_date(),
            event.event_type,
            &event.subtype,
            event.amount,
            Operation::Remove,
        )?;
    }

    tx.execute("DELETE FROM events WHERE id = ?1", [id])?;
    tx.commit()?;

    info!(event_id = id, amount = %event.amount, "Event deleted");
    Ok(event)
}

// ============================================================================
// QUERIES
// ============================================================================

pub fn get_event(conn: &Connection, id: i64) -> Result<Event> {
    conn.query_row(&format!("{} WHERE e.id = ?1", EVENT_SELECT), [id], Event::from_row)
        .optional()?
        .ok_or_else(|| FleetError::not_found("event", id))
}

fn query_events(conn: &Connection, clause: &str, param: Option<i64>) -> Result<Vec<Event>> {
    let sql = format!("{} {} ORDER BY e.date DESC, e.id DESC", EVENT_SELECT, clause);
    let mut stmt = conn.prepare(&sql)?;

    let rows = match param {
        Some(p) => stmt.query_map([p], Event::from_row)?,
        None => stmt.query_map([], Event::from_row)?,
    };

    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// All events, newest first
pub fn list_events(conn: &Connection) -> Result<Vec<Event>> {
    query_events(conn, "", None)
}

/// The `limit` newest events
pub fn recent_events(conn: &Connection, limit: usize) -> Result<Vec<Event>> {
    let sql = format!("{} ORDER BY e.date DESC, e.id DESC LIMIT ?1", EVENT_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let events = stmt
        .query_map([limit], Event::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(events)
}

pub fn events_by_vehicle(conn: &Connection, vehicle_id: i64) -> Result<Vec<Event>> {
    if !vehicle_exists(conn, vehicle_id)? {
        return Err(FleetError::not_found("vehicle", vehicle_id));
    }
    query_events(conn, "WHERE e.vehicle_id = ?1", Some(vehicle_id))
}

pub fn events_by_contractor(conn: &Connection, contractor_id: i64) -> Result<Vec<Event>> {
    if !contractor_exists(conn, contractor_id)? {
        return Err(FleetError::not_found("contractor", contractor_id));
    }
    query_events(conn, "WHERE e.contractor_id = ?1", Some(contractor_id))
}
