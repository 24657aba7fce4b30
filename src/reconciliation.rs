// ⚖️ Cash-Flow Reconciliation - keep each ledger row equal to its date's events
//
// Every posted event contributes its amount to exactly one ledger bucket:
//
//   income                         → income
//   expense, government            → expenses
//   investment with subtype CREDIT → credit_load
//   any other investment           → expenses
//
// and balance = income - expenses - credit_load.
//
// This is the only code path that writes the `cashflow` table.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cashflow::{self, CashFlowEntry};
use crate::error::Result;
use crate::journal::EventType;
use crate::money::Money;

/// Investment subtype that counts as financed debt instead of an expense
pub const CREDIT_SUBTYPE: &str = "CREDIT";

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerBucket {
    Income,
    Expenses,
    CreditLoad,
}

/// Map an event to the ledger field it moves. Total over all inputs.
pub fn classify(event_type: EventType, subtype: &str) -> LedgerBucket {
    match event_type {
        EventType::Income => LedgerBucket::Income,
        EventType::Expense | EventType::Government => LedgerBucket::Expenses,
        EventType::Investment if subtype == CREDIT_SUBTYPE => LedgerBucket::CreditLoad,
        EventType::Investment => LedgerBucket::Expenses,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Remove,
}

impl Operation {
    /// The signed change `amount` makes to its bucket
    pub fn delta(&self, amount: Money) -> Money {
        match self {
            Operation::Add => amount,
            Operation::Remove => -amount,
        }
    }
}

/// What `reconcile` did to the ledger
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Created(CashFlowEntry),
    Updated(CashFlowEntry),
    /// All three totals reached zero and the row was removed
    Deleted(NaiveDate),
    /// Nothing to change (removal against a date with no row, or a zero delta on an empty date)
    Unchanged(NaiveDate),
}

// ============================================================================
// RECONCILE
// ============================================================================

/// Apply one event's contribution to the ledger row for `date`.
///
/// Runs on whatever connection or transaction the caller hands in, so the
/// adjustment commits together with the event insert/delete that caused it.
pub fn reconcile(
    conn: &Connection,
    date: NaiveDate,
    event_type: EventType,
    subtype: &str,
    amount: Money,
    operation: Operation,
) -> Result<ReconcileOutcome> {
    let bucket = classify(event_type, subtype);
    let delta = operation.delta(amount);

    debug!(%date, ?bucket, delta = %delta, "Reconciling ledger");

    match cashflow::get_entry(conn, date)? {
        Some(mut entry) => {
            entry.apply(bucket, delta)?;

            if entry.is_empty() {
                cashflow::delete_entry(conn, entry.id)?;
                debug!(%date, "Ledger row fully reversed and removed");
                Ok(ReconcileOutcome::Deleted(date))
            } else {
                cashflow::update_entry(conn, &entry)?;
                Ok(ReconcileOutcome::Updated(entry))
            }
        }
        None if operation == Operation::Add => {
            let mut entry = CashFlowEntry::empty(date);
            entry.apply(bucket, delta)?;

            if entry.is_empty() {
                return Ok(ReconcileOutcome::Unchanged(date));
            }

            let entry = cashflow::insert_entry(conn, &entry)?;
            Ok(ReconcileOutcome::Created(entry))
        }
        None => {
            warn!(%date, %amount, "No ledger row to reverse; ignoring");
            Ok(ReconcileOutcome::Unchanged(date))
        }
    }
}

// ============================================================================
// AUDIT / REBUILD
// ============================================================================

/// A date where the stored ledger row disagrees with its events
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerDiscrepancy {
    pub date: NaiveDate,
    pub stored: Option<CashFlowEntry>,
    pub expected: Option<CashFlowEntry>,
}

/// Recompute what the ledger should hold from the events table
pub fn expected_ledger(conn: &Connection) -> Result<Vec<CashFlowEntry>> {
    let mut stmt = conn.prepare(
        "SELECT date, event_type, subtype, amount FROM events WHERE amount > 0 ORDER BY date",
    )?;

    let postings = stmt
        .query_map([], |row| {
            let ts = crate::db::timestamp_column(row, 0)?;
            let raw_type: String = row.get(1)?;
            let subtype: String = row.get(2)?;
            let amount: Money = row.get(3)?;
            Ok((ts.date(), raw_type, subtype, amount))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut ledger: std::collections::BTreeMap<NaiveDate, CashFlowEntry> = Default::default();
    for (date, raw_type, subtype, amount) in postings {
        let Some(event_type) = EventType::parse(&raw_type) else {
            warn!(%date, raw_type = %raw_type, "Skipping event with unknown type");
            continue;
        };
        let entry = ledger
            .entry(date)
            .or_insert_with(|| CashFlowEntry::empty(date));
        entry.apply(classify(event_type, &subtype), amount)?;
    }

    Ok(ledger.into_values().filter(|e| !e.is_empty()).collect())
}

/// Compare stored ledger rows against the events they should summarize
pub fn audit_ledger(conn: &Connection) -> Result<Vec<LedgerDiscrepancy>> {
    let mut expected: std::collections::BTreeMap<NaiveDate, CashFlowEntry> = expected_ledger(conn)?
        .into_iter()
        .map(|e| (e.date, e))
        .collect();

    let mut discrepancies = Vec::new();

    for stored in cashflow::list_entries(conn)? {
        match expected.remove(&stored.date) {
            Some(exp) if exp.same_totals(&stored) => {}
            exp => discrepancies.push(LedgerDiscrepancy {
                date: stored.date,
                stored: Some(stored),
                expected: exp,
            }),
        }
    }

    for (date, exp) in expected {
        discrepancies.push(LedgerDiscrepancy {
            date,
            stored: None,
            expected: Some(exp),
        });
    }

    discrepancies.sort_by_key(|d| d.date);
    Ok(discrepancies)
}

/// Drop every ledger row and replay all events through `reconcile`.
/// Returns the number of rows in the rebuilt ledger.
pub fn rebuild_ledger(conn: &mut Connection) -> Result<usize> {
    let tx = crate::db::write_transaction(conn)?;
    tx.execute("DELETE FROM cashflow", [])?;

    let postings = {
        let mut stmt = tx.prepare(
            "SELECT date, event_type, subtype, amount FROM events WHERE amount > 0 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let ts = crate::db::timestamp_column(row, 0)?;
                let raw_type: String = row.get(1)?;
                let subtype: String = row.get(2)?;
                let amount: Money = row.get(3)?;
                Ok((ts.date(), raw_type, subtype, amount))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };

    for (date, raw_type, subtype, amount) in postings {
        if let Some(event_type) = EventType::parse(&raw_type) {
            reconcile(&tx, date, event_type, &subtype, amount, Operation::Add)?;
        }
    }

    let rows = crate::db::count_rows(&tx, "cashflow")? as usize;
    tx.commit()?;

    tracing::info!(rows, "Ledger rebuilt from events");
    Ok(rows)
}
