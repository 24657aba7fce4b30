// 📈 Cash-Flow Ledger - one row of running totals per calendar date
//
// Rows are derived state. Outside this crate they are read-only; inside it
// only `reconciliation` calls the write helpers below. Manual corrections are
// recorded as synthetic journal events so they flow through the same path.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::{date_column, format_date, format_timestamp, now, timestamp_column, write_transaction, DATE_FORMAT};
use crate::error::{FleetError, Result};
use crate::journal::{append_event_in, get_event, Event, EventType, NewEvent};
use crate::money::Money;
use crate::reconciliation::{LedgerBucket, CREDIT_SUBTYPE};

/// Subtype used for synthetic income/expense events created by a manual adjustment
pub const ADJUSTMENT_SUBTYPE: &str = "ADJUSTMENT";

// ============================================================================
// LEDGER ROW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashFlowEntry {
    pub id: i64,
    pub date: NaiveDate,
    pub income: Money,
    pub expenses: Money,
    pub credit_load: Money,
    pub balance: Money,
    pub created_at: NaiveDateTime,
}

impl CashFlowEntry {
    /// A not-yet-stored row with all totals at zero
    pub fn empty(date: NaiveDate) -> Self {
        CashFlowEntry {
            id: 0,
            date,
            income: Money::ZERO,
            expenses: Money::ZERO,
            credit_load: Money::ZERO,
            balance: Money::ZERO,
            created_at: now(),
        }
    }

    /// Move one bucket by `delta` and recompute the balance. On overflow the
    /// row is left untouched.
    pub fn apply(&mut self, bucket: LedgerBucket, delta: Money) -> Result<()> {
        let mut next = self.clone();
        let field = match bucket {
            LedgerBucket::Income => &mut next.income,
            LedgerBucket::Expenses => &mut next.expenses,
            LedgerBucket::CreditLoad => &mut next.credit_load,
        };
        *field = field.checked_add(delta).ok_or_else(|| self.overflow(delta))?;
        next.balance = next.computed_balance().ok_or_else(|| self.overflow(delta))?;

        *self = next;
        Ok(())
    }

    /// `income - expenses - credit_load`, `None` when out of range
    pub fn computed_balance(&self) -> Option<Money> {
        self.income
            .checked_sub(self.expenses)?
            .checked_sub(self.credit_load)
    }

    fn overflow(&self, delta: Money) -> FleetError {
        FleetError::InvalidInput(format!(
            "amount {} would overflow the ledger totals for {}",
            delta, self.date
        ))
    }

    /// All three component totals are zero
    pub fn is_empty(&self) -> bool {
        self.income.is_zero() && self.expenses.is_zero() && self.credit_load.is_zero()
    }

    pub fn same_totals(&self, other: &CashFlowEntry) -> bool {
        self.date == other.date
            && self.income == other.income
            && self.expenses == other.expenses
            && self.credit_load == other.credit_load
            && self.balance == other.balance
    }

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(CashFlowEntry {
            id: row.get(0)?,
            date: date_column(row, 1)?,
            income: row.get(2)?,
            expenses: row.get(3)?,
            credit_load: row.get(4)?,
            balance: row.get(5)?,
            created_at: timestamp_column(row, 6)?,
        })
    }
}

const ENTRY_COLUMNS: &str = "id, date, income, expenses, credit_load, balance, created_at";

// ============================================================================
// READS
// ============================================================================

pub fn get_entry(conn: &Connection, date: NaiveDate) -> Result<Option<CashFlowEntry>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM cashflow WHERE date = ?1", ENTRY_COLUMNS),
            [format_date(&date)],
            CashFlowEntry::from_row,
        )
        .optional()?)
}

/// All ledger rows, newest date first
pub fn list_entries(conn: &Connection) -> Result<Vec<CashFlowEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM cashflow ORDER BY date DESC",
        ENTRY_COLUMNS
    ))?;

    let entries = stmt
        .query_map([], CashFlowEntry::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(entries)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LedgerTotals {
    pub days: usize,
    pub income: Money,
    pub expenses: Money,
    pub credit_load: Money,
    pub balance: Money,
}

pub fn ledger_totals(conn: &Connection) -> Result<LedgerTotals> {
    let overflow = || FleetError::InvalidInput("ledger totals exceed the storable range".to_string());

    let mut acc = LedgerTotals::default();
    for e in list_entries(conn)? {
        acc.days += 1;
        acc.income = acc.income.checked_add(e.income).ok_or_else(overflow)?;
        acc.expenses = acc.expenses.checked_add(e.expenses).ok_or_else(overflow)?;
        acc.credit_load = acc.credit_load.checked_add(e.credit_load).ok_or_else(overflow)?;
        acc.balance = acc.balance.checked_add(e.balance).ok_or_else(overflow)?;
    }
    Ok(acc)
}

// ============================================================================
// WRITES (reconciliation only)
// ============================================================================

pub(crate) fn insert_entry(conn: &Connection, entry: &CashFlowEntry) -> Result<CashFlowEntry> {
    conn.execute(
        "INSERT INTO cashflow (date, income, expenses, credit_load, balance, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            format_date(&entry.date),
            entry.income,
            entry.expenses,
            entry.credit_load,
            entry.balance,
            format_timestamp(&entry.created_at),
        ],
    )?;

    let mut stored = entry.clone();
    stored.id = conn.last_insert_rowid();
    Ok(stored)
}

pub(crate) fn update_entry(conn: &Connection, entry: &CashFlowEntry) -> Result<()> {
    conn.execute(
        "UPDATE cashflow SET income = ?1, expenses = ?2, credit_load = ?3, balance = ?4
         WHERE id = ?5",
        params![
            entry.income,
            entry.expenses,
            entry.credit_load,
            entry.balance,
            entry.id
        ],
    )?;
    Ok(())
}

pub(crate) fn delete_entry(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM cashflow WHERE id = ?1", [id])?;
    Ok(())
}

// ============================================================================
// MANUAL ADJUSTMENT
// ============================================================================

/// A hand-entered correction for one date. Each non-zero component becomes
/// its own journal event.
#[derive(Debug, Clone, PartialEq)]
pub struct ManualAdjustment {
    pub date: NaiveDate,
    pub income: Money,
    pub expenses: Money,
    pub credit_load: Money,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdjustmentForm {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub income: String,
    #[serde(default)]
    pub expenses: String,
    #[serde(default)]
    pub credit_load: String,
}

impl AdjustmentForm {
    pub fn into_adjustment(self) -> Result<ManualAdjustment> {
        let date = NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT).map_err(|_| {
            FleetError::InvalidInput(format!("adjustment date '{}' must be YYYY-MM-DD", self.date))
        })?;

        Ok(ManualAdjustment {
            date,
            income: Money::parse_lenient(&self.income),
            expenses: Money::parse_lenient(&self.expenses),
            credit_load: Money::parse_lenient(&self.credit_load),
        })
    }
}

impl ManualAdjustment {
    fn synthetic_events(&self) -> Vec<NewEvent> {
        let at = self.date.and_time(NaiveTime::default());
        let parts = [
            (EventType::Income, ADJUSTMENT_SUBTYPE, self.income),
            (EventType::Expense, ADJUSTMENT_SUBTYPE, self.expenses),
            (EventType::Investment, CREDIT_SUBTYPE, self.credit_load),
        ];

        parts
            .into_iter()
            .filter(|(_, _, amount)| !amount.is_zero())
            .map(|(event_type, subtype, amount)| NewEvent {
                date: at,
                event_type,
                subtype: subtype.to_string(),
                vehicle_id: None,
                contractor_id: None,
                amount,
                description: "Manual cash-flow adjustment".to_string(),
            })
            .collect()
    }
}

/// Record a manual adjustment as synthetic events, all in one transaction.
/// Deleting those events undoes the adjustment.
pub fn record_manual_adjustment(
    conn: &mut Connection,
    adjustment: &ManualAdjustment,
    created_by: Option<i64>,
) -> Result<Vec<Event>> {
    for (field, amount) in [
        ("income", adjustment.income),
        ("expenses", adjustment.expenses),
        ("credit_load", adjustment.credit_load),
    ] {
        if amount < Money::ZERO {
            return Err(FleetError::InvalidInput(format!(
                "{} must not be negative; delete the original event instead",
                field
            )));
        }
    }

    let events = adjustment.synthetic_events();
    if events.is_empty() {
        return Err(FleetError::InvalidInput("adjustment has no non-zero amounts".to_string()));
    }

    let tx = write_transaction(conn)?;
    let mut stored = Vec::with_capacity(events.len());
    for event in &events {
        let id = append_event_in(&tx, event, created_by)?;
        stored.push(get_event(&tx, id)?);
    }
    tx.commit()?;

    info!(date = %adjustment.date, events = stored.len(), "Manual cash-flow adjustment recorded");
    Ok(stored)
}
