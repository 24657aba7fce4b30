// 📊 Dashboard - fleet size and latest journal activity

use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;
use crate::journal::{recent_events, Event};

pub const RECENT_EVENT_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub total_vehicles: i64,
    pub active_vehicles: i64,
    pub recent_events: Vec<Event>,
}

pub fn dashboard(conn: &Connection) -> Result<DashboardSummary> {
    let (total_vehicles, active_vehicles): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0)
         FROM vehicles",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(DashboardSummary {
        total_vehicles,
        active_vehicles,
        recent_events: recent_events(conn, RECENT_EVENT_LIMIT)?,
    })
}
