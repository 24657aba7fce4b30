// 🤝 Contractor Entity - counterparties named on journal events

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::{format_timestamp, now, timestamp_column};
use crate::error::{FleetError, Result};

/// Suggested contractor types offered by the entry form. Free text is allowed.
pub const CONTRACTOR_TYPES: [&str; 9] = [
    "Supplier",
    "Service station",
    "Tenant",
    "Seller",
    "Lessor",
    "Bank",
    "Buyer",
    "Services",
    "Government agency",
];

#[derive(Debug, Clone, Serialize)]
pub struct Contractor {
    pub id: i64,
    pub contractor_type: String,
    pub subtype: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Contractor {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Contractor {
            id: row.get(0)?,
            contractor_type: row.get(1)?,
            subtype: row.get(2)?,
            name: row.get(3)?,
            phone: row.get(4)?,
            location: row.get(5)?,
            notes: row.get(6)?,
            created_at: timestamp_column(row, 7)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewContractor {
    pub contractor_type: String,
    pub subtype: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

/// Contractor as submitted by a form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContractorForm {
    pub contractor_type: String,
    pub subtype: Option<String>,
    pub name: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

impl From<ContractorForm> for NewContractor {
    fn from(form: ContractorForm) -> Self {
        NewContractor {
            contractor_type: form.contractor_type,
            subtype: form.subtype,
            name: form.name,
            phone: form.phone,
            location: form.location,
            notes: form.notes,
        }
    }
}

const CONTRACTOR_COLUMNS: &str =
    "id, contractor_type, subtype, name, phone, location, notes, created_at";

// Blank optional form fields are stored as NULL
fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub fn create_contractor(conn: &Connection, contractor: &NewContractor) -> Result<Contractor> {
    if contractor.name.trim().is_empty() {
        return Err(FleetError::InvalidInput("contractor name is required".to_string()));
    }
    if contractor.contractor_type.trim().is_empty() {
        return Err(FleetError::InvalidInput("contractor type is required".to_string()));
    }

    conn.execute(
        "INSERT INTO contractors (contractor_type, subtype, name, phone, location, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            contractor.contractor_type.trim(),
            non_blank(&contractor.subtype),
            contractor.name.trim(),
            non_blank(&contractor.phone),
            non_blank(&contractor.location),
            non_blank(&contractor.notes),
            format_timestamp(&now()),
        ],
    )?;

    let id = conn.last_insert_rowid();
    info!(contractor_id = id, name = %contractor.name, "Contractor created");
    get_contractor(conn, id)
}

pub fn get_contractor(conn: &Connection, id: i64) -> Result<Contractor> {
    conn.query_row(
        &format!("SELECT {} FROM contractors WHERE id = ?1", CONTRACTOR_COLUMNS),
        [id],
        Contractor::from_row,
    )
    .optional()?
    .ok_or_else(|| FleetError::not_found("contractor", id))
}

pub fn list_contractors(conn: &Connection) -> Result<Vec<Contractor>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM contractors ORDER BY name",
        CONTRACTOR_COLUMNS
    ))?;

    let contractors = stmt
        .query_map([], Contractor::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(contractors)
}

pub fn contractor_exists(conn: &Connection, id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM contractors WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::setup_database;

    pub(crate) fn sample_contractor(name: &str) -> NewContractor {
        NewContractor {
            contractor_type: "Service station".to_string(),
            subtype: Some("Body repair".to_string()),
            name: name.to_string(),
            phone: Some("+380441234567".to_string()),
            location: Some(" ".to_string()),
            notes: None,
        }
    }

    #[test]
    fn test_create_and_list_contractors() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let sto = create_contractor(&conn, &sample_contractor("Zeta Motors")).unwrap();
        create_contractor(&conn, &sample_contractor("Alpha Parts")).unwrap();

        assert_eq!(sto.contractor_type, "Service station");
        assert_eq!(sto.location, None, "blank location should be stored as NULL");
        assert_eq!(sto.phone.as_deref(), Some("+380441234567"));

        let all = list_contractors(&conn).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Alpha Parts");
    }

    #[test]
    fn test_contractor_requires_name() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let mut c = sample_contractor("");
        assert!(matches!(
            create_contractor(&conn, &c),
            Err(FleetError::InvalidInput(_))
        ));

        c.name = "Named".to_string();
        c.contractor_type = String::new();
        assert!(create_contractor(&conn, &c).is_err());
    }

    #[test]
    fn test_get_missing_contractor() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        assert!(get_contractor(&conn, 3).unwrap_err().is_not_found());
        assert!(!contractor_exists(&conn, 3).unwrap());
    }
}
