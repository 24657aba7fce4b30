// Fleet Journal - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod error;
pub mod money;
pub mod db;
pub mod auth;
pub mod entities;
pub mod journal;        // Event journal - append/delete with ledger posting
pub mod reconciliation; // Per-date ledger maintenance + audit/rebuild
pub mod cashflow;       // Ledger rows, totals, manual adjustments
pub mod dashboard;
pub mod report;
pub mod config;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types
pub use error::{FleetError, Result};
pub use money::Money;
pub use db::{open_database, setup_database, write_transaction, DatabaseLocation};
pub use auth::{hash_password, verify_password, SessionStore, SessionUser};
pub use entities::{
    Contractor, ContractorForm, NewContractor, CONTRACTOR_TYPES,
    NewVehicle, Vehicle, VehicleForm, VehicleStatus,
    User, UserRole,
};
pub use journal::{
    append_event, delete_event, get_event, list_events, recent_events,
    events_by_vehicle, events_by_contractor,
    parse_event_timestamp, Event, EventForm, EventType, NewEvent, TimestampPolicy,
};
pub use reconciliation::{
    audit_ledger, classify, expected_ledger, rebuild_ledger, reconcile,
    LedgerBucket, LedgerDiscrepancy, Operation, ReconcileOutcome,
};
pub use cashflow::{
    get_entry, ledger_totals, list_entries, record_manual_adjustment,
    AdjustmentForm, CashFlowEntry, LedgerTotals, ManualAdjustment,
};
pub use dashboard::{dashboard, DashboardSummary};
pub use report::{
    build_report, CsvRenderer, ReportFormat, ReportKind, ReportRenderer, ReportTable, TextRenderer,
};
pub use config::{init_tracing, ServerArgs, Settings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
