// Fleet Journal - command line
//
// `init` prepares the database, `ledger` prints, audits or rebuilds the
// cash-flow ledger, `report` renders one of the three reports.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use fleet_journal::entities::user::{seed_admin, DEFAULT_ADMIN_USERNAME};
use fleet_journal::report::cashflow_report;
use fleet_journal::{
    audit_ledger, build_report, init_tracing, ledger_totals, list_entries, rebuild_ledger,
    CsvRenderer, ReportKind, ReportRenderer, Settings, TextRenderer,
};

#[derive(Parser, Debug)]
#[command(name = "fleet-journal", version)]
#[command(about = "Vehicle fleet event journal with a daily cash-flow ledger")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the schema and the default admin account
    Init,

    /// Print the cash-flow ledger
    Ledger {
        /// Compare stored rows against the event journal
        #[arg(long, conflicts_with = "rebuild")]
        audit: bool,

        /// Recompute every ledger row from the event journal
        #[arg(long)]
        rebuild: bool,
    },

    /// Render a report (vehicles, events, cashflow)
    Report {
        kind: String,

        /// Write CSV to this file instead of printing a table
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli.settings.log_level);

    match &cli.command {
        Command::Init => run_init(&cli.settings),
        Command::Ledger { audit: true, .. } => run_audit(&cli.settings),
        Command::Ledger { rebuild: true, .. } => run_rebuild(&cli.settings),
        Command::Ledger { .. } => run_ledger(&cli.settings),
        Command::Report { kind, out } => run_report(&cli.settings, kind, out.as_ref()),
    }
}

fn open(settings: &Settings) -> Result<rusqlite::Connection> {
    let location = settings
        .database_location()
        .context("Invalid DATABASE_URL")?;
    location
        .open()
        .with_context(|| format!("Failed to open database {:?}", location))
}

fn run_init(settings: &Settings) -> Result<()> {
    println!("🗄️  Fleet Journal - database setup");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = open(settings)?;
    println!("✓ Schema ready ({})", settings.database_url);

    if seed_admin(&conn, &settings.admin_password).context("Failed to create admin user")? {
        println!("✓ Created user '{}'", DEFAULT_ADMIN_USERNAME);
    } else {
        println!("✓ User '{}' already exists", DEFAULT_ADMIN_USERNAME);
    }

    Ok(())
}

fn run_ledger(settings: &Settings) -> Result<()> {
    let conn = open(settings)?;
    let format = settings.report_format();

    let table = cashflow_report(&list_entries(&conn)?, &format);
    std::io::stdout().write_all(&TextRenderer.render(&table)?)?;

    let totals = ledger_totals(&conn)?;
    println!();
    println!("Income:      {}", format.currency(totals.income));
    println!("Expenses:    {}", format.currency(totals.expenses));
    println!("Credit load: {}", format.currency(totals.credit_load));
    println!("Balance:     {}", format.currency(totals.balance));

    Ok(())
}

fn run_audit(settings: &Settings) -> Result<()> {
    let conn = open(settings)?;
    let discrepancies = audit_ledger(&conn)?;

    if discrepancies.is_empty() {
        println!("✅ Ledger matches the event journal");
        return Ok(());
    }

    let format = settings.report_format();
    let show = |entry: Option<&fleet_journal::CashFlowEntry>| match entry {
        Some(e) => format!(
            "income {} / expenses {} / credit {}",
            format.currency(e.income),
            format.currency(e.expenses),
            format.currency(e.credit_load)
        ),
        None => "no row".to_string(),
    };

    println!("⚠️  {} ledger date(s) disagree with the journal", discrepancies.len());
    for d in &discrepancies {
        println!("  {}", d.date);
        println!("    stored:   {}", show(d.stored.as_ref()));
        println!("    expected: {}", show(d.expected.as_ref()));
    }
    println!("\nRun `fleet-journal ledger --rebuild` to recompute the ledger.");

    bail!("ledger audit found {} discrepancies", discrepancies.len())
}

fn run_rebuild(settings: &Settings) -> Result<()> {
    let mut conn = open(settings)?;
    let rows = rebuild_ledger(&mut conn).context("Ledger rebuild failed")?;
    println!("✅ Ledger rebuilt: {} row(s)", rows);
    Ok(())
}

fn run_report(settings: &Settings, kind: &str, out: Option<&PathBuf>) -> Result<()> {
    let Some(kind) = ReportKind::parse(kind) else {
        bail!("unknown report '{}' (expected vehicles, events or cashflow)", kind);
    };

    let conn = open(settings)?;
    let table = build_report(&conn, kind, &settings.report_format())?;

    match out {
        Some(path) => {
            let bytes = CsvRenderer.render(&table)?;
            std::fs::write(path, bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✓ {} rows written to {}", table.rows.len(), path.display());
        }
        None => {
            std::io::stdout().write_all(&TextRenderer.render(&table)?)?;
        }
    }

    Ok(())
}
