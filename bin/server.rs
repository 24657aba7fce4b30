// Fleet Journal - Web Server
// REST API with Axum

use anyhow::Context;
use clap::Parser;
use tracing::info;

use fleet_journal::entities::user::{seed_admin, DEFAULT_ADMIN_USERNAME};
use fleet_journal::server::{build_router, AppState};
use fleet_journal::{init_tracing, ServerArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = ServerArgs::parse();
    init_tracing(&args.settings.log_level);

    info!("🌐 Fleet Journal - Web Server v{}", fleet_journal::VERSION);

    let location = args
        .settings
        .database_location()
        .context("Invalid DATABASE_URL")?;
    let conn = location
        .open()
        .with_context(|| format!("Failed to open database {:?}", location))?;
    info!(database = ?location, "Database opened");

    if seed_admin(&conn, &args.settings.admin_password).context("Failed to seed admin user")? {
        info!(username = DEFAULT_ADMIN_USERNAME, "Default admin user created");
    }

    let state = AppState::new(conn, args.settings.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", args.listen))?;

    info!("🚀 Server running on http://{}", args.listen);
    info!("   API: http://{}/api/health", args.listen);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
