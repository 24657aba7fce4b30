// ⚙️ Configuration - CLI flags with environment fallbacks (.env via dotenvy)

use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::db::DatabaseLocation;
use crate::error::Result;
use crate::journal::TimestampPolicy;
use crate::report::{ReportFormat, DEFAULT_CURRENCY_SYMBOL};

/// Settings shared by the CLI and the API server
#[derive(clap::Args, Debug, Clone)]
pub struct Settings {
    /// SQLite database (`sqlite:///path/to/fleet.db`, a bare path, or `:memory:`)
    #[arg(long, env = "DATABASE_URL", default_value = "fleet.db")]
    pub database_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Password given to the `admin` account when it is first created
    #[arg(long, env = "ADMIN_PASSWORD", default_value = "admin123", hide_env_values = true)]
    pub admin_password: String,

    /// Currency symbol appended to amounts in reports
    #[arg(long, env = "CURRENCY_SYMBOL", default_value = DEFAULT_CURRENCY_SYMBOL)]
    pub currency_symbol: String,

    /// Reject unparsable event dates instead of recording them at the current time
    #[arg(long, env = "FLEET_STRICT_TIMESTAMPS", default_value = "false")]
    pub strict_timestamps: bool,
}

impl Settings {
    pub fn database_location(&self) -> Result<DatabaseLocation> {
        DatabaseLocation::from_url(&self.database_url)
    }

    pub fn timestamp_policy(&self) -> TimestampPolicy {
        if self.strict_timestamps {
            TimestampPolicy::Reject
        } else {
            TimestampPolicy::FallbackToNow
        }
    }

    pub fn report_format(&self) -> ReportFormat {
        ReportFormat {
            currency_symbol: self.currency_symbol.clone(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: "fleet.db".to_string(),
            log_level: "info".to_string(),
            admin_password: "admin123".to_string(),
            currency_symbol: DEFAULT_CURRENCY_SYMBOL.to_string(),
            strict_timestamps: false,
        }
    }
}

/// Fleet journal API server
#[derive(Parser, Debug, Clone)]
#[command(name = "fleet-server")]
#[command(about = "HTTP API for the fleet event journal and cash-flow ledger")]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:5000")]
    pub listen: SocketAddr,

    #[command(flatten)]
    pub settings: Settings,
}

/// Install the fmt subscriber. `RUST_LOG` wins over `log_level` when set.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fleet_journal={},info", log_level)));

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_args_defaults() {
        let args = ServerArgs::try_parse_from(["fleet-server"]).unwrap();

        assert_eq!(args.listen.port(), 5000);
        assert_eq!(args.settings.currency_symbol, "₴");
        assert_eq!(args.settings.timestamp_policy(), TimestampPolicy::FallbackToNow);
    }

    #[test]
    fn test_server_args_flags() {
        let args = ServerArgs::try_parse_from([
            "fleet-server",
            "--listen",
            "127.0.0.1:8088",
            "--database-url",
            ":memory:",
            "--strict-timestamps",
            "--currency-symbol",
            "₽",
        ])
        .unwrap();

        assert_eq!(args.listen.port(), 8088);
        assert_eq!(args.settings.database_location().unwrap(), DatabaseLocation::InMemory);
        assert_eq!(args.settings.timestamp_policy(), TimestampPolicy::Reject);
        assert_eq!(args.settings.report_format().currency_symbol, "₽");
    }

    #[test]
    fn test_invalid_listen_address_rejected() {
        assert!(ServerArgs::try_parse_from(["fleet-server", "--listen", "not-an-addr"]).is_err());
    }
}
