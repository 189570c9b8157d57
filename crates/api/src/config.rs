use std::path::PathBuf;

use audnet_core::access::{parse_roster, DEFAULT_ROSTER};
use audnet_core::types::RoomNumber;
use audnet_executor::{ExecutorMode, PlaybookConfig};

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// SQLite connection URL (default: `sqlite://auditoriums.db`).
    pub database_url: String,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `120`).
    ///
    /// Playbook runs can be slow; the timeout only drops the response, the
    /// operation itself still completes.
    pub request_timeout_secs: u64,
    /// How long shutdown waits for scheduled unlocks to settle (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
    /// Whether actions are simulated or run for real.
    pub mode: ExecutorMode,
    /// Playbook binary and directory used in real mode.
    pub playbooks: PlaybookConfig,
    /// Rooms seeded into the store at startup.
    pub roster: Vec<RoomNumber>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                                 |
    /// |-------------------------|-----------------------------------------|
    /// | `HOST`                  | `0.0.0.0`                               |
    /// | `PORT`                  | `8000`                                  |
    /// | `DATABASE_URL`          | `sqlite://auditoriums.db`               |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`                 |
    /// | `REQUEST_TIMEOUT_SECS`  | `120`                                   |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                                    |
    /// | `MODE`                  | `development` (`production` runs real)  |
    /// | `PLAYBOOK_DIR`          | `./playbooks`                           |
    /// | `ANSIBLE_PLAYBOOK_BIN`  | `ansible-playbook`                      |
    /// | `AUDITORIUM_ROSTER`     | `11,14,15,17,19,20,23,24,103,113,262`   |
    ///
    /// See [`JwtConfig::from_env`] for the JWT variables.
    ///
    /// # Panics
    ///
    /// Panics on malformed numeric values or an invalid roster.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://auditoriums.db".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let mode = ExecutorMode::from_mode_str(
            &std::env::var("MODE").unwrap_or_else(|_| "development".into()),
        );

        let playbooks = PlaybookConfig {
            binary: std::env::var("ANSIBLE_PLAYBOOK_BIN")
                .unwrap_or_else(|_| "ansible-playbook".into()),
            playbook_dir: PathBuf::from(
                std::env::var("PLAYBOOK_DIR").unwrap_or_else(|_| "./playbooks".into()),
            ),
        };

        let roster = match std::env::var("AUDITORIUM_ROSTER") {
            Ok(raw) => parse_roster(&raw)
                .expect("AUDITORIUM_ROSTER must be comma-separated room numbers"),
            Err(_) => DEFAULT_ROSTER.to_vec(),
        };

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            database_url,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt,
            mode,
            playbooks,
            roster,
        }
    }
}
