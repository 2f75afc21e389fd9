//! Server entry point.
//!
//! Configuration comes from environment variables:
//! - `FIELDOPS_DB`: SQLite database path (default `fieldops.db`)
//! - `FIELDOPS_ADDR`: listen address (default `127.0.0.1:8640`)
//! - `FIELDOPS_LOG_DIR`: log directory (default `<cwd>/logs`)
//! - `FIELDOPS_LOG_LEVEL`: log level (default per build mode)
//! - `FIELDOPS_ADMIN_PASSWORD`: first-boot admin password (generated and
//!   printed once when unset)

use fieldops_core::db::open_db;
use fieldops_core::{
    default_log_level, init_logging, Role, SqliteUserRepository, User, UserRepository,
};
use fieldops_server::auth::hash_password;
use fieldops_server::server::serve;
use fieldops_server::AppState;
use log::info;
use rusqlite::Connection;
use uuid::Uuid;

fn main() {
    if let Err(err) = run() {
        eprintln!("fieldops-server: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let level = std::env::var("FIELDOPS_LOG_LEVEL")
        .unwrap_or_else(|_| default_log_level().to_string());
    let log_dir = match std::env::var("FIELDOPS_LOG_DIR") {
        Ok(dir) => dir,
        Err(_) => std::env::current_dir()
            .map_err(|err| format!("cannot resolve working directory: {err}"))?
            .join("logs")
            .to_string_lossy()
            .into_owned(),
    };
    init_logging(&level, &log_dir)?;

    let db_path = std::env::var("FIELDOPS_DB").unwrap_or_else(|_| "fieldops.db".to_string());
    let conn = open_db(&db_path).map_err(|err| format!("cannot open `{db_path}`: {err}"))?;

    seed_admin_if_empty(&conn)?;

    let addr = std::env::var("FIELDOPS_ADDR").unwrap_or_else(|_| "127.0.0.1:8640".to_string());
    let mut state = AppState::new(conn);
    serve(&addr, &mut state)
}

/// Creates the initial admin account when the user table is empty.
fn seed_admin_if_empty(conn: &Connection) -> Result<(), String> {
    let repo = SqliteUserRepository::try_new(conn).map_err(|err| err.to_string())?;
    if repo.count_users().map_err(|err| err.to_string())? > 0 {
        return Ok(());
    }

    let (password, generated) = match std::env::var("FIELDOPS_ADMIN_PASSWORD") {
        Ok(password) => (password, false),
        Err(_) => (Uuid::new_v4().simple().to_string(), true),
    };

    let admin = User::new("admin", "Administrator", Role::Admin, hash_password(&password));
    repo.create_user(&admin).map_err(|err| err.to_string())?;
    info!("event=admin_seeded module=server status=ok user={}", admin.id);

    if generated {
        // One-time bootstrap credentials; only ever printed, never logged.
        println!("created initial admin account `admin` with password: {password}");
    }

    Ok(())
}
