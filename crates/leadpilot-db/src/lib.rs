//! SQLite datastore.
//!
//! One connection behind a mutex, WAL journal, schema migrated on open.
//! Implements [`LeadStore`](leadpilot_core::traits::LeadStore) and
//! [`JobStore`](leadpilot_core::traits::JobStore).

mod jobs;
mod leads;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use leadpilot_core::error::{LeadPilotError, Result};
use rusqlite::Connection;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS leads_raw (
        id TEXT PRIMARY KEY,
        source_id TEXT,
        first_name TEXT,
        last_name TEXT,
        title TEXT,
        company TEXT,
        email TEXT,
        phone TEXT,
        crm_id TEXT,
        payload TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_leads_crm_id ON leads_raw(crm_id);

    CREATE TABLE IF NOT EXISTS leads_scored (
        id TEXT PRIMARY KEY,
        lead_id TEXT NOT NULL REFERENCES leads_raw(id),
        crm_id TEXT,
        score REAL NOT NULL,
        rationale TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_scored_lead ON leads_scored(lead_id);

    CREATE TABLE IF NOT EXISTS lead_research (
        id TEXT PRIMARY KEY,
        lead_id TEXT NOT NULL REFERENCES leads_raw(id),
        summary_text TEXT,
        sources TEXT,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_research_lead ON lead_research(lead_id);

    CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY,
        type TEXT NOT NULL,
        status TEXT NOT NULL,
        details TEXT,
        error_message TEXT,
        run_time TEXT NOT NULL,
        completed_at TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_jobs_run_time ON jobs(run_time);
";

/// SQLite-backed store for leads, scores, research and jobs.
pub struct Datastore {
    conn: Mutex<Connection>,
}

impl Datastore {
    /// Open or create the database file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err("open"))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(db_err("pragma"))?;
        let store = Self::from_connection(conn)?;
        tracing::debug!("Datastore opened at {}", path.display());
        Ok(store)
    }

    /// Fresh in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("open"))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(db_err("pragma"))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(db_err("migration"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LeadPilotError::Database(format!("lock poisoned: {e}")))
    }
}

/// Wrap a rusqlite error with the operation that failed.
pub(crate) fn db_err(context: &'static str) -> impl Fn(rusqlite::Error) -> LeadPilotError {
    move |e| LeadPilotError::Database(format!("{context}: {e}"))
}
