//! SQLite-backed pending registry

use crate::StoreError;
use chrono::{DateTime, Utc};
use quarry_domain::{PendingEntry, PendingRegistry};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Pending registry stored in a SQLite table
///
/// The connection sits behind a mutex so one registry can be shared by the
/// poller's worker threads.
pub struct SqlitePendingRegistry {
    conn: Mutex<Connection>,
}

impl SqlitePendingRegistry {
    /// Open (creating if needed) the registry database
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        f(&conn)
    }

    fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| StoreError::InvalidData(format!("Bad timestamp '{}': {}", raw, e)))
    }
}

impl PendingRegistry for SqlitePendingRegistry {
    type Error = StoreError;

    fn pending_projects(&self) -> Result<Vec<String>, Self::Error> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT project FROM pending_projects WHERE pending = 1 ORDER BY project")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let projects = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(projects)
        })
    }

    fn mark_pending(&self, project: &str, job_id: &str) -> Result<(), Self::Error> {
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO pending_projects (project, pending, last_job_id, updated_at)
                 VALUES (?1, 1, ?2, ?3)
                 ON CONFLICT(project) DO UPDATE SET
                     pending = 1,
                     last_job_id = excluded.last_job_id,
                     updated_at = excluded.updated_at",
                params![project, job_id, now],
            )?;
            Ok(())
        })?;
        tracing::debug!(project, job_id, "Project marked pending");
        Ok(())
    }

    fn clear_pending(&self, project: &str, job_id: &str) -> Result<(), Self::Error> {
        let now = Utc::now().to_rfc3339();
        let changed = self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE pending_projects
                 SET pending = 0, updated_at = ?3
                 WHERE project = ?1 AND (last_job_id IS NULL OR last_job_id = ?2)",
                params![project, job_id, now],
            )?)
        })?;
        if changed == 0 {
            tracing::debug!(project, job_id, "Pending flag left as is");
        }
        Ok(())
    }

    fn entry(&self, project: &str) -> Result<Option<PendingEntry>, Self::Error> {
        let row = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT project, pending, last_job_id, updated_at
                     FROM pending_projects WHERE project = ?1",
                    params![project],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()?)
        })?;

        row.map(|(project, pending, last_job_id, updated_at)| {
            Ok(PendingEntry {
                project,
                pending: pending != 0,
                last_job_id,
                updated_at: Self::parse_time(&updated_at)?,
            })
        })
        .transpose()
    }
}
