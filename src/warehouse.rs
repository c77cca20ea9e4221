//! Local event-log warehouse backed by SQLite.
//!
//! Raw events are stored one row per event in `events`, partitioned by a
//! `YYYYMMDD` suffix column, with their key-value parameters in
//! `event_params`. The warehouse serves a single project, recorded in `meta`.

use crate::engine::{QueryEngine, QueryError, ResultRow, ResultSet, authorize};
use crate::query::AggregationQuery;
use crate::types::RawEvent;
use eyre::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

/// SQLite database file within the warehouse directory.
const DB_FILE: &str = "warehouse.db";

/// Outcome of a JSONL import.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImportStats {
    /// Events written to the warehouse.
    pub imported: usize,
    /// Lines that failed to parse or validate.
    pub skipped: usize,
}

/// Handle to a local warehouse directory.
pub struct Warehouse {
    db: Connection,
}

impl Warehouse {
    /// Create (or reuse) a warehouse in `root`, authorized for `project_id`.
    ///
    /// A warehouse already recorded for a different project is refused.
    pub fn init(root: &Path, project_id: &str) -> Result<Self> {
        if project_id.trim().is_empty() {
            eyre::bail!(QueryError::Authentication("no project id configured".to_string()));
        }

        fs::create_dir_all(root).context("Failed to create warehouse directory")?;
        let db = Connection::open(root.join(DB_FILE)).context("Failed to open SQLite database")?;

        let warehouse = Self { db };
        warehouse.init_schema()?;

        let project_id = project_id.trim();
        match warehouse.project_id()? {
            Some(existing) if existing != project_id => {
                eyre::bail!(QueryError::Authentication(format!(
                    "warehouse at {} belongs to project {}",
                    root.display(),
                    existing
                )));
            }
            Some(_) => {}
            None => {
                warehouse.db.execute(
                    "INSERT INTO meta (key, value) VALUES ('project_id', ?)",
                    params![project_id],
                )?;
            }
        }

        log::info!("Initialized warehouse at {} for project {}", root.display(), project_id);
        Ok(warehouse)
    }

    /// Open an existing warehouse. A missing warehouse is an unreachable engine.
    pub fn open(root: &Path) -> Result<Self> {
        let db_path = root.join(DB_FILE);
        if !db_path.exists() {
            eyre::bail!(QueryError::Execution(format!(
                "no warehouse found at {}. Run 'evb init' first.",
                root.display()
            )));
        }

        let db = Connection::open(&db_path)
            .map_err(|e| eyre::eyre!(QueryError::Execution(format!("failed to open warehouse: {}", e))))?;

        let warehouse = Self { db };
        warehouse.init_schema()?;
        Ok(warehouse)
    }

    fn init_schema(&self) -> Result<()> {
        self.db
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS events (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    table_suffix TEXT NOT NULL,
                    event_date TEXT NOT NULL,
                    event_name TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_events_suffix ON events(table_suffix);

                CREATE TABLE IF NOT EXISTS event_params (
                    event_id INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL,
                    key TEXT NOT NULL,
                    string_value TEXT,
                    PRIMARY KEY (event_id, position)
                );
                CREATE INDEX IF NOT EXISTS idx_event_params_key ON event_params(event_id, key);

                CREATE TABLE IF NOT EXISTS meta (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
            "#,
            )
            .context("Failed to initialize schema")?;

        Ok(())
    }

    /// Project this warehouse is authorized for.
    pub fn project_id(&self) -> Result<Option<String>> {
        let project = self
            .db
            .query_row("SELECT value FROM meta WHERE key = 'project_id'", [], |row| row.get(0))
            .optional()?;
        Ok(project)
    }

    /// Store one raw event, returning its row id.
    pub fn insert_event(&mut self, event: &RawEvent) -> Result<i64> {
        let ids = self.insert_events(std::slice::from_ref(event))?;
        ids.first().copied().ok_or_else(|| eyre::eyre!("event was not inserted"))
    }

    /// Store a batch of raw events in a single transaction.
    pub fn insert_events(&mut self, events: &[RawEvent]) -> Result<Vec<i64>> {
        for event in events {
            event.validate().map_err(|e| eyre::eyre!("invalid event: {}", e))?;
        }

        let tx = self.db.transaction().context("Failed to start transaction")?;
        let mut ids = Vec::with_capacity(events.len());
        for event in events {
            let suffix = event.partition_suffix();
            tx.execute(
                "INSERT INTO events (table_suffix, event_date, event_name) VALUES (?, ?, ?)",
                params![suffix, suffix, event.event_name],
            )?;
            let event_id = tx.last_insert_rowid();
            for (position, param) in event.params.iter().enumerate() {
                tx.execute(
                    "INSERT INTO event_params (event_id, position, key, string_value) VALUES (?, ?, ?, ?)",
                    params![event_id, position as i64, param.key, param.value],
                )?;
            }
            ids.push(event_id);
        }
        tx.commit().context("Failed to commit events")?;

        log::debug!("Inserted {} event(s)", ids.len());
        Ok(ids)
    }

    /// Import raw events from a JSONL file, skipping malformed lines.
    pub fn import_jsonl(&mut self, path: &Path) -> Result<ImportStats> {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let reader = BufReader::new(file);

        let mut events = Vec::new();
        let mut stats = ImportStats::default();

        for (index, line) in reader.lines().enumerate() {
            let line_no = index + 1;
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    log::warn!("Failed to read line {}: {}", line_no, e);
                    stats.skipped += 1;
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<RawEvent>(&line) {
                Ok(event) => match event.validate() {
                    Ok(()) => events.push(event),
                    Err(e) => {
                        log::warn!("Invalid event at line {}: {}", line_no, e);
                        stats.skipped += 1;
                    }
                },
                Err(e) => {
                    log::warn!("Failed to parse event at line {}: {}", line_no, e);
                    stats.skipped += 1;
                }
            }
        }

        stats.imported = self.insert_events(&events)?.len();
        log::info!(
            "Imported {} event(s) from {} ({} skipped)",
            stats.imported,
            path.display(),
            stats.skipped
        );
        Ok(stats)
    }

    /// Total number of raw events stored.
    pub fn event_count(&self) -> Result<usize> {
        let count: i64 = self.db.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn run_query(&self, query: &AggregationQuery) -> rusqlite::Result<ResultSet> {
        let mut stmt = self.db.prepare(&query.sql())?;
        let columns = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt
            .query_map(params![query.through_suffix()], |row| {
                Ok(ResultRow {
                    event_dates: row.get(0)?,
                    distinct_model_names: row.get(1)?,
                    distinct_variant_names: row.get(2)?,
                    distinct_color_names: row.get(3)?,
                    distinct_feature_names: row.get(4)?,
                    distinct_accessory_names: row.get(5)?,
                    distinct_pack_names: row.get(6)?,
                    total_event_counts: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ResultSet { columns, rows })
    }
}

impl QueryEngine for Warehouse {
    fn execute(&self, query: &AggregationQuery) -> Result<ResultSet> {
        let expected = self
            .project_id()
            .map_err(|e| eyre::eyre!(QueryError::Execution(e.to_string())))?
            .ok_or_else(|| eyre::eyre!(QueryError::Authentication("warehouse has no project".to_string())))?;
        authorize(&expected, query)?;

        let result = self
            .run_query(query)
            .map_err(|e| eyre::eyre!(QueryError::Execution(e.to_string())))?;

        log::info!(
            "Query through {} returned {} row(s)",
            query.through(),
            result.rows.len()
        );
        Ok(result)
    }
}
