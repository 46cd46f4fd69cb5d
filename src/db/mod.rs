pub mod queries;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use std::fs;
use std::path::Path;

pub const KIND_PROGRESS_REPORT: &str = "progress_report";
pub const KIND_ENROLLMENT_LISTING: &str = "enrollment_listing";
pub const KIND_CAPTURE: &str = "capture";

const EXPORT_COLUMNS: &str = "id, kind, subject, generated_at, pdf_path, json_path";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub id: i64,
    pub kind: String,
    pub subject: String,
    pub generated_at: i64,
    pub pdf_path: String,
    pub json_path: Option<String>,
}

impl ExportRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            subject: row.get(2)?,
            generated_at: row.get(3)?,
            pdf_path: row.get(4)?,
            json_path: row.get(5)?,
        })
    }
}

/// Local index of the artifacts this tool has written to disk.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    pub fn record_export(
        &self,
        kind: &str,
        subject: &str,
        generated_at: i64,
        pdf_path: &str,
        json_path: Option<&str>,
    ) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO exports (kind, subject, generated_at, pdf_path, json_path) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![kind, subject, generated_at, pdf_path, json_path],
            )
            .context("Failed to record export")?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn latest_export(&self) -> Result<Option<ExportRow>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {EXPORT_COLUMNS} FROM exports ORDER BY generated_at DESC, id DESC LIMIT 1"
                ),
                [],
                ExportRow::from_row,
            )
            .optional()
            .context("Failed to query latest export")
    }

    pub fn list_exports(&self, limit: usize) -> Result<Vec<ExportRow>> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {EXPORT_COLUMNS}
             FROM exports
             ORDER BY generated_at DESC, id DESC
             LIMIT ?1"
        ))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = statement
            .query_map(params![limit], ExportRow::from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list exports")?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_lists_newest_first() {
        let dir = tempfile::tempdir().expect("temp dir");
        let database = Database::open(&dir.path().join("db").join("exports.db")).expect("db opened");

        assert!(database.latest_export().expect("latest").is_none());

        database
            .record_export(KIND_PROGRESS_REPORT, "user-1", 100, "/tmp/a.pdf", Some("/tmp/a.json"))
            .expect("first recorded");
        database
            .record_export(KIND_ENROLLMENT_LISTING, "all", 200, "/tmp/b.pdf", None)
            .expect("second recorded");
        database
            .record_export(KIND_CAPTURE, "screen", 150, "/tmp/c.pdf", None)
            .expect("third recorded");

        let latest = database.latest_export().expect("latest").expect("row present");
        assert_eq!(latest.kind, KIND_ENROLLMENT_LISTING);
        assert_eq!(latest.json_path, None);

        let rows = database.list_exports(2).expect("listed");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].generated_at, 200);
        assert_eq!(rows[1].subject, "screen");
    }

    #[test]
    fn reopening_keeps_existing_rows() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("exports.db");

        {
            let database = Database::open(&path).expect("db opened");
            database
                .record_export(KIND_PROGRESS_REPORT, "user-1", 1, "a.pdf", Some("a.json"))
                .expect("recorded");
        }

        let database = Database::open(&path).expect("db reopened");
        assert_eq!(database.list_exports(10).expect("listed").len(), 1);
    }
}
